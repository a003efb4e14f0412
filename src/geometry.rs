/// Axis-aligned rectangle in source-frame pixel coordinates.
///
/// Represents either a detected face or a computed crop window. Immutable
/// once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Horizontal center, rounded down to a whole pixel.
    pub fn center_x(&self) -> u32 {
        self.x + self.width / 2
    }

    /// Lower edge of the box — the chin row for a face rectangle.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    /// Shrinks the rectangle so it lies entirely inside the frame.
    pub fn clamped_to(&self, frame: FrameDims) -> Self {
        let x = self.x.min(frame.width.saturating_sub(1));
        let y = self.y.min(frame.height.saturating_sub(1));
        Self {
            x,
            y,
            width: self.width.min(frame.width - x),
            height: self.height.min(frame.height - y),
        }
    }
}

/// Pixel extents of a source frame or video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDims {
    pub width: u32,
    pub height: u32,
}

impl FrameDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Side length of the largest square that fits in the frame.
    pub fn min_side(&self) -> u32 {
        self.width.min(self.height)
    }
}

/// Desired framing: face-area fraction of the crop, and normalized vertical
/// position of the face's lower edge within the crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropTarget {
    /// Face area / crop area, in (0, 1].
    pub ratio: f64,
    /// Chin position as a fraction of the crop height, in [0, 1].
    pub anchor_y: f64,
}

impl CropTarget {
    pub fn new(ratio: f64, anchor_y: f64) -> Self {
        Self { ratio, anchor_y }
    }
}

/// Computes a square crop rectangle that places the face at the target
/// framing, respecting frame bounds.
///
/// With no face, degrades to the centered `min(width, height)` square and
/// ignores the target entirely. Impossible targets (a ratio so small the
/// needed square exceeds the frame) are satisfied loosely by clamping to the
/// frame's shorter side. When the face sits near a frame edge, the bounds
/// repair below can leave both the ratio and the anchor off target; that is
/// accepted and not corrected further.
///
/// Never fails: every input produces a usable rectangle for the encoder.
pub fn compute_crop(frame: FrameDims, face: Option<&Rect>, target: CropTarget) -> Rect {
    let frame_min = frame.min_side();

    let Some(face) = face else {
        // Fallback: centered square crop, both axes.
        return Rect::new(
            (frame.width - frame_min) / 2,
            (frame.height - frame_min) / 2,
            frame_min,
            frame_min,
        );
    };

    // Side length that hits the target ratio: face_area / size^2 = ratio.
    let ideal = (face.area() as f64 / target.ratio).sqrt().round() as u32;
    let mut size = ideal.min(frame_min);

    // Never so tight that the face could be clipped; the floor must not push
    // the crop back over the frame's shorter side.
    let floor = (1.5 * face.width.max(face.height) as f64).round() as u32;
    size = size.max(floor).min(frame_min);

    // Horizontal: center on the face. Vertical: solve for the top edge that
    // puts the chin at the requested anchor within the crop.
    let x = face.center_x() as i64 - (size / 2) as i64;
    let y = (face.bottom() as f64 - target.anchor_y * size as f64).round() as i64;

    Rect::new(
        clamp_axis(x, size, frame.width),
        clamp_axis(y, size, frame.height),
        size,
        size,
    )
}

/// Repairs a crop position along one axis so `[pos, pos + size]` lies inside
/// `[0, extent]`. Callers guarantee `size <= extent`.
fn clamp_axis(pos: i64, size: u32, extent: u32) -> u32 {
    if pos < 0 {
        0
    } else if pos as u64 + size as u64 > extent as u64 {
        extent - size
    } else {
        pos as u32
    }
}

/// Arithmetic mean of a set of rectangles, component-wise.
///
/// Used to reduce per-frame detections to a single face box before crop
/// computation; kept out of `compute_crop` so the calculator stays a
/// single-rectangle, stateless function.
pub fn mean_rect(rects: &[Rect]) -> Option<Rect> {
    if rects.is_empty() {
        return None;
    }
    let n = rects.len() as u64;
    let sum = |f: fn(&Rect) -> u32| -> u32 {
        let total: u64 = rects.iter().map(|r| f(r) as u64).sum();
        ((total as f64 / n as f64).round()) as u32
    };
    Some(Rect::new(
        sum(|r| r.x),
        sum(|r| r.y),
        sum(|r| r.width),
        sum(|r| r.height),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_within_frame(crop: &Rect, frame: FrameDims) {
        assert!(crop.right() <= frame.width);
        assert!(crop.bottom() <= frame.height);
    }

    #[test]
    fn test_no_face_center_crop() {
        let frame = FrameDims::new(1920, 1080);
        let crop = compute_crop(frame, None, CropTarget::new(0.1, 0.8));

        // Exact centered square of the shorter side, target ignored
        assert_eq!(crop, Rect::new(420, 0, 1080, 1080));

        // Portrait frame centers vertically instead
        let frame = FrameDims::new(826, 1204);
        let crop = compute_crop(frame, None, CropTarget::new(0.1, 0.8));
        assert_eq!(crop, Rect::new(0, 189, 826, 826));
    }

    #[test]
    fn test_unclamped_crop_hits_both_targets() {
        let frame = FrameDims::new(1920, 1080);
        let face = Rect::new(860, 300, 200, 200);
        let target = CropTarget::new(0.1, 0.7);
        let crop = compute_crop(frame, Some(&face), target);

        assert!(crop.is_square());
        assert_within_frame(&crop, frame);

        // size = round(sqrt(40000 / 0.1)) = 632
        assert_eq!(crop.width, 632);

        // Achieved ratio within rounding of the target
        let achieved_ratio = face.area() as f64 / crop.area() as f64;
        assert!((achieved_ratio - target.ratio).abs() < 0.005);

        // Chin lands at the requested anchor
        let achieved_anchor = (face.bottom() as f64 - crop.y as f64) / crop.width as f64;
        assert!((achieved_anchor - target.anchor_y).abs() < 0.005);

        // Horizontally centered on the face
        assert_eq!(crop.x + crop.width / 2, face.center_x());
    }

    #[test]
    fn test_size_floor_protects_large_faces() {
        let frame = FrameDims::new(1920, 1080);
        // Loose target ratio would ask for a crop smaller than the face
        let face = Rect::new(800, 200, 300, 400);
        let crop = compute_crop(frame, Some(&face), CropTarget::new(0.9, 0.5));

        // Floor: 1.5 * max(300, 400) = 600
        assert_eq!(crop.width, 600);
        assert!(crop.width >= (1.5 * 400.0) as u32);
        assert_within_frame(&crop, frame);
    }

    #[test]
    fn test_floor_never_exceeds_frame() {
        // Face nearly fills the frame's shorter side; 1.5x floor would not fit
        let frame = FrameDims::new(800, 1000);
        let face = Rect::new(50, 100, 700, 700);
        let crop = compute_crop(frame, Some(&face), CropTarget::new(0.9, 0.5));

        assert_eq!(crop.width, 800);
        assert_within_frame(&crop, frame);
    }

    #[test]
    fn test_edge_face_clamps_to_frame() {
        // Tall portrait frame, impossible target ratio: size clamps to the
        // frame width and both placements hit the top-left repair path
        let frame = FrameDims::new(826, 1204);
        let face = Rect::new(250, 120, 300, 340);
        let crop = compute_crop(frame, Some(&face), CropTarget::new(0.08, 0.85));

        assert_eq!(crop, Rect::new(0, 0, 826, 826));
    }

    #[test]
    fn test_face_already_at_target_keeps_full_frame() {
        // Face framing already satisfies the target: the crop reproduces the
        // full frame within rounding
        let frame = FrameDims::new(512, 512);
        let face = Rect::new(150, 100, 200, 220);
        let target = CropTarget::new(
            face.area() as f64 / frame.area() as f64,
            face.bottom() as f64 / frame.height as f64,
        );
        let crop = compute_crop(frame, Some(&face), target);

        assert_eq!(crop, Rect::new(0, 0, 512, 512));
    }

    #[test]
    fn test_right_and_bottom_edge_repair() {
        let frame = FrameDims::new(1280, 720);
        // Face hugging the bottom-right corner
        let face = Rect::new(1100, 560, 150, 150);
        let crop = compute_crop(frame, Some(&face), CropTarget::new(0.1, 0.3));

        assert!(crop.is_square());
        assert_within_frame(&crop, frame);
        // Repair pushed the crop flush against both far edges
        assert_eq!(crop.right(), frame.width);
        assert_eq!(crop.bottom(), frame.height);
    }

    #[test]
    fn test_always_square_and_contained() {
        let frame = FrameDims::new(1024, 576);
        let faces = [
            Rect::new(0, 0, 80, 90),
            Rect::new(900, 10, 100, 120),
            Rect::new(400, 400, 200, 170),
            Rect::new(10, 480, 60, 60),
        ];
        let targets = [
            CropTarget::new(0.02, 0.95),
            CropTarget::new(0.25, 0.5),
            CropTarget::new(1.0, 0.0),
        ];
        for face in &faces {
            for target in targets {
                let crop = compute_crop(frame, Some(face), target);
                assert!(crop.is_square(), "not square for {face:?} {target:?}");
                assert_within_frame(&crop, frame);
                assert!(crop.width >= 1);
            }
        }
    }

    #[test]
    fn test_mean_rect() {
        assert_eq!(mean_rect(&[]), None);

        let single = Rect::new(10, 20, 30, 40);
        assert_eq!(mean_rect(&[single]), Some(single));

        let rects = [Rect::new(100, 50, 200, 220), Rect::new(110, 60, 210, 230)];
        let mean = mean_rect(&rects).unwrap();
        assert_eq!(mean, Rect::new(105, 55, 205, 225));

        // Rounds to nearest pixel rather than truncating
        let rects = [Rect::new(0, 0, 10, 10), Rect::new(1, 1, 11, 11)];
        assert_eq!(mean_rect(&rects), Some(Rect::new(1, 1, 11, 11)));
    }

    #[test]
    fn test_rect_clamped_to_frame() {
        let frame = FrameDims::new(640, 480);
        let inside = Rect::new(10, 10, 100, 100);
        assert_eq!(inside.clamped_to(frame), inside);

        let overflowing = Rect::new(600, 450, 100, 100);
        let clamped = overflowing.clamped_to(frame);
        assert_eq!(clamped.right(), 640);
        assert_eq!(clamped.bottom(), 480);
    }
}
