use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::geometry::{CropTarget, FrameDims, Rect};

/// Crop parameters recorded for one subject+sentence, so re-runs skip
/// detection and the rotated variant reuses the front video's crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCrop {
    pub target_ratio: f64,
    pub target_y_position: f64,
    /// Detected face as [x, y, w, h], absent when the center-crop fallback
    /// was taken
    pub face_bbox: Option<[u32; 4]>,
    pub crop_x: u32,
    pub crop_y: u32,
    pub crop_size: u32,
    pub video_width: u32,
    pub video_height: u32,
}

impl CachedCrop {
    pub fn from_parts(
        target: CropTarget,
        face: Option<&Rect>,
        crop: &Rect,
        frame: FrameDims,
    ) -> Self {
        Self {
            target_ratio: target.ratio,
            target_y_position: target.anchor_y,
            face_bbox: face.map(|f| [f.x, f.y, f.width, f.height]),
            crop_x: crop.x,
            crop_y: crop.y,
            crop_size: crop.width,
            video_width: frame.width,
            video_height: frame.height,
        }
    }

    pub fn crop(&self) -> Rect {
        Rect::new(self.crop_x, self.crop_y, self.crop_size, self.crop_size)
    }

    pub fn face(&self) -> Option<Rect> {
        self.face_bbox.map(|[x, y, w, h]| Rect::new(x, y, w, h))
    }

    pub fn target(&self) -> CropTarget {
        CropTarget::new(self.target_ratio, self.target_y_position)
    }

    pub fn frame(&self) -> FrameDims {
        FrameDims::new(self.video_width, self.video_height)
    }
}

/// Per-method crop cache, persisted as a JSON map keyed by
/// `"{sentence}_{subject}"`.
#[derive(Debug, Default)]
pub struct CropCache {
    entries: HashMap<String, CachedCrop>,
}

impl CropCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a cache file. A missing file yields an empty cache; an
    /// unreadable one is reported and also degrades to empty rather than
    /// aborting the batch.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::new();
        }
        match fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|text| serde_json::from_str(&text).map_err(anyhow::Error::from))
        {
            Ok(entries) => Self { entries },
            Err(e) => {
                println!("Warning: could not load cache file {}: {e}", path.display());
                Self::new()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache dir {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, text)
            .with_context(|| format!("Failed to write cache file {}", path.display()))
    }

    pub fn get(&self, key: &str) -> Option<&CachedCrop> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, entry: CachedCrop) {
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> CachedCrop {
        CachedCrop::from_parts(
            CropTarget::new(0.12, 0.82),
            Some(&Rect::new(250, 120, 300, 340)),
            &Rect::new(0, 0, 826, 826),
            FrameDims::new(826, 1204),
        )
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("ga_crop_cache.json");

        let mut cache = CropCache::new();
        cache.insert("A_104".to_string(), sample_entry());
        cache.save(&path).unwrap();

        let loaded = CropCache::load(&path);
        assert_eq!(loaded.len(), 1);
        let entry = loaded.get("A_104").unwrap();
        assert_eq!(entry, &sample_entry());
        assert_eq!(entry.crop(), Rect::new(0, 0, 826, 826));
        assert_eq!(entry.face(), Some(Rect::new(250, 120, 300, 340)));
        assert_eq!(entry.frame(), FrameDims::new(826, 1204));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CropCache::load(&dir.path().join("nope.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let cache = CropCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fallback_entry_has_no_face() {
        let entry = CachedCrop::from_parts(
            CropTarget::new(0.1, 0.8),
            None,
            &Rect::new(0, 84, 512, 512),
            FrameDims::new(512, 680),
        );
        assert_eq!(entry.face(), None);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"face_bbox\":null"));
    }
}
