use serde::{Deserialize, Serialize};

/// Identity of a study video: which sentence the subject speaks and the
/// subject id. Methods produce one video per key (plus a rotated variant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoKey {
    /// Sentence label, "A" or "B"
    pub sentence: String,
    /// Subject id, e.g. "104"
    pub subject: String,
}

impl VideoKey {
    pub fn new(sentence: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            sentence: sentence.into(),
            subject: subject.into(),
        }
    }

    /// Key used in the per-method crop cache, `"{sentence}_{subject}"`.
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.sentence, self.subject)
    }
}

/// Parses a study video stem, `{method}_heygen_{sentence}_{subject}` with
/// optional `_rotated` / `_scale1.5` suffix parts.
///
/// Returns `None` for names that don't follow the study convention; callers
/// skip those with a warning rather than failing the batch.
pub fn parse_video_stem(stem: &str) -> Option<VideoKey> {
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 4 {
        return None;
    }
    let sentence = parts[2];
    // Some early exports glued the scale suffix onto the subject token
    let subject = parts[3].replace("scale1.5", "").replace("scale15", "");
    if sentence.is_empty() || subject.is_empty() {
        return None;
    }
    Some(VideoKey::new(sentence, subject))
}

/// Parses any stem the debug viewer may encounter. Multi-view captures named
/// `nersemble_{subject}_{checkpoint}` carry no sentence and default to "A".
pub fn parse_viewer_stem(stem: &str) -> Option<VideoKey> {
    if let Some(rest) = stem.strip_prefix("nersemble_") {
        let subject = rest.split('_').next()?;
        if subject.is_empty() {
            return None;
        }
        return Some(VideoKey::new("A", subject));
    }
    parse_video_stem(stem)
}

/// Comparison-pair name used in the survey CSVs, encoding which side our
/// method appears on.
pub fn pair_name(key: &VideoKey, baseline: &str, ours_left: bool) -> String {
    if ours_left {
        format!("pair_{}_{}_ours_vs_{}", key.subject, key.sentence, baseline)
    } else {
        format!("pair_{}_{}_{}_vs_ours", key.subject, key.sentence, baseline)
    }
}

/// Canonical output name for a front video: the working-scale suffix is
/// dropped once framing has been normalized.
pub fn front_output_name(file_name: &str) -> String {
    file_name.replace("_scale1.5", "")
}

/// Canonical output name for a rotated video.
pub fn rotated_output_name(file_name: &str) -> String {
    file_name.replace("_rotated_scale1.5", "_rotated")
}
