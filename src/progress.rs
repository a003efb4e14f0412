use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

/// Progress tracker for a batch of videos belonging to one method
pub struct BatchProgressTracker {
    progress_bar: ProgressBar,
    start_time: Instant,
    processed_videos: u64,
}

impl BatchProgressTracker {
    pub fn new(total_videos: u64, method: &str) -> Self {
        let progress_bar = ProgressBar::new(total_videos);

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} videos ({percent}%) | {msg}")
            .unwrap()
            .progress_chars("#>-");

        progress_bar.set_style(style);
        progress_bar.set_message(format!("Processing {}", method));

        Self {
            progress_bar,
            start_time: Instant::now(),
            processed_videos: 0,
        }
    }

    /// Marks one video as finished and refreshes the rate/ETA message
    pub fn update_video(&mut self, file_name: &str) {
        self.processed_videos += 1;
        self.progress_bar.inc(1);

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let per_video = elapsed / self.processed_videos as f64;
        let remaining = self
            .progress_bar
            .length()
            .unwrap_or(self.processed_videos)
            .saturating_sub(self.processed_videos);

        self.progress_bar.set_message(format!(
            "{} | {} per video | ETA: {}",
            file_name,
            format_duration(per_video),
            format_duration(per_video * remaining as f64),
        ));
    }

    pub fn finish(&self) {
        let total_time = self.start_time.elapsed().as_secs_f64();
        self.progress_bar.finish_with_message(format!(
            "Completed! {} videos in {}",
            self.processed_videos,
            format_duration(total_time),
        ));
    }

    pub fn processed_videos(&self) -> u64 {
        self.processed_videos
    }
}

/// Formats a duration in seconds to h:mm:ss format
fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(30.0), "0:30");
        assert_eq!(format_duration(90.0), "1:30");
        assert_eq!(format_duration(3661.0), "1:01:01");
        assert_eq!(format_duration(7200.0), "2:00:00");
    }

    #[test]
    fn test_tracker_counts_videos() {
        let mut tracker = BatchProgressTracker::new(3, "ga");
        assert_eq!(tracker.processed_videos(), 0);
        tracker.update_video("ga_heygen_A_104.mp4");
        tracker.update_video("ga_heygen_B_104.mp4");
        assert_eq!(tracker.processed_videos(), 2);
        tracker.finish();
    }
}
