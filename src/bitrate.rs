//! Bitrate model.
//!
//! Scales a baseline bitrate linearly with pixel area to decide what bitrate a
//! given resolution deserves, and flags videos whose actual bitrate is out of
//! line with both that figure and their ratio bucket's target.

use crate::config::Settings;
use crate::ratio::RatioCatalog;

/// Baseline constants the predicates are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitrateModel {
    pub base_width: u32,
    pub base_height: u32,
    pub base_bitrate_kbps: u32,
    /// Current-to-optimal bitrate ratio above which a low-resolution video
    /// counts as over-encoded.
    pub optimal_bitrate_rate: f64,
}

impl BitrateModel {
    pub fn new(
        base_width: u32,
        base_height: u32,
        base_bitrate_kbps: u32,
        optimal_bitrate_rate: f64,
    ) -> Self {
        Self {
            base_width,
            base_height,
            base_bitrate_kbps,
            optimal_bitrate_rate,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.baseline.width,
            settings.baseline.height,
            settings.baseline.bitrate_kbps,
            settings.thresholds.optimal_bitrate_rate,
        )
    }

    fn base_area(&self) -> f64 {
        self.base_width as f64 * self.base_height as f64
    }

    /// Bitrate (kbps) a `width`x`height` video deserves, truncated.
    ///
    /// Returns 0 for non-positive dimensions.
    pub fn optimal_bitrate(&self, width: i32, height: i32) -> u32 {
        let Some(area) = pixel_area(width, height) else {
            return 0;
        };
        (self.base_bitrate_kbps as f64 * area / self.base_area()) as u32
    }

    /// Per-axis factor that would bring the resolution to the baseline area
    /// while keeping its aspect ratio.
    pub fn optimal_resolution_scale(&self, width: i32, height: i32) -> f64 {
        match pixel_area(width, height) {
            Some(area) => (self.base_area() / area).sqrt(),
            None => 0.0,
        }
    }

    /// A low-resolution video carrying more bitrate than its shape needs.
    pub fn is_overencoded_standard_def(&self, bitrate_kbps: u32, width: i32, height: i32) -> bool {
        let Some(target) = bucket_target(width, height) else {
            return false;
        };
        let optimal = self.optimal_bitrate(width, height);

        optimal < target
            && (target < bitrate_kbps
                || bitrate_kbps as f64 / optimal as f64 > self.optimal_bitrate_rate)
    }

    /// A high-resolution video whose bitrate is at or above its bucket target.
    pub fn is_overbitrate_high_def(&self, bitrate_kbps: u32, width: i32, height: i32) -> bool {
        let Some(target) = bucket_target(width, height) else {
            return false;
        };
        let optimal = self.optimal_bitrate(width, height);

        target <= optimal && target <= bitrate_kbps
    }
}

fn pixel_area(width: i32, height: i32) -> Option<f64> {
    (width > 0 && height > 0).then(|| width as f64 * height as f64)
}

fn bucket_target(width: i32, height: i32) -> Option<u32> {
    pixel_area(width, height)?;
    let closest = RatioCatalog::closest(width as f64 / height as f64);
    RatioCatalog::target_bitrate_for(closest.bucket_id).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn model() -> BitrateModel {
        BitrateModel::new(1280, 720, 1550, 1.5)
    }

    #[test]
    fn test_optimal_bitrate_at_baseline() {
        assert_eq!(model().optimal_bitrate(1280, 720), 1550);
        assert_eq!(model().optimal_bitrate(2560, 1440), 6200);
        assert_eq!(model().optimal_bitrate(640, 360), 387);
    }

    #[test]
    fn test_optimal_resolution_scale() {
        assert!((model().optimal_resolution_scale(2560, 1440) - 0.5).abs() < 1e-12);
        assert!((model().optimal_resolution_scale(1280, 720) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_baseline_at_higher_bitrate_is_presetcut_candidate() {
        let m = model();
        assert!(m.is_overbitrate_high_def(2500, 1280, 720));
        assert!(!m.is_overencoded_standard_def(2500, 1280, 720));
    }

    #[test]
    fn test_small_video_with_target_bitrate_is_overencoded() {
        let m = model();
        // 640x360: optimal 387 < target 1550, bitrate above target.
        assert!(m.is_overencoded_standard_def(1600, 640, 360));
        // Below target but far above optimal.
        assert!(m.is_overencoded_standard_def(1000, 640, 360));
        // Close to optimal.
        assert!(!m.is_overencoded_standard_def(400, 640, 360));
        assert!(!m.is_overbitrate_high_def(1600, 640, 360));
    }

    #[test]
    fn test_high_def_below_target_is_left_alone() {
        let m = model();
        assert!(!m.is_overbitrate_high_def(1200, 1920, 1080));
        assert!(!m.is_overencoded_standard_def(1200, 1920, 1080));
    }

    #[test]
    fn test_invalid_dimensions_never_match() {
        let m = model();
        assert_eq!(m.optimal_bitrate(-1, -1), 0);
        assert_eq!(m.optimal_resolution_scale(0, 720), 0.0);
        assert!(!m.is_overencoded_standard_def(5000, -1, -1));
        assert!(!m.is_overbitrate_high_def(5000, -1, -1));
    }

    proptest! {
        #[test]
        fn prop_scale_restores_baseline_area(w in 16i32..8000, h in 16i32..8000) {
            let m = model();
            let s = m.optimal_resolution_scale(w, h);
            let scaled_area = (s * w as f64) * (s * h as f64);
            prop_assert!((scaled_area - 1280.0 * 720.0).abs() < 1e-6 * 1280.0 * 720.0);
        }

        #[test]
        fn prop_optimal_bitrate_is_linear_in_area(w in 16i32..4000, h in 16i32..4000) {
            let m = model();
            let single = m.optimal_bitrate(w, h) as f64;
            let doubled = m.optimal_bitrate(w * 2, h) as f64;
            // Truncation costs at most one kbps on each side.
            prop_assert!((doubled - 2.0 * single).abs() <= 2.0);
        }
    }
}
