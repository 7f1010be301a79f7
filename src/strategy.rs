//! Classification strategies.
//!
//! Each strategy is a plain function from a record to an optional
//! destination directory. `None` means "leave the file alone".

use crate::bitrate::BitrateModel;
use crate::config::Settings;
use crate::ratio::RatioCatalog;
use crate::record::VideoRecord;
use clap::ValueEnum;
use std::fmt;

/// Ratio strategy destination for files too far from every bucket.
pub const OTHER_RESOLUTIONS_DIR: &str = "other-resolutions";
/// Bitrate strategy destination for over-encoded low-resolution files.
pub const BITRATE_OPTIMIZE_DIR: &str = "bitrate-optimize";
/// Bitrate strategy destination for high-resolution files at or above target.
pub const BITRATE_PRESETCUT_DIR: &str = "bitrate-presetcut";
/// Keyframe strategy destination for sparse keyframes.
pub const KEYFRAME_ADJUST_DIR: &str = "keyframe-adjust";

/// Thresholds and baseline the strategies read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyContext {
    pub model: BitrateModel,
    pub ratio_diff_threshold: f64,
    pub keyframe_threshold: f64,
}

impl StrategyContext {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            model: BitrateModel::from_settings(settings),
            ratio_diff_threshold: settings.thresholds.ratio_diff,
            keyframe_threshold: settings.thresholds.keyframe_interval,
        }
    }
}

impl Default for StrategyContext {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

pub type StrategyFn = fn(&VideoRecord, &StrategyContext) -> Option<String>;

/// Predicate that, when true, keeps a record out of classification.
pub type ExceptionRule = Box<dyn Fn(&VideoRecord) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Strategy {
    /// Group by nearest aspect ratio.
    Ratio,
    /// Pick out files whose bitrate is out of line with their resolution.
    Bitrate,
    /// Pick out files with sparse keyframes.
    Keyframe,
}

impl Strategy {
    pub fn function(self) -> StrategyFn {
        match self {
            Strategy::Ratio => classify_by_ratio,
            Strategy::Bitrate => classify_by_bitrate,
            Strategy::Keyframe => classify_by_keyframe,
        }
    }

    pub fn classified_directory(self, record: &VideoRecord, ctx: &StrategyContext) -> Option<String> {
        (self.function())(record, ctx)
    }

    pub fn requires_keyframes(self) -> bool {
        matches!(self, Strategy::Keyframe)
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Ratio => "ratio",
            Strategy::Bitrate => "bitrate",
            Strategy::Keyframe => "keyframe",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bucket directory when the ratio is close enough, `other-resolutions` otherwise.
pub fn classify_by_ratio(record: &VideoRecord, ctx: &StrategyContext) -> Option<String> {
    if !record.has_valid_dimensions() || record.ratio.difference > ctx.ratio_diff_threshold {
        return Some(OTHER_RESOLUTIONS_DIR.to_string());
    }
    let dir = RatioCatalog::directory_for(record.ratio.bucket_id)
        .unwrap_or(OTHER_RESOLUTIONS_DIR);
    Some(dir.to_string())
}

pub fn classify_by_bitrate(record: &VideoRecord, ctx: &StrategyContext) -> Option<String> {
    let (bitrate, w, h) = (record.video_bitrate_kbps, record.width, record.height);
    if ctx.model.is_overencoded_standard_def(bitrate, w, h) {
        Some(BITRATE_OPTIMIZE_DIR.to_string())
    } else if ctx.model.is_overbitrate_high_def(bitrate, w, h) {
        Some(BITRATE_PRESETCUT_DIR.to_string())
    } else {
        None
    }
}

pub fn classify_by_keyframe(record: &VideoRecord, ctx: &StrategyContext) -> Option<String> {
    record
        .keyframe_interval_secs
        .filter(|interval| *interval > ctx.keyframe_threshold)
        .map(|_| KEYFRAME_ADJUST_DIR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::RawProps;

    fn record(width: i32, height: i32, bitrate_kbps: u64) -> VideoRecord {
        VideoRecord::from_probe(
            "clip.mp4",
            RawProps {
                width,
                height,
                video_bitrate_bps: bitrate_kbps * 1000,
                duration_secs: 60.0,
                ..RawProps::default()
            },
            0,
        )
    }

    fn context() -> StrategyContext {
        StrategyContext {
            model: BitrateModel::new(1280, 720, 1550, 1.5),
            ratio_diff_threshold: 0.2,
            keyframe_threshold: 2.0,
        }
    }

    #[test]
    fn test_ratio_full_hd_lands_in_16_9() {
        let dir = Strategy::Ratio.classified_directory(&record(1920, 1080, 4000), &context());
        assert_eq!(dir.as_deref(), Some("16-9"));
    }

    #[test]
    fn test_ratio_outlier_goes_to_other_resolutions() {
        let ctx = StrategyContext {
            ratio_diff_threshold: 0.01,
            ..context()
        };
        // 2.39:1 is 0.39 away from 2:1.
        let dir = classify_by_ratio(&record(2390, 1000, 4000), &ctx);
        assert_eq!(dir.as_deref(), Some(OTHER_RESOLUTIONS_DIR));
    }

    #[test]
    fn test_ratio_invalid_dimensions() {
        let dir = classify_by_ratio(&record(-1, -1, 0), &context());
        assert_eq!(dir.as_deref(), Some(OTHER_RESOLUTIONS_DIR));
    }

    #[test]
    fn test_bitrate_presetcut_at_baseline() {
        let dir = Strategy::Bitrate.classified_directory(&record(1280, 720, 2500), &context());
        assert_eq!(dir.as_deref(), Some(BITRATE_PRESETCUT_DIR));
    }

    #[test]
    fn test_bitrate_optimize_small_video() {
        let dir = classify_by_bitrate(&record(640, 360, 1600), &context());
        assert_eq!(dir.as_deref(), Some(BITRATE_OPTIMIZE_DIR));
    }

    #[test]
    fn test_bitrate_unremarkable_file_is_left_alone() {
        assert_eq!(classify_by_bitrate(&record(1920, 1080, 1200), &context()), None);
        assert_eq!(classify_by_bitrate(&record(-1, -1, 9000), &context()), None);
    }

    #[test]
    fn test_keyframe_threshold() {
        let mut sparse = record(1280, 720, 1500);
        sparse.keyframe_interval_secs = Some(3.5);
        assert_eq!(
            Strategy::Keyframe.classified_directory(&sparse, &context()).as_deref(),
            Some(KEYFRAME_ADJUST_DIR)
        );

        let mut dense = record(1280, 720, 1500);
        dense.keyframe_interval_secs = Some(2.0);
        assert_eq!(classify_by_keyframe(&dense, &context()), None);

        let unmeasured = record(1280, 720, 1500);
        assert_eq!(classify_by_keyframe(&unmeasured, &context()), None);
    }

    #[test]
    fn test_only_keyframe_needs_keyframes() {
        assert!(Strategy::Keyframe.requires_keyframes());
        assert!(!Strategy::Ratio.requires_keyframes());
        assert!(!Strategy::Bitrate.requires_keyframes());
        assert_eq!(Strategy::Bitrate.to_string(), "bitrate");
    }
}
