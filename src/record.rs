//! One analyzed video file and its classification state.

use crate::file_organizer::FileOrganizer;
use crate::probe::{RawProps, parse_frame_rate};
use crate::ratio::{ClosestRatio, RatioCatalog};
use std::path::{Path, PathBuf};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Where a record stands relative to the filesystem.
///
/// Derived on demand from `classified_directory` and the file's presence in
/// the root directory; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassificationState {
    /// No directory recorded.
    Unclassified,
    /// Directory recorded and the file has left the root.
    Classified,
    /// Directory recorded but the file is still in the root (dry run).
    PseudoClassified,
}

/// Derived properties of one file in the root directory.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRecord {
    pub filename: String,
    pub width: i32,
    pub height: i32,
    pub rotation_degrees: i32,
    pub fps: f64,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub file_size_mb: f64,
    pub duration_secs: f64,
    pub codec: String,
    /// Display aspect ratio, accounting for rotation.
    pub aspect_ratio: f64,
    pub ratio: ClosestRatio,
    /// `None` until keyframe analysis has run for this record.
    pub keyframe_interval_secs: Option<f64>,
    /// Directory the engine believes this file was (or would be) moved to.
    pub classified_directory: Option<String>,
}

impl VideoRecord {
    pub fn from_probe(filename: impl Into<String>, raw: RawProps, file_size_bytes: u64) -> Self {
        let aspect_ratio = display_aspect_ratio(raw.width, raw.height, raw.rotation);

        Self {
            filename: filename.into(),
            width: raw.width,
            height: raw.height,
            rotation_degrees: raw.rotation,
            fps: parse_frame_rate(&raw.frame_rate),
            video_bitrate_kbps: (raw.video_bitrate_bps / 1000) as u32,
            audio_bitrate_kbps: (raw.audio_bitrate_bps / 1000) as u32,
            file_size_mb: file_size_bytes as f64 / BYTES_PER_MB,
            duration_secs: raw.duration_secs,
            codec: raw.codec_name,
            aspect_ratio,
            ratio: RatioCatalog::closest(aspect_ratio),
            keyframe_interval_secs: None,
            classified_directory: None,
        }
    }

    /// False when the probe could not report a usable resolution.
    pub fn has_valid_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Whether the file is currently sitting in `root`.
    pub fn is_present_in(&self, root: &Path) -> bool {
        FileOrganizer::file_exists_in(root, &self.filename)
    }

    /// Where the file sits on disk: the root if it is there, otherwise the
    /// recorded subdirectory if the file exists in it.
    pub fn current_path(&self, root: &Path) -> PathBuf {
        if let Some(dir) = &self.classified_directory
            && !self.is_present_in(root)
        {
            let moved = root.join(dir).join(&self.filename);
            if moved.is_file() {
                return moved;
            }
        }
        root.join(&self.filename)
    }

    /// Reconciles the recorded directory with the filesystem.
    pub fn state_in(&self, root: &Path) -> ClassificationState {
        match self.classified_directory {
            None => ClassificationState::Unclassified,
            Some(_) if self.is_present_in(root) => ClassificationState::PseudoClassified,
            Some(_) => ClassificationState::Classified,
        }
    }
}

/// Width over height, swapped when the video is rotated by an odd multiple
/// of 90 degrees. Returns 0.0 for unusable dimensions.
pub fn display_aspect_ratio(width: i32, height: i32, rotation: i32) -> f64 {
    if width <= 0 || height <= 0 {
        return 0.0;
    }
    if rotation.rem_euclid(180) == 90 {
        height as f64 / width as f64
    } else {
        width as f64 / height as f64
    }
}
