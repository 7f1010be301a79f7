//! Property table construction.
//!
//! Probing is the expensive part of every operation, so files are analyzed
//! in parallel. Results keep the (sorted) directory listing order.

use crate::file_organizer::{FileOrganizer, OrganizeResult};
use crate::output::OutputFormatter;
use crate::probe::{MediaProbe, RawProps};
use crate::record::VideoRecord;
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Windows (seconds from the start) tried in order when measuring keyframe spacing.
pub const KEYFRAME_PROBE_WINDOWS: [f64; 3] = [2.1, 5.1, 10.0];

/// Interval reported for clips shorter than the first probe window.
pub const SHORT_CLIP_KEYFRAME_INTERVAL: f64 = 1.0;

/// Interval reported when no window contains two keyframes.
pub const SPARSE_KEYFRAME_INTERVAL: f64 = 10.0;

/// Ordered records for every file found in a root directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyTable {
    records: Vec<VideoRecord>,
}

impl PropertyTable {
    /// Probes every regular file directly under `root`.
    ///
    /// # Errors
    ///
    /// Fails if `root` is not a readable directory. Individual probe failures
    /// never fail the build; the affected record carries default properties.
    pub fn build<P>(root: &Path, include_keyframes: bool, probe: &P) -> OrganizeResult<Self>
    where
        P: MediaProbe + ?Sized,
    {
        FileOrganizer::validate_root(root)?;
        let filenames = FileOrganizer::list_files(root)?;
        debug!(root = %root.display(), files = filenames.len(), "building property table");

        Ok(Self {
            records: Self::analyze_files(root, &filenames, include_keyframes, probe),
        })
    }

    /// Probes `filenames` (relative to `root`) in parallel, in input order.
    pub fn analyze_files<P>(
        root: &Path,
        filenames: &[String],
        include_keyframes: bool,
        probe: &P,
    ) -> Vec<VideoRecord>
    where
        P: MediaProbe + ?Sized,
    {
        let pb = OutputFormatter::create_progress_bar(filenames.len() as u64);
        pb.set_message("Analyzing");

        let records = filenames
            .par_iter()
            .map(|filename| {
                let record = analyze_one(root, filename, include_keyframes, probe);
                pb.inc(1);
                record
            })
            .collect();

        pb.finish_and_clear();
        records
    }

    /// Fills the keyframe interval of every record that lacks one.
    ///
    /// Returns the number of records that gained an interval.
    pub fn augment_keyframes<P>(&mut self, root: &Path, probe: &P) -> usize
    where
        P: MediaProbe + ?Sized,
    {
        let pending = self
            .records
            .iter()
            .filter(|r| r.keyframe_interval_secs.is_none())
            .count();
        if pending == 0 {
            return 0;
        }

        let pb = OutputFormatter::create_progress_bar(pending as u64);
        pb.set_message("Measuring keyframes");

        let filled = self
            .records
            .par_iter_mut()
            .filter(|r| r.keyframe_interval_secs.is_none())
            .map(|record| {
                record.keyframe_interval_secs =
                    keyframe_interval(probe, &record.current_path(root), record.duration_secs);
                pb.inc(1);
                usize::from(record.keyframe_interval_secs.is_some())
            })
            .sum::<usize>();

        pb.finish_and_clear();
        filled
    }

    pub fn records(&self) -> &[VideoRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [VideoRecord] {
        &mut self.records
    }

    pub fn find(&self, filename: &str) -> Option<&VideoRecord> {
        self.records.iter().find(|r| r.filename == filename)
    }

    pub fn find_mut(&mut self, filename: &str) -> Option<&mut VideoRecord> {
        self.records.iter_mut().find(|r| r.filename == filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.find(filename).is_some()
    }

    pub fn push(&mut self, record: VideoRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn analyze_one<P>(root: &Path, filename: &str, include_keyframes: bool, probe: &P) -> VideoRecord
where
    P: MediaProbe + ?Sized,
{
    let path = root.join(filename);
    let raw = match probe.analyze(&path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(file = %filename, error = %e, "probe failed, using defaults");
            RawProps::default()
        }
    };
    let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    let mut record = VideoRecord::from_probe(filename, raw, size);
    if include_keyframes {
        record.keyframe_interval_secs = keyframe_interval(probe, &path, record.duration_secs);
    }
    debug!(file = %filename, ratio = record.ratio.bucket_id, "analyzed");
    record
}

/// Mean spacing between keyframes near the start of `path`.
///
/// Short clips get a fixed 1s. Otherwise each window is tried until one holds
/// at least two keyframes; if none does the result is 10s. A probe error
/// yields `None`.
pub fn keyframe_interval<P>(probe: &P, path: &Path, duration_secs: f64) -> Option<f64>
where
    P: MediaProbe + ?Sized,
{
    if duration_secs < KEYFRAME_PROBE_WINDOWS[0] {
        return Some(SHORT_CLIP_KEYFRAME_INTERVAL);
    }

    for window in KEYFRAME_PROBE_WINDOWS {
        let timestamps = match probe.keyframe_timestamps(path, window) {
            Ok(ts) => ts,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "keyframe probe failed");
                return None;
            }
        };
        if let [first, .., last] = timestamps[..] {
            return Some((last - first) / (timestamps.len() - 1) as f64);
        }
    }

    Some(SPARSE_KEYFRAME_INTERVAL)
}
