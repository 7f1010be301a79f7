//! Tabular views of the property table.
//!
//! A view picks the columns, a [`SortKey`] orders the rows, and records are
//! grouped into sections by the directory they were (or would be) moved to.

use crate::bitrate::BitrateModel;
use crate::ratio::RatioCatalog;
use crate::record::{ClassificationState, VideoRecord};
use crate::strategy::Strategy;
use clap::ValueEnum;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

const MB_PER_GB: f64 = 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum View {
    /// Resolution, rotation and nearest ratio bucket.
    Ratio,
    /// Actual against optimal bitrate and resolution, with a savings estimate.
    Bitrate,
    /// Keyframe spacing.
    Keyframe,
    /// Every property.
    All,
}

impl From<Strategy> for View {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Ratio => View::Ratio,
            Strategy::Bitrate => View::Bitrate,
            Strategy::Keyframe => View::Keyframe,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum SortKey {
    /// Natural filename order ("ep2" before "ep10").
    Filename,
    Width,
    Height,
    RatioDiff,
    Bitrate,
    BitrateRatio,
    Size,
    Duration,
    Keyframe,
}

/// One table cell, kept typed until rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Empty,
}

impl Cell {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Float(_))
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::Float)
    }
}

/// Records sharing one classification directory and dry-run flag.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSection {
    pub directory: Option<String>,
    pub pseudo: bool,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

impl TableSection {
    pub fn title(&self) -> String {
        match (&self.directory, self.pseudo) {
            (None, _) => "unclassified".to_string(),
            (Some(dir), true) => format!("{dir} (dry run)"),
            (Some(dir), false) => dir.clone(),
        }
    }
}

/// Aggregate size figures for the bitrate view, in GB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitrateSummary {
    pub target_bitrate_kbps: u32,
    pub total_gb: f64,
    pub expected_gb: f64,
    pub savings_gb: f64,
}

impl BitrateSummary {
    /// Flagged files are assumed to shrink by their bitrate ratio.
    pub fn compute(records: &[VideoRecord], model: &BitrateModel) -> Self {
        let mut total_mb = 0.0;
        let mut expected_mb = 0.0;

        for record in records {
            total_mb += record.file_size_mb;
            let (bitrate, w, h) = (record.video_bitrate_kbps, record.width, record.height);
            let flagged = model.is_overencoded_standard_def(bitrate, w, h)
                || model.is_overbitrate_high_def(bitrate, w, h);
            let ratio = bitrate_ratio(record, model);

            expected_mb += if flagged && ratio > 0.0 {
                record.file_size_mb / ratio
            } else {
                record.file_size_mb
            };
        }

        Self {
            target_bitrate_kbps: model.base_bitrate_kbps,
            total_gb: total_mb / MB_PER_GB,
            expected_gb: expected_mb / MB_PER_GB,
            savings_gb: (total_mb - expected_mb) / MB_PER_GB,
        }
    }
}

/// Actual over optimal bitrate; 0.0 when no optimal figure exists.
pub fn bitrate_ratio(record: &VideoRecord, model: &BitrateModel) -> f64 {
    match model.optimal_bitrate(record.width, record.height) {
        0 => 0.0,
        optimal => record.video_bitrate_kbps as f64 / optimal as f64,
    }
}

pub fn headers(view: View) -> Vec<&'static str> {
    match view {
        View::Ratio => vec![
            "filename",
            "width",
            "height",
            "rotation",
            "ratio",
            "bucket",
            "reference",
            "diff",
        ],
        View::Bitrate => vec![
            "filename",
            "width",
            "height",
            "kbps",
            "|",
            "opt width",
            "opt height",
            "opt kbps",
            "ratio",
        ],
        View::Keyframe => vec!["filename", "width", "height", "keyframe"],
        View::All => vec![
            "filename", "width", "height", "rotation", "fps", "kbps", "audio", "MB", "seconds",
            "codec", "ratio", "bucket", "diff", "keyframe",
        ],
    }
}

pub fn row(record: &VideoRecord, view: View, model: &BitrateModel) -> Vec<Cell> {
    let name = Cell::from(record.filename.as_str());
    let width = Cell::Int(record.width.into());
    let height = Cell::Int(record.height.into());

    match view {
        View::Ratio => vec![
            name,
            width,
            height,
            Cell::Int(record.rotation_degrees.into()),
            Cell::Float(record.aspect_ratio),
            Cell::from(record.ratio.bucket_id),
            Cell::Text(
                RatioCatalog::bucket(record.ratio.bucket_id)
                    .map(|b| b.resolution_label())
                    .unwrap_or_default(),
            ),
            Cell::Float(record.ratio.difference),
        ],
        View::Bitrate => {
            let scale = model.optimal_resolution_scale(record.width, record.height);
            vec![
                name,
                width,
                height,
                Cell::Int(record.video_bitrate_kbps.into()),
                Cell::from("|"),
                Cell::Int((scale * record.width as f64) as i64),
                Cell::Int((scale * record.height as f64) as i64),
                Cell::Int(model.optimal_bitrate(record.width, record.height).into()),
                Cell::Float(bitrate_ratio(record, model)),
            ]
        }
        View::Keyframe => vec![name, width, height, record.keyframe_interval_secs.into()],
        View::All => vec![
            name,
            width,
            height,
            Cell::Int(record.rotation_degrees.into()),
            Cell::Float(record.fps),
            Cell::Int(record.video_bitrate_kbps.into()),
            Cell::Int(record.audio_bitrate_kbps.into()),
            Cell::Float(record.file_size_mb),
            Cell::Float(record.duration_secs),
            Cell::Text(record.codec.clone()),
            Cell::Float(record.aspect_ratio),
            Cell::from(record.ratio.bucket_id),
            Cell::Float(record.ratio.difference),
            record.keyframe_interval_secs.into(),
        ],
    }
}

/// Groups `records` into sections ordered unclassified first, then real
/// classifications, then dry-run ones, each by directory name.
///
/// Dry-run state is reconciled against the files actually in `root`.
pub fn build_sections(
    records: &[VideoRecord],
    root: &Path,
    view: View,
    sort: Option<SortKey>,
    model: &BitrateModel,
) -> Vec<TableSection> {
    let mut groups: BTreeMap<(bool, bool, String), Vec<&VideoRecord>> = BTreeMap::new();
    for record in records {
        let pseudo = record.state_in(root) == ClassificationState::PseudoClassified;
        let key = match &record.classified_directory {
            None => (false, false, String::new()),
            Some(dir) => (true, pseudo, dir.clone()),
        };
        groups.entry(key).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|((has_dir, pseudo, dir), mut members)| {
            if let Some(key) = sort {
                members.sort_by(|a, b| compare(a, b, key, model));
            }
            TableSection {
                directory: has_dir.then_some(dir),
                pseudo,
                headers: headers(view),
                rows: members.iter().map(|r| row(r, view, model)).collect(),
            }
        })
        .collect()
}

fn compare(a: &VideoRecord, b: &VideoRecord, key: SortKey, model: &BitrateModel) -> Ordering {
    let by_float = |x: f64, y: f64| x.total_cmp(&y);
    match key {
        SortKey::Filename => natural_key(&a.filename).cmp(&natural_key(&b.filename)),
        SortKey::Width => a.width.cmp(&b.width),
        SortKey::Height => a.height.cmp(&b.height),
        SortKey::RatioDiff => by_float(a.ratio.difference, b.ratio.difference),
        SortKey::Bitrate => a.video_bitrate_kbps.cmp(&b.video_bitrate_kbps),
        SortKey::BitrateRatio => by_float(bitrate_ratio(a, model), bitrate_ratio(b, model)),
        SortKey::Size => by_float(a.file_size_mb, b.file_size_mb),
        SortKey::Duration => by_float(a.duration_secs, b.duration_secs),
        // Unmeasured records sort first.
        SortKey::Keyframe => a
            .keyframe_interval_secs
            .unwrap_or(f64::NEG_INFINITY)
            .total_cmp(&b.keyframe_interval_secs.unwrap_or(f64::NEG_INFINITY)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalChunk {
    Number(u64),
    Text(String),
}

/// Splits a name into digit and non-digit runs; digits compare numerically,
/// text case-insensitively.
fn natural_key(name: &str) -> Vec<NaturalChunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;

    let mut flush = |current: &mut String, digits: bool| {
        if current.is_empty() {
            return;
        }
        let chunk = if digits {
            current
                .parse()
                .map(NaturalChunk::Number)
                .unwrap_or_else(|_| NaturalChunk::Text(current.clone()))
        } else {
            NaturalChunk::Text(current.to_lowercase())
        };
        chunks.push(chunk);
        current.clear();
    };

    for ch in name.chars() {
        let is_digit = ch.is_ascii_digit();
        if is_digit != in_digits {
            flush(&mut current, in_digits);
            in_digits = is_digit;
        }
        current.push(ch);
    }
    flush(&mut current, in_digits);
    chunks
}
