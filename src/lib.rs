//! vidtidy - sort a folder of videos into subdirectories
//!
//! This library probes video files, caches their properties per root
//! directory, and classifies them by aspect ratio, bitrate or keyframe
//! spacing. Classification can be a dry run, and can be rolled back.

pub mod bitrate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod file_organizer;
pub mod logging;
pub mod output;
pub mod probe;
pub mod ratio;
pub mod record;
pub mod strategy;
pub mod table;
pub mod undo;
pub mod views;

pub use bitrate::BitrateModel;
pub use cache::{CacheHandle, ClassificationCache};
pub use config::{ConfigError, ExceptionFilters, Settings};
pub use engine::{ClassificationEngine, ClassifyReport};
pub use file_organizer::{FileOrganizer, OrganizeError, OrganizeResult};
pub use probe::{FfprobeProbe, MediaProbe, ProbeError, RawProps};
pub use ratio::{ClosestRatio, RatioCatalog};
pub use record::{ClassificationState, VideoRecord};
pub use strategy::{Strategy, StrategyContext};
pub use table::PropertyTable;
pub use undo::{UnclassifyReport, UndoManager};
pub use views::{SortKey, View};

pub use cli::{Cli, run_cli};
