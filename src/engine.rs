//! Classification engine.
//!
//! Ties the cache, strategies, filesystem moves and rollback together. The
//! engine itself holds only configuration; all mutable state lives in the
//! caller's [`CacheHandle`].

use crate::cache::{CacheHandle, ClassificationCache};
use crate::config::{ConfigError, ExceptionFilters, Settings};
use crate::file_organizer::{FileOrganizer, OrganizeResult};
use crate::output::{OutputFormatter, TableStyle, render_sections};
use crate::probe::MediaProbe;
use crate::record::{ClassificationState, VideoRecord};
use crate::strategy::{ExceptionRule, Strategy, StrategyContext};
use crate::undo::{UnclassifyReport, UndoManager};
use crate::views::{BitrateSummary, SortKey, View, build_sections};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of one classify run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifyReport {
    pub pseudo: bool,
    /// `(filename, directory)` for every record that got a directory.
    pub classified: Vec<(String, String)>,
    /// Records left alone because an exception rule matched.
    pub excepted: usize,
    /// Records already dry-run classified, skipped in pseudo mode.
    pub already_pseudo: usize,
    /// Records whose file is no longer in the root.
    pub absent: usize,
    /// `(filename, reason)` for moves that failed; their state was reverted.
    pub failures: Vec<(String, String)>,
}

impl ClassifyReport {
    pub fn counts_by_directory(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (_, directory) in &self.classified {
            *counts.entry(directory.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Classifies the videos in one root directory.
///
/// # Examples
///
/// ```no_run
/// use vidtidy::cache::CacheHandle;
/// use vidtidy::engine::ClassificationEngine;
/// use vidtidy::probe::FfprobeProbe;
/// use vidtidy::strategy::Strategy;
///
/// let engine = ClassificationEngine::new("/videos", FfprobeProbe::default());
/// let mut cache = CacheHandle::new();
/// let report = engine.classify(&mut cache, Strategy::Ratio, false).unwrap();
/// println!("{} files moved", report.classified.len());
/// ```
pub struct ClassificationEngine<P: MediaProbe> {
    root: PathBuf,
    probe: P,
    context: StrategyContext,
    style: TableStyle,
    exception_rules: Vec<ExceptionRule>,
}

impl<P: MediaProbe> ClassificationEngine<P> {
    /// Engine with default thresholds and no exception rules.
    pub fn new(root: impl Into<PathBuf>, probe: P) -> Self {
        Self {
            root: root.into(),
            probe,
            context: StrategyContext::default(),
            style: TableStyle::default(),
            exception_rules: Vec::new(),
        }
    }

    /// Engine configured from `settings`, including its exception filters.
    ///
    /// # Errors
    ///
    /// Fails if an exception pattern doesn't compile.
    pub fn from_settings(
        root: impl Into<PathBuf>,
        probe: P,
        settings: &Settings,
    ) -> Result<Self, ConfigError> {
        let mut engine = Self::new(root, probe)
            .with_context(StrategyContext::from_settings(settings))
            .with_style(TableStyle {
                filename_max_width: settings.display.filename_max_width,
                float_precision: settings.display.float_precision,
            });
        engine.add_exception_filters(settings.exceptions.compile()?);
        Ok(engine)
    }

    pub fn with_context(mut self, context: StrategyContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.style = style;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn context(&self) -> &StrategyContext {
        &self.context
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Registers a predicate; matching records are never classified.
    pub fn add_exception_rule<F>(&mut self, rule: F)
    where
        F: Fn(&VideoRecord) -> bool + Send + Sync + 'static,
    {
        self.exception_rules.push(Box::new(rule));
    }

    /// Registers filename filters compiled from configuration.
    pub fn add_exception_filters(&mut self, filters: ExceptionFilters) {
        self.add_exception_rule(move |record| filters.is_excepted(&record.filename));
    }

    fn is_excepted(&self, record: &VideoRecord) -> bool {
        self.exception_rules.iter().any(|rule| rule(record))
    }

    /// The cache for this engine's root, built on first use.
    ///
    /// # Errors
    ///
    /// Fails if the root is not a readable directory.
    pub fn load<'a>(&self, cache: &'a mut CacheHandle) -> OrganizeResult<&'a mut ClassificationCache> {
        cache.get(&self.root, &self.probe)
    }

    /// Adds keyframe data to the cache. Passing `false` never removes it.
    ///
    /// Returns whether any probing happened.
    pub fn include_keyframe_interval(
        &self,
        cache: &mut CacheHandle,
        include: bool,
    ) -> OrganizeResult<bool> {
        Ok(self.load(cache)?.request_keyframes(include, &self.probe))
    }

    /// Runs `strategy` over every file in the root.
    ///
    /// With `pseudo` set, decisions are recorded but no file is moved, and
    /// records already dry-run classified are left as they are.
    ///
    /// # Errors
    ///
    /// Fails only if the cache cannot be built. Failed moves are collected in
    /// the report and leave the record's previous state in place.
    pub fn classify(
        &self,
        cache: &mut CacheHandle,
        strategy: Strategy,
        pseudo: bool,
    ) -> OrganizeResult<ClassifyReport> {
        let cache = self.load(cache)?;
        if strategy.requires_keyframes() {
            cache.request_keyframes(true, &self.probe);
        }

        let root = cache.root().to_path_buf();
        let mut report = ClassifyReport {
            pseudo,
            ..ClassifyReport::default()
        };

        for record in cache.table_mut().records_mut() {
            match record.state_in(&root) {
                ClassificationState::Classified => {
                    report.absent += 1;
                    continue;
                }
                ClassificationState::Unclassified if !record.is_present_in(&root) => {
                    report.absent += 1;
                    continue;
                }
                ClassificationState::PseudoClassified if pseudo => {
                    report.already_pseudo += 1;
                    continue;
                }
                _ => {}
            }

            if self.is_excepted(record) {
                debug!(file = %record.filename, "excepted");
                report.excepted += 1;
                continue;
            }

            let Some(directory) = strategy.classified_directory(record, &self.context) else {
                continue;
            };
            let previous = record.classified_directory.replace(directory.clone());

            if pseudo {
                report.classified.push((record.filename.clone(), directory));
                continue;
            }

            let outcome = FileOrganizer::move_into_subdir(&root, &record.filename, &directory)
                .map_err(|e| e.to_string())
                .and_then(|op| {
                    if op.new_path.is_file() {
                        Ok(())
                    } else {
                        Err(format!("{} missing after move", op.new_path.display()))
                    }
                });

            match outcome {
                Ok(()) => {
                    info!(file = %record.filename, directory = %directory, "classified");
                    report.classified.push((record.filename.clone(), directory));
                }
                Err(reason) => {
                    warn!(file = %record.filename, %reason, "move failed");
                    record.classified_directory = previous;
                    report.failures.push((record.filename.clone(), reason));
                }
            }
        }

        Ok(report)
    }

    /// Renders `view` grouped by classification directory.
    ///
    /// # Errors
    ///
    /// Fails only if the cache cannot be built.
    pub fn render(
        &self,
        cache: &mut CacheHandle,
        view: View,
        sort: Option<SortKey>,
    ) -> OrganizeResult<String> {
        let cache = self.load(cache)?;
        let records = cache.table().records();
        let model = &self.context.model;

        let sections = build_sections(records, cache.root(), view, sort, model);
        let summary = (view == View::Bitrate).then(|| BitrateSummary::compute(records, model));

        Ok(render_sections(&sections, summary.as_ref(), &self.style))
    }

    /// Prints [`render`](Self::render) to stdout.
    pub fn print(
        &self,
        cache: &mut CacheHandle,
        view: View,
        sort: Option<SortKey>,
    ) -> OrganizeResult<()> {
        let rendered = self.render(cache, view, sort)?;
        OutputFormatter::plain(rendered.trim_end());
        Ok(())
    }

    /// Undoes classification for this root.
    ///
    /// With `pseudo_only`, only dry-run decisions are forgotten. Otherwise
    /// every file in every subdirectory is moved back to the root, and files
    /// the cache didn't know about are probed and added.
    ///
    /// Does nothing (with a warning) if the cache isn't loaded for this root.
    ///
    /// # Errors
    ///
    /// Fails only if the root cannot be listed during a full rollback.
    pub fn unclassify(
        &self,
        cache: &mut CacheHandle,
        pseudo_only: bool,
    ) -> OrganizeResult<UnclassifyReport> {
        let Some(cache) = cache.peek_mut(&self.root) else {
            warn!(root = %self.root.display(), "no cache loaded, nothing to unclassify");
            return Ok(UnclassifyReport::default());
        };

        if pseudo_only {
            return Ok(UndoManager::clear_pseudo_flags(&self.root, cache.table_mut()));
        }

        let report = UndoManager::rollback(&self.root, cache.table_mut())?;
        let admitted = cache.admit(&report.restored_files, &self.probe);
        if admitted > 0 {
            debug!(admitted, "restored files added to the cache");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ProbeError, RawProps};
    use std::fs;
    use tempfile::TempDir;

    struct FixedProbe;

    impl MediaProbe for FixedProbe {
        fn analyze(&self, path: &Path) -> Result<RawProps, ProbeError> {
            let portrait = path.to_string_lossy().contains("portrait");
            Ok(RawProps {
                width: if portrait { 1080 } else { 1920 },
                height: if portrait { 1920 } else { 1080 },
                video_bitrate_bps: 2_000_000,
                duration_secs: 30.0,
                ..RawProps::default()
            })
        }

        fn keyframe_timestamps(&self, _path: &Path, _window: f64) -> Result<Vec<f64>, ProbeError> {
            Ok(vec![0.0, 4.0])
        }
    }

    fn setup(names: &[&str]) -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        for name in names {
            fs::write(temp_dir.path().join(name), "video").expect("Failed to write file");
        }
        temp_dir
    }

    #[test]
    fn test_classify_by_ratio_moves_files() {
        let dir = setup(&["land.mp4", "portrait.mp4"]);
        let engine = ClassificationEngine::new(dir.path(), FixedProbe);
        let mut cache = CacheHandle::new();

        let report = engine
            .classify(&mut cache, Strategy::Ratio, false)
            .expect("Classification failed");

        assert_eq!(report.classified.len(), 2);
        assert!(dir.path().join("16-9").join("land.mp4").exists());
        assert!(dir.path().join("rev 16-9").join("portrait.mp4").exists());
        assert_eq!(report.counts_by_directory().get("16-9"), Some(&1));
    }

    #[test]
    fn test_pseudo_classify_is_idempotent() {
        let dir = setup(&["land.mp4"]);
        let engine = ClassificationEngine::new(dir.path(), FixedProbe);
        let mut cache = CacheHandle::new();

        let first = engine.classify(&mut cache, Strategy::Ratio, true).unwrap();
        let second = engine.classify(&mut cache, Strategy::Ratio, true).unwrap();

        assert_eq!(first.classified.len(), 1);
        assert!(second.classified.is_empty());
        assert_eq!(second.already_pseudo, 1);
        assert!(dir.path().join("land.mp4").exists());
        assert!(!dir.path().join("16-9").exists());
    }

    #[test]
    fn test_keyframe_strategy_requests_keyframes() {
        let dir = setup(&["land.mp4"]);
        let engine = ClassificationEngine::new(dir.path(), FixedProbe);
        let mut cache = CacheHandle::new();

        let report = engine.classify(&mut cache, Strategy::Keyframe, true).unwrap();

        assert_eq!(
            report.classified,
            vec![("land.mp4".to_string(), "keyframe-adjust".to_string())]
        );
        assert!(cache.peek(dir.path()).unwrap().includes_keyframe_data());
    }

    #[test]
    fn test_unclassify_without_cache_is_noop() {
        let dir = setup(&["land.mp4"]);
        fs::create_dir(dir.path().join("16-9")).unwrap();
        fs::write(dir.path().join("16-9").join("old.mp4"), "video").unwrap();
        let engine = ClassificationEngine::new(dir.path(), FixedProbe);
        let mut cache = CacheHandle::new();

        let report = engine.unclassify(&mut cache, false).unwrap();

        assert_eq!(report, UnclassifyReport::default());
        assert!(dir.path().join("16-9").join("old.mp4").exists());
    }

    #[test]
    fn test_render_bitrate_view_has_summary() {
        let dir = setup(&["land.mp4"]);
        let engine = ClassificationEngine::new(dir.path(), FixedProbe);
        let mut cache = CacheHandle::new();

        let rendered = engine.render(&mut cache, View::Bitrate, None).unwrap();

        assert!(rendered.starts_with("[unclassified] 1"));
        assert!(rendered.contains("Target bitrate: 1550 kbps"));
    }
}
