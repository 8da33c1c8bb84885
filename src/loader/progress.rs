use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;

use crate::loader::error::LoadPhase;
use crate::loader::options::ProgressCallback;
use crate::model::EntityKind;

/// Snapshot handed to the progress callback after each chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadProgress {
    /// Phase the chunk completed.
    pub phase: LoadPhase,
    /// Vertex or edge.
    pub kind: EntityKind,
    /// Type being loaded.
    pub type_name: String,
    /// Records of this type handled so far, including failed chunks.
    pub processed: usize,
    /// Records of this type to load.
    pub total: usize,
    /// One-based chunk number.
    pub batch: usize,
    /// Number of chunks for this type.
    pub total_batches: usize,
    /// Time since the load started.
    pub elapsed: Duration,
}

const BAR_TEMPLATE: &str = "{prefix:>24} [{bar:32}] {pos}/{len} {msg}";

/// Renders load progress as one terminal bar per type.
pub struct ProgressBarReporter {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: Mutex<BTreeMap<(EntityKind, String), ProgressBar>>,
}

impl ProgressBarReporter {
    /// Draws to stderr.
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Tracks progress without drawing anything.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self {
            multi: MultiProgress::with_draw_target(target),
            style,
            bars: Mutex::new(BTreeMap::new()),
        }
    }

    /// Updates the bar of the type `progress` describes.
    pub fn observe(&self, progress: &LoadProgress) {
        let mut bars = self.bars.lock();
        let bar = bars
            .entry((progress.kind, progress.type_name.clone()))
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(progress.total as u64));
                bar.set_style(self.style.clone());
                bar.set_prefix(format!("{} {}", progress.kind, progress.type_name));
                bar
            });
        bar.set_position(progress.processed as u64);
        bar.set_message(format!(
            "batch {}/{}",
            progress.batch, progress.total_batches
        ));
        if progress.batch == progress.total_batches {
            bar.finish();
        }
    }

    /// Records handled so far for a type, if it reported any progress.
    pub fn position(&self, kind: EntityKind, type_name: &str) -> Option<u64> {
        self.bars
            .lock()
            .get(&(kind, type_name.to_owned()))
            .map(ProgressBar::position)
    }

    /// Callback forwarding to [`observe`](Self::observe).
    pub fn callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Arc::new(move |progress: &LoadProgress| reporter.observe(progress))
    }

    /// Clears every bar.
    pub fn finish(&self) {
        for bar in self.bars.lock().values() {
            bar.finish_and_clear();
        }
    }
}

impl Default for ProgressBarReporter {
    fn default() -> Self {
        Self::new()
    }
}
