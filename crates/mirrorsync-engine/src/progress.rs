//! Progress reporting for mirror runs.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Progress update information.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Repository being mirrored, as `owner/name`.
    pub repository: Option<String>,

    pub phase: SyncPhase,

    /// Components finished in the current run.
    pub completed: u64,

    /// Components scheduled for the current run.
    pub total: u64,

    pub message: Option<String>,
}

/// Phases of one repository run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncPhase {
    Starting = 0,
    /// Asking the destination to pull code from the source.
    CodeMirror = 1,
    Labels = 2,
    Milestones = 3,
    Issues = 4,
    PullRequests = 5,
    Wiki = 6,
    Releases = 7,
    Complete = 8,
}

impl SyncPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::CodeMirror,
            2 => Self::Labels,
            3 => Self::Milestones,
            4 => Self::Issues,
            5 => Self::PullRequests,
            6 => Self::Wiki,
            7 => Self::Releases,
            _ => Self::Complete,
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "Starting"),
            Self::CodeMirror => write!(f, "Triggering code mirror"),
            Self::Labels => write!(f, "Mirroring labels"),
            Self::Milestones => write!(f, "Mirroring milestones"),
            Self::Issues => write!(f, "Mirroring issues"),
            Self::PullRequests => write!(f, "Mirroring pull requests"),
            Self::Wiki => write!(f, "Mirroring wiki"),
            Self::Releases => write!(f, "Mirroring releases"),
            Self::Complete => write!(f, "Complete"),
        }
    }
}

/// Phase and component counter for a run, shared with an optional callback.
pub struct SyncProgress {
    phase: AtomicU8,
    completed: AtomicU64,
    total: AtomicU64,
    repository: parking_lot::Mutex<Option<String>>,
    callback: Option<Arc<ProgressCallback>>,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(SyncPhase::Starting as u8),
            completed: AtomicU64::new(0),
            total: AtomicU64::new(0),
            repository: parking_lot::Mutex::new(None),
            callback: None,
        }
    }

    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
            ..Self::new()
        }
    }

    /// Reset counters for a new repository run with `total` components.
    pub fn start(&self, repository: &str, total: u64) {
        *self.repository.lock() = Some(repository.to_string());
        self.phase.store(SyncPhase::Starting as u8, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        self.notify(None);
    }

    pub fn set_phase(&self, phase: SyncPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        self.notify(None);
    }

    /// Mark the current component finished.
    pub fn complete_component(&self, message: Option<&str>) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.notify(message.map(str::to_string));
    }

    pub fn message(&self, msg: &str) {
        self.notify(Some(msg.to_string()));
    }

    pub fn percentage(&self) -> f64 {
        let total = self.total.load(Ordering::SeqCst);
        if total == 0 {
            return 0.0;
        }
        let completed = self.completed.load(Ordering::SeqCst);
        (completed as f64 / total as f64) * 100.0
    }

    pub fn current_phase(&self) -> SyncPhase {
        SyncPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn notify(&self, message: Option<String>) {
        if let Some(callback) = &self.callback {
            let update = ProgressUpdate {
                repository: self.repository.lock().clone(),
                phase: self.current_phase(),
                completed: self.completed.load(Ordering::SeqCst),
                total: self.total.load(Ordering::SeqCst),
                message,
            };
            callback(update);
        }
    }
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Console progress reporter using indicatif.
pub struct ConsoleProgressReporter {
    progress_bar: indicatif::ProgressBar,
}

impl ConsoleProgressReporter {
    pub fn new() -> Self {
        let progress_bar = indicatif::ProgressBar::new(0);
        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            progress_bar.set_style(style.progress_chars("#>-"));
        }
        Self { progress_bar }
    }

    /// Callback that renders updates on the bar.
    pub fn callback(&self) -> ProgressCallback {
        let pb = self.progress_bar.clone();
        Box::new(move |update: ProgressUpdate| {
            pb.set_length(update.total);
            pb.set_position(update.completed);

            let mut msg = update.phase.to_string();
            if let Some(repo) = &update.repository {
                msg = format!("{repo}: {msg}");
            }
            if let Some(message) = &update.message {
                msg = format!("{msg} - {message}");
            }
            pb.set_message(msg);
        })
    }

    pub fn finish(&self, message: &str) {
        self.progress_bar.finish_with_message(message.to_string());
    }
}

impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
