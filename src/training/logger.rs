//! Verbosity-gated progress logging for training runs.

// =============================================================================
// Verbosity
// =============================================================================

/// How chatty a training run is. Levels are ordered, so gating is a `>=` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// No output at all.
    Silent,
    /// Warnings only.
    Warning,
    /// Per-run and per-layer progress.
    Info,
    /// Per-phase detail, including worker-level messages.
    Debug,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Info
    }
}

// =============================================================================
// TrainingLogger
// =============================================================================

/// Writes run progress to stderr, keeping stdout free for prediction output.
#[derive(Debug, Clone)]
pub struct TrainingLogger {
    verbosity: Verbosity,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= Verbosity::Warning {
            eprintln!("[warn] {message}");
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= Verbosity::Info {
            eprintln!("{message}");
        }
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= Verbosity::Debug {
            eprintln!("[debug] {message}");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
