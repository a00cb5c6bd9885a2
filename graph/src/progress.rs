/// Mirrors `swh.alter.progressbar`: an injectable progress reporter so the
/// core algorithms stay silent in tests while the CLI renders real bars.
pub trait ProgressBar {
    fn update(&mut self, n_steps: u64);
}

/// Constructs progress bars. The CLI supplies an `indicatif`-backed
/// implementation; tests and library callers default to `NoProgress`.
pub trait ProgressReporter {
    fn bar(&self, length: Option<u64>, label: &str) -> Box<dyn ProgressBar>;
}

struct NoOpBar;

impl ProgressBar for NoOpBar {
    fn update(&mut self, _n_steps: u64) {}
}

/// A `ProgressReporter` that renders nothing, matching `no_progressbar`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn bar(&self, _length: Option<u64>, _label: &str) -> Box<dyn ProgressBar> {
        Box::new(NoOpBar)
    }
}
