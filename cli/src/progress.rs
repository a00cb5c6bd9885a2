//! `indicatif`-backed `ProgressReporter`: the CLI's concrete renderer for
//! the injectable progress trait the core algorithms report through.

use indicatif::{MultiProgress, ProgressBar as IndicatifBar, ProgressStyle};
use swh_graph::{ProgressBar, ProgressReporter};

pub struct IndicatifProgress {
    multi: MultiProgress,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        IndicatifProgress {
            multi: MultiProgress::new(),
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

struct Bar(IndicatifBar);

impl ProgressBar for Bar {
    fn update(&mut self, n_steps: u64) {
        self.0.inc(n_steps);
    }
}

impl ProgressReporter for IndicatifProgress {
    fn bar(&self, length: Option<u64>, label: &str) -> Box<dyn ProgressBar> {
        let bar = match length {
            Some(len) => self.multi.add(IndicatifBar::new(len)),
            None => self.multi.add(IndicatifBar::new_spinner()),
        };
        let style = if length.is_some() {
            ProgressStyle::with_template("{msg} {bar:40.cyan/blue} {pos}/{len}")
        } else {
            ProgressStyle::with_template("{msg} {spinner} {pos}")
        };
        if let Ok(style) = style {
            bar.set_style(style);
        }
        bar.set_message(label.to_string());
        Box::new(Bar(bar))
    }
}
