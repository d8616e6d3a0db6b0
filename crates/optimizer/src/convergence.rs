use crate::config::OptimizerConfig;
use crate::state::Round;

/// Trailing-window diminishing-returns check. Advisory only.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvergenceDetector {
    window: usize,
    threshold: f64,
}

impl ConvergenceDetector {
    pub fn new(window: usize, threshold: f64) -> Self {
        Self {
            window: window.max(1),
            threshold,
        }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.convergence_window, config.convergence_threshold)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Mean effective improvement over the last `window` rounds, or `None`
    /// while fewer than `window` rounds exist.
    pub fn mean_recent_improvement(&self, history: &[Round]) -> Option<f64> {
        if history.len() < self.window {
            return None;
        }
        let recent = &history[history.len() - self.window..];
        let total: f64 = recent.iter().map(Round::effective_improvement).sum();
        Some(total / self.window as f64)
    }

    pub fn is_diminishing(&self, history: &[Round]) -> bool {
        self.mean_recent_improvement(history)
            .is_some_and(|mean| mean < self.threshold)
    }
}

/// Free-function form of [`ConvergenceDetector::is_diminishing`].
pub fn is_diminishing(history: &[Round], window: usize, threshold: f64) -> bool {
    ConvergenceDetector::new(window, threshold).is_diminishing(history)
}
