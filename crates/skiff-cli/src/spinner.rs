//! Terminal spinner as an owned handle.

use std::time::Duration;

use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// A running spinner. Consumed by [`Spinner::stop`], [`Spinner::succeed`]
/// or [`Spinner::fail`]; dropping it clears the line.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    /// Start spinning with `message`. Does nothing when stderr is not a terminal.
    pub fn start(message: impl Into<String>) -> Self {
        if !Term::stderr().is_term() {
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar: Some(bar) }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.into());
        }
    }

    pub fn stop(mut self) {
        self.clear();
    }

    pub fn succeed(mut self, message: impl AsRef<str>) {
        self.clear();
        eprintln!("{} {}", style("✓").green(), message.as_ref());
    }

    pub fn fail(mut self, message: impl AsRef<str>) {
        self.clear();
        eprintln!("{} {}", style("✗").red(), message.as_ref());
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.clear();
    }
}
