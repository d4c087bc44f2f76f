use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{failure, pending, success};

/// Spinner shown while a fetch round is loading.
pub struct LoadingSpinner {
    pb: ProgressBar,
}

impl LoadingSpinner {
    pub fn start(message: &str) -> Self {
        Self {
            pb: create_spinner(pending(message).to_string()),
        }
    }

    pub fn finish(self, message: &str) {
        self.pb
            .finish_with_message(success(format!("{message} ✓")).to_string());
    }

    pub fn fail(self, message: &str) {
        self.pb
            .abandon_with_message(failure(format!("{message} ✗")).to_string());
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::with_template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
