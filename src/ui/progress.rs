use crate::index::IndexHooks;
use indicatif::ProgressBar;
use std::time::Duration;

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = if console::Term::stdout().is_term() {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(message.to_string());
        Self { pb }
    }

    pub fn start(&self) {
        self.pb.enable_steady_tick(Duration::from_millis(100));
    }

    pub fn finish_with_message(&self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }

    pub fn clear(&self) {
        self.pb.finish_and_clear();
    }
}

/// Index hooks that tick `spinner` while CREATE INDEX runs
pub fn index_hooks<'a>(spinner: &'a Spinner) -> IndexHooks<'a> {
    IndexHooks::new()
        .on_start(move || spinner.start())
        .on_end(move || spinner.finish_with_message("index built"))
}
