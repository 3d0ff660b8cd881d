use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub static PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {human_pos:>7}/{human_len:7} {msg}";
pub static SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:2.cyan/blue} {msg}";

fn new_progress_bar(total: u64, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(ProgressStyle::with_template(PROGRESS_TEMPLATE).unwrap().progress_chars("#>-"));
    bar.set_message(message);
    bar
}

fn new_spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message(message);
    bar
}

/// Progress bars shown while a transform is running: one for entries parsed (the producer's
/// rate) and one for rows written to the TSVs (the writer's rate, which lags behind parsing
/// when an entry fans out into many child rows).
#[derive(Clone)]
pub struct TransformBars {
    _multi: Arc<MultiProgress>,
    pub parsed: ProgressBar,
    pub written: ProgressBar,
}

impl TransformBars {
    pub fn new(total_entries: u64) -> TransformBars {
        let multi = MultiProgress::new();

        let parsed = if total_entries > 0 { new_progress_bar(total_entries, "parsed") } else { new_spinner("parsed") };
        let written =
            if total_entries > 0 { new_progress_bar(total_entries, "written") } else { new_spinner("written") };

        let parsed = multi.add(parsed);
        let written = multi.add(written);

        TransformBars { _multi: Arc::new(multi), parsed, written }
    }

    pub fn finish(&self) {
        self.parsed.finish();
        self.written.finish();
    }
}

/// A single spinner used while a table streams into the database.
pub fn new_load_spinner(table: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message(format!("loading {table}"));
    bar
}
