//! Progress bars for interactive terminals.

use std::time::Duration;

use dashmap::DashMap;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reelfetch_core::{ProgressReporter, ProgressUpdate, group_thousands};

const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix} [{bar:30.cyan/blue}] {percent:>3}% {bytes}/{total_bytes} @ {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {prefix} {bytes} @ {msg}";

/// One bar per in-flight transfer.
#[derive(Debug, Default)]
pub(crate) struct TerminalProgress {
    multi: MultiProgress,
    bars: DashMap<String, ProgressBar>,
}

impl TerminalProgress {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for TerminalProgress {
    fn started(&self, name: &str, total: Option<u64>) {
        let bar = match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("█░"),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template(SPINNER_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.enable_steady_tick(Duration::from_millis(120));
                bar
            }
        };
        let bar = self.multi.add(bar);
        bar.set_prefix(name.to_string());
        bar.set_message("calculating...");
        self.bars.insert(name.to_string(), bar);
    }

    fn update(&self, name: &str, update: &ProgressUpdate) {
        if let Some(bar) = self.bars.get(name) {
            bar.set_position(update.downloaded);
            bar.set_message(update.rate_label());
        }
    }

    fn finished(&self, name: &str, bytes: u64, success: bool) {
        let Some((_, bar)) = self.bars.remove(name) else {
            return;
        };
        bar.finish_and_clear();
        let line = if success {
            format!("Successfully downloaded: {name} ({} bytes)", group_thousands(bytes))
        } else {
            format!("Discarded incomplete download: {name}")
        };
        // Printing through the multi-bar keeps the remaining bars intact.
        if self.multi.println(&line).is_err() {
            eprintln!("{line}");
        }
    }
}
