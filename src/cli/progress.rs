//! Progress bar and summary reporting for CLI commands.

use indicatif::{ProgressBar, ProgressStyle};

use crate::download::{DownloadBatch, DownloadProgress};
use crate::format::{format_bytes, format_duration, format_megabytes, format_size_vs_limit};
use crate::report::{DownloadMode, DownloadReport, SavedArchive, preparing_text};
use crate::selection::TriState;
use crate::session::CatalogView;

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates the bar that counts finished batch entries.
pub fn make_batch_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} file(s) - {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╌"),
    );
    bar
}

/// [`DownloadProgress`] drawing one indicatif bar for the whole batch.
pub struct CliProgress {
    bar: ProgressBar,
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl CliProgress {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bar: make_batch_progress_bar(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl DownloadProgress for CliProgress {
    fn on_batch_start(&self, batch: &DownloadBatch, _mode: DownloadMode) {
        self.bar.set_length(batch.len() as u64);
    }

    fn on_file_start(&self, name: &str, _size: u64) {
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, _name: &str, _bytes: u64) {
        self.bar.inc(1);
    }

    fn on_error(&self, name: &str, error: &str) {
        self.bar.println(format!("  FAILED {name}: {error}"));
        self.bar.inc(1);
    }

    fn on_archive_saved(&self, archive: &SavedArchive) {
        self.bar.set_message(format!("saved {}", archive.path.display()));
    }
}

const fn marker(state: TriState) -> &'static str {
    match state {
        TriState::None => "[ ]",
        TriState::Partial => "[-]",
        TriState::Full => "[x]",
    }
}

/// Prints the visible cases with their selection state.
pub fn print_case_list(view: &CatalogView) {
    if view.cases.is_empty() {
        println!("No cases match the current filters.");
        return;
    }

    println!("\n{SEPARATOR}");
    println!("Cases:");
    println!("{SEPARATOR}");

    for case in &view.cases {
        let place = [case.record.city.as_deref(), case.record.country.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        let files = if case.resolved {
            format!("{} file(s), {}", case.visible_files, format_bytes(case.visible_bytes))
        } else {
            "files unavailable".to_string()
        };
        println!(
            "  {} {} ({}){}  {files}",
            marker(case.state),
            case.record.name,
            case.record.id,
            if place.is_empty() { String::new() } else { format!("  {place}") },
        );
    }

    println!("{SEPARATOR}");
    println!(
        "  {} case(s) shown, {} file(s) selected, {}",
        view.cases.len(),
        view.selected_files,
        view.total_selected_text
    );
    if !view.quarantined.is_empty() {
        println!("  {} malformed record(s) skipped", view.quarantined.len());
    }
    println!("{SEPARATOR}\n");
}

/// Prints the files of a batch before it starts.
pub fn print_batch(batch: &DownloadBatch, limit: u64) {
    println!("\n{SEPARATOR}");
    println!("Files to download:");
    println!("{SEPARATOR}");
    for entry in &batch.entries {
        println!("  {} ({})", entry.archive_entry_name, format_bytes(entry.size_bytes));
    }
    println!("{SEPARATOR}");
    println!("  {}", preparing_text(batch.len(), batch.total_size()));
    println!("  Limit: {}", format_size_vs_limit(batch.total_size(), limit));
    println!("{SEPARATOR}\n");
}

/// Prints a summary of a finished batch.
pub fn print_summary(report: &DownloadReport) {
    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");
    println!("  {}", report.status_text());
    println!("  Files requested:   {}", report.requested);
    println!("  Succeeded:         {}", report.succeeded);
    if report.failed > 0 {
        println!("  Failed:            {}", report.failed);
        for failure in &report.failures {
            println!("    {} ({})", failure.archive_entry_name, failure.error);
        }
    }
    if let Some(archive) = &report.archive {
        println!("  Archive:           {}", archive.path.display());
        println!("  Archive size:      {}", format_megabytes(archive.bytes));
    }
    println!("  Total time:        {}", format_duration(report.elapsed));
    println!("{SEPARATOR}");
}
