//! CLI mode: list the catalog and download selections from the terminal.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::download::{BatchDownloader, DownloadProgress};
use crate::filter::Dimension;
use crate::record::CaseId;
use crate::report::{DownloadMode, error_status_text};
use crate::session::{CatalogSession, load_session};
use crate::{listing, metadata};

use progress::{CliProgress, print_batch, print_case_list, print_summary};

/// Filters and selections given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub filters: Vec<(Dimension, String)>,
    pub search: Option<String>,
    pub file_types: Vec<String>,
    pub cases: Vec<CaseId>,
    pub files: Vec<(CaseId, String)>,
    pub select_all: bool,
    pub mode: DownloadMode,
    pub output: Option<PathBuf>,
}

impl CommandOptions {
    /// Parses command flags.
    ///
    /// Flags the command does not know are rejected.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first bad flag.
    pub fn parse(args: &[String]) -> std::result::Result<Self, String> {
        let mut options = Self::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| format!("{flag} requires a value"))
            };
            match arg.as_str() {
                "--filter" => {
                    let raw = value("--filter")?;
                    let (dim, val) = raw
                        .split_once('=')
                        .ok_or_else(|| format!("--filter expects DIMENSION=VALUE, got {raw:?}"))?;
                    let dimension = Dimension::parse(dim.trim())
                        .ok_or_else(|| format!("unknown dimension: {dim}"))?;
                    options.filters.push((dimension, val.trim().to_string()));
                }
                "--search" => options.search = Some(value("--search")?),
                "--type" => options.file_types.extend(
                    value("--type")?
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(file_type_token),
                ),
                "--case" => options.cases.push(CaseId::new(value("--case")?)),
                "--file" => {
                    let raw = value("--file")?;
                    let (case, key) = raw
                        .split_once(':')
                        .ok_or_else(|| format!("--file expects CASE:KEY, got {raw:?}"))?;
                    options.files.push((CaseId::from(case), key.to_string()));
                }
                "--all" => options.select_all = true,
                "--mode" => options.mode = value("--mode")?.parse()?,
                "-o" | "--output" => options.output = Some(PathBuf::from(value("--output")?)),
                other => return Err(format!("unknown option: {other}")),
            }
        }

        Ok(options)
    }
}

/// Normalizes `nc`, `.NC` and `.nc` to the `.nc` token form.
fn file_type_token(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

/// Applies filters, then selections, to a freshly loaded session.
///
/// Country filters go first, since changing the countries clears the city
/// restriction. Unknown cases and files are logged and skipped.
pub fn apply_options(session: &mut CatalogSession, options: &CommandOptions) {
    let (countries, others): (Vec<_>, Vec<_>) = options
        .filters
        .iter()
        .partition(|(dimension, _)| *dimension == Dimension::Country);
    for (dimension, value) in countries.into_iter().chain(others) {
        if !session.criteria().accepted(*dimension).contains(value)
            && !session.toggle_filter_value(*dimension, value)
        {
            log::warn!("No case has {} {value:?}", dimension.label());
        }
    }
    if let Some(search) = &options.search {
        session.set_search(search.clone());
    }
    if !options.file_types.is_empty() {
        session.set_file_types(options.file_types.iter().cloned());
    }

    if options.select_all {
        session.select_all_visible();
    }
    for id in &options.cases {
        if session.case(id).is_none() {
            log::warn!("Unknown case {id}");
        } else if !session.selection().is_full(id) && !session.toggle_case(id) {
            log::warn!("Case {id} has no files to select");
        }
    }
    for (id, key) in &options.files {
        if !session.selection().is_selected(id, key) && !session.toggle_file(id, key) {
            log::warn!("No visible file {key:?} in case {id}");
        }
    }
}

async fn load(config: &AppConfig) -> crate::Result<CatalogSession> {
    let metadata = metadata::source_from_config(config);
    let listing = listing::source_from_config(&config.sources);
    load_session(
        metadata.as_ref(),
        listing.as_deref(),
        &config.sources.listing_prefix,
    )
    .await
}

/// Prints the cases matching the given filters.
///
/// # Errors
///
/// Returns an error if the metadata index cannot be loaded.
pub async fn run_list(config: &AppConfig, options: &CommandOptions) -> crate::Result<()> {
    let mut session = load(config).await?;
    apply_options(&mut session, options);
    print_case_list(&session.view());
    Ok(())
}

/// Downloads the selected files as one archive or as direct transfers.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or the batch is refused
/// or fails entirely.
pub async fn run_download(config: &AppConfig, options: &CommandOptions) -> crate::Result<()> {
    let mut session = load(config).await?;
    apply_options(&mut session, options);
    let batch = session.download_batch();

    let mut download_config = config.download.clone();
    if let Some(dir) = &options.output {
        download_config = download_config.with_output_dir(dir.clone());
    }
    let downloader = BatchDownloader::new(download_config);
    if let Err(e) = downloader.check(&batch) {
        println!("{}", error_status_text(&e));
        return Err(e);
    }

    print_batch(&batch, downloader.config().max_batch_bytes);

    let cli_progress = Arc::new(CliProgress::new());
    let progress: Arc<dyn DownloadProgress> = cli_progress.clone();
    let result = downloader.download(&batch, options.mode, &progress).await;
    cli_progress.finish();

    match result {
        Ok(report) => {
            if options.mode == DownloadMode::Direct {
                let finished = downloader.sink().wait_idle().await;
                log::info!("{finished} direct transfer(s) finished");
            }
            print_summary(&report);
            Ok(())
        }
        Err(e) => {
            println!("{}", error_status_text(&e));
            Err(e)
        }
    }
}
