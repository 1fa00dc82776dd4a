//! Parallel analysis of many note files.

use crate::SUPPORTED_EXTENSIONS;
use crate::analyzer::{self, PipelineError};
use crate::config::AppConfig;
use crate::export::{self, ExportError, ExportFormat};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Failure of one file in a batch.
#[derive(Error, Debug)]
enum FileError {
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
    #[error("{0}")]
    Export(#[from] ExportError),
}

pub struct BatchResult {
    pub analyzed: u64,
    pub failed: u64,
}

/// Expand files and directories into the supported note files they contain.
///
/// Explicit file arguments are kept regardless of extension so that the
/// loader reports unsupported formats. Missing paths are kept too, so they
/// count as failures. Directory walks are sorted by path.
pub fn discover_note_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            log::warn!("No such file or directory: {}", path.display());
            files.push(path.clone());
            continue;
        }
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry under {}: {}", path.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
                files.push(entry.into_path());
            }
        }
    }
    files
}

/// Output location for one input: `<out_dir>/<stem>.structure.<ext>`.
pub fn output_path(input: &Path, out_dir: &Path, format: ExportFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "notes".to_string());
    out_dir.join(format!("{stem}.structure.{}", format.extension()))
}

/// Output locations for a batch, one per input, all distinct.
///
/// The first input with a given stem gets the plain [`output_path`]; later
/// inputs with the same stem get `<stem>-2`, `<stem>-3`, and so on.
pub fn plan_outputs(files: &[PathBuf], out_dir: &Path, format: ExportFormat) -> Vec<PathBuf> {
    let mut taken: HashSet<PathBuf> = HashSet::new();
    files
        .iter()
        .map(|file| {
            let mut out = output_path(file, out_dir, format);
            let mut n = 2;
            while taken.contains(&out) {
                let stem = file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "notes".to_string());
                out = out_dir.join(format!("{stem}-{n}.structure.{}", format.extension()));
                n += 1;
            }
            if n > 2 {
                log::info!(
                    "{} shares its name with another input, writing {}",
                    file.display(),
                    out.display()
                );
            }
            taken.insert(out.clone());
            out
        })
        .collect()
}

/// Analyze every note file under `paths` with `jobs` rayon workers and write
/// one structure file per input into `out_dir`.
///
/// A file that fails to load, analyze, or export is logged and counted;
/// the rest of the batch continues.
pub fn analyze_paths(
    paths: &[PathBuf],
    out_dir: &Path,
    format: ExportFormat,
    jobs: usize,
    config: &AppConfig,
) -> Result<BatchResult, BatchError> {
    let files = discover_note_files(paths);
    if files.is_empty() {
        log::info!("No note files to analyze");
        return Ok(BatchResult {
            analyzed: 0,
            failed: 0,
        });
    }

    let jobs = jobs.max(1);
    log::info!("Analyzing {} files with {} workers", files.len(), jobs);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
    let outputs = plan_outputs(&files, out_dir, format);

    let results: Vec<(PathBuf, Result<PathBuf, FileError>)> = pool.install(|| {
        use rayon::prelude::*;
        files
            .par_iter()
            .zip(outputs.par_iter())
            .map(|(file, out)| {
                let result = analyze_one(file, out, format, config);
                pb.inc(1);
                (file.clone(), result)
            })
            .collect()
    });

    let mut analyzed: u64 = 0;
    let mut failed: u64 = 0;
    for (file, result) in results {
        match result {
            Ok(written) => {
                log::info!("{} -> {}", file.display(), written.display());
                analyzed += 1;
            }
            Err(e) => {
                log::warn!("Analysis failed for {}: {}", file.display(), e);
                failed += 1;
            }
        }
    }

    pb.finish_with_message(format!("Done: {} analyzed, {} failed", analyzed, failed));

    Ok(BatchResult { analyzed, failed })
}

fn analyze_one(
    file: &Path,
    out: &Path,
    format: ExportFormat,
    config: &AppConfig,
) -> Result<PathBuf, FileError> {
    let structure = analyzer::analyze_file(file, config)?;
    export::export_music_structure(out, &structure, format)?;
    Ok(out.to_path_buf())
}
