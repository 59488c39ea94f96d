//! Batch orchestration: enumerate → group → decode → select → aggregate →
//! persist.  One bad file or group never aborts the run; only a broken
//! result directory is fatal.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::data::group::{list_groups, ReplicateGroup};
use crate::data::model::{mean_curve, Header};
use crate::data::record::{read_record, write_csv, write_record, DecodeWarning};
use crate::select::{select, Selection, DEFAULT_GROUP, DEFAULT_THRESHOLD, DEFAULT_WINDOW};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Caller-supplied pipeline configuration.  There is no global state: the
/// input directory travels with the config.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the raw instrument records.
    pub input_dir: PathBuf,
    /// Result directory; defaults to `<input>_result` beside the input.
    pub result_dir: Option<PathBuf>,
    /// Spread threshold for the window tests.
    pub threshold: f64,
    /// Sliding-window width, in bands.
    pub window_size: usize,
    /// Replicates per group.
    pub group_size: usize,
}

impl PipelineConfig {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        PipelineConfig {
            input_dir: input_dir.into(),
            result_dir: None,
            threshold: DEFAULT_THRESHOLD,
            window_size: DEFAULT_WINDOW,
            group_size: DEFAULT_GROUP,
        }
    }
}

/// Per-run tallies, for the caller to report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Complete groups found in the input directory.
    pub groups: usize,
    /// Groups that converged and produced a representative spectrum.
    pub good: usize,
    /// Groups rejected by the selector.
    pub bad: usize,
    /// Groups skipped because a member record failed to decode.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Result directory layout
// ---------------------------------------------------------------------------

struct ResultDirs {
    csv: PathBuf,
    binary: PathBuf,
    good: PathBuf,
    fail: PathBuf,
}

impl ResultDirs {
    fn create(result_dir: &Path) -> Result<Self> {
        let dirs = ResultDirs {
            csv: result_dir.join("data_csv"),
            binary: result_dir.join("data_binary"),
            good: result_dir.join("data_good"),
            fail: result_dir.join("data_fail"),
        };
        for dir in [&dirs.csv, &dirs.binary, &dirs.good, &dirs.fail] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating result directory {}", dir.display()))?;
        }
        Ok(dirs)
    }
}

fn default_result_dir(input_dir: &Path) -> PathBuf {
    let mut name = input_dir
        .file_name()
        .unwrap_or_else(|| "data".as_ref())
        .to_os_string();
    name.push("_result");
    match input_dir.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Process a directory of raw records into one representative spectrum per
/// converged replicate group.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let result_dir = config
        .result_dir
        .clone()
        .unwrap_or_else(|| default_result_dir(&config.input_dir));
    let dirs = ResultDirs::create(&result_dir)?;

    let log_path = result_dir.join("good.txt");
    let mut good_log = File::create(&log_path)
        .with_context(|| format!("creating log {}", log_path.display()))?;

    let groups = list_groups(&config.input_dir, config.group_size)?;
    let mut summary = RunSummary {
        groups: groups.len(),
        ..RunSummary::default()
    };

    for paths in &groups {
        match process_group(config, paths, &dirs, &mut good_log) {
            Ok(true) => summary.good += 1,
            Ok(false) => summary.bad += 1,
            Err(err) => {
                log::warn!("skipping group starting at {}: {err:#}", paths[0].display());
                summary.skipped += 1;
            }
        }
    }

    log::info!(
        "{}: {} groups, {} good, {} bad, {} skipped",
        config.input_dir.display(),
        summary.groups,
        summary.good,
        summary.bad,
        summary.skipped
    );
    Ok(summary)
}

/// Decode, select and persist one group.  Returns whether it converged.
/// Decode failures bubble up so `run` can skip the group.
fn process_group(
    config: &PipelineConfig,
    paths: &[PathBuf],
    dirs: &ResultDirs,
    good_log: &mut File,
) -> Result<bool> {
    let mut members = Vec::with_capacity(paths.len());
    let mut header: Option<Header> = None;
    for path in paths {
        let record = read_record(path)?;
        if record.warning == Some(DecodeWarning::ScanExhausted) {
            log::warn!(
                "{}: denominator scan exhausted, calibration block may be misaligned",
                path.display()
            );
        }
        header = Some(record.header);
        members.push((path.clone(), record.curve));
    }
    let group = ReplicateGroup { members };
    // Header of the last record in the group, as in the legacy tool.
    let header = header.expect("groups are never empty");

    let curves = group.curves();
    let result = select(&curves, config.threshold, config.window_size);

    let first_name = file_name(&paths[0]);
    let last_name = file_name(&paths[paths.len() - 1]);
    let stem = paths[0]
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| first_name.clone());

    match result {
        Selection::Converged(retained) => {
            let kept_curves: Vec<_> = retained.iter().map(|&i| &curves[i]).collect();
            let mean = mean_curve(&kept_curves);

            write_record(&dirs.binary.join(&first_name), &header, &mean)?;
            write_csv(&dirs.csv.join(&stem), &stem, &mean)?;

            let mut kept_names = Vec::with_capacity(retained.len());
            for &i in &retained {
                let path = &paths[i];
                fs::copy(path, dirs.good.join(file_name(path)))
                    .with_context(|| format!("archiving {}", path.display()))?;
                kept_names.push(file_name(path));
            }
            writeln!(good_log, "{}", kept_names.join(", "))
                .context("writing good-group log")?;

            log::info!(
                "group {first_name} → {last_name}: kept {}/{}",
                retained.len(),
                paths.len()
            );
            Ok(true)
        }
        Selection::Exhausted => {
            for path in paths {
                fs::copy(path, dirs.fail.join(file_name(path)))
                    .with_context(|| format!("archiving {}", path.display()))?;
            }
            log::info!("group {first_name} → {last_name}: rejected");
            Ok(false)
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
