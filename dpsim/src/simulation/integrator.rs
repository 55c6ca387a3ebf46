//! Drive the external N-body integrator over a generated sweep
//!
//! The integrator is a black-box program that reads an `.init` file on stdin
//! and writes the `.out` file named in its header. Configurations are run in
//! batches; the run state is checked before every batch and one progress step
//! is reported per batch. A configuration whose files cannot be opened is
//! logged and skipped; only failing to launch the program stops the run. Once
//! every batch has run the `.init` files are removed unless they are kept on
//! purpose.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::catalog::record::ConfigurationRecord;
use crate::error::{DpsError, Result};
use crate::simulation::engine::RunContext;

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Integrator stdout/stderr is appended here
pub const INTEGRATOR_LOG: &str = "data.log";

#[derive(Debug, Clone)]
pub struct ExternalIntegrator {
    pub program: PathBuf,   // integrator executable
    pub args: Vec<String>,  // extra arguments passed before stdin is read
    pub batch_size: usize,  // configurations per progress step
    pub keep_init_files: bool,
}

impl ExternalIntegrator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            keep_init_files: false,
        }
    }

    /// Number of batches `count` configurations are split into
    pub fn batch_count(&self, count: usize) -> usize {
        count.div_ceil(self.batch_size.max(1))
    }

    /// Run the integrator once per record, in `directory`
    pub fn run(&self, directory: &Path, records: &[ConfigurationRecord], context: &RunContext) -> Result<()> {
        context.set_task("Simulating init files...", 10.0, 20.0, self.batch_count(records.len()));

        for batch in records.chunks(self.batch_size.max(1)) {
            if !context.is_running() {
                return Err(DpsError::Cancelled);
            }
            for record in batch {
                match self.run_one(directory, record) {
                    Ok(()) => {}
                    Err(e @ DpsError::Integrator(_)) => return Err(e),
                    Err(e) => warn!("Simulating {} failed: {e}", record.filename),
                }
            }
            context.report_step();
        }

        if !self.keep_init_files {
            delete_init_files(directory, records);
        }
        info!("integrated {} configurations", records.len());
        Ok(())
    }

    fn run_one(&self, directory: &Path, record: &ConfigurationRecord) -> Result<()> {
        let init_path = directory.join(record.init_filename());
        let stdin = File::open(&init_path).map_err(|e| DpsError::io(&init_path, e))?;

        let log_path = directory.join(INTEGRATOR_LOG);
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| DpsError::io(&log_path, e))?;
        let log_err = log.try_clone().map_err(|e| DpsError::io(&log_path, e))?;

        let status = Command::new(&self.program)
            .args(&self.args)
            .current_dir(directory)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .status()
            .map_err(|e| DpsError::Integrator(format!("failed to launch {}: {e}", self.program.display())))?;

        if status.success() {
            debug!("integrated {}", record.filename);
        } else {
            warn!("integrator exited with {status} for {}", record.filename);
        }
        Ok(())
    }
}

/// Remove the `.init` file of every record; failures are only logged
pub fn delete_init_files(directory: &Path, records: &[ConfigurationRecord]) {
    for record in records {
        let path = directory.join(record.init_filename());
        if let Err(e) = fs::remove_file(&path) {
            warn!("Failed to delete file {}: {e}", path.display());
        }
    }
}
