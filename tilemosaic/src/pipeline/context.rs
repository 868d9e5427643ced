//! Run-scoped paths.
//!
//! A [`RunContext`] owns the scratch directory of one run. Scratch lives in
//! a subdirectory unique to the run so removing it can never touch files
//! that belong to anyone else.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use super::config::PipelineConfig;
use super::error::PipelineError;

const SCRATCH_PREFIX: &str = "tilemosaic";

/// Scratch and output locations of a single run.
#[derive(Debug)]
pub struct RunContext {
    scratch: PathBuf,
    output_dir: PathBuf,
    output_path: PathBuf,
}

impl RunContext {
    /// Derives the run's paths. Nothing is created yet.
    pub fn new(config: &PipelineConfig) -> Self {
        let parent = config
            .scratch_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);

        Self {
            scratch: parent.join(unique_name()),
            output_dir: config.output_dir().to_path_buf(),
            output_path: config.output_path(),
        }
    }

    pub fn scratch(&self) -> &Path {
        &self.scratch
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Creates the scratch and output directories. Idempotent.
    pub fn prepare(&self) -> Result<(), PipelineError> {
        for dir in [&self.scratch, &self.output_dir] {
            std::fs::create_dir_all(dir).map_err(|source| PipelineError::Resource {
                path: dir.clone(),
                source,
            })?;
        }
        debug!(scratch = %self.scratch.display(), "Scratch directory ready");
        Ok(())
    }

    /// Removes the scratch directory and everything in it.
    ///
    /// A missing directory is not an error.
    pub fn cleanup(&self) -> io::Result<()> {
        match std::fs::remove_dir_all(&self.scratch) {
            Ok(()) => {
                debug!(scratch = %self.scratch.display(), "Scratch directory removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(
                    scratch = %self.scratch.display(),
                    error = %e,
                    "Failed to remove scratch directory"
                );
                Err(e)
            }
        }
    }
}

fn unique_name() -> String {
    static RUNS: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let run = RUNS.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}-{}", SCRATCH_PREFIX, std::process::id(), nanos, run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(scratch: &Path, output: &Path) -> PipelineConfig {
        PipelineConfig::builder()
            .template("https://tile.example.org/{z}/{x}/{y}.png")
            .scratch_dir(Some(scratch.to_path_buf()))
            .output_dir(output)
            .build()
            .unwrap()
    }

    #[test]
    fn test_scratch_is_a_private_subdirectory() {
        let root = TempDir::new().unwrap();
        let context = RunContext::new(&config(root.path(), root.path()));

        assert_eq!(context.scratch().parent(), Some(root.path()));
        assert!(context
            .scratch()
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("tilemosaic-")));
        assert_eq!(context.output_path(), root.path().join("out.tif"));
    }

    #[test]
    fn test_prepare_is_idempotent_and_cleanup_removes_scratch() {
        let root = TempDir::new().unwrap();
        let output = root.path().join("nested").join("out");
        let context = RunContext::new(&config(root.path(), &output));

        context.prepare().unwrap();
        context.prepare().unwrap();
        assert!(context.scratch().is_dir());
        assert!(output.is_dir());

        std::fs::write(context.scratch().join("1_2_3.tif"), b"x").unwrap();
        context.cleanup().unwrap();
        assert!(!context.scratch().exists());
        assert!(output.is_dir(), "output directory survives cleanup");

        // Second cleanup is a no-op
        context.cleanup().unwrap();
    }

    #[test]
    fn test_prepare_reports_resource_error() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let context = RunContext::new(&config(&blocker, root.path()));

        assert!(matches!(
            context.prepare(),
            Err(PipelineError::Resource { .. })
        ));
    }
}
