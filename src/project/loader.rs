//! Stub discovery: walking search roots and loading them as one batch.

use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::hir::BuildError;
use crate::ide::AnalysisHost;

/// Errors that stop a directory load as a whole.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("search root not found: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Outcome of loading a directory. Files whose tables failed to build are
/// still tracked by the host.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, BuildError)>,
}

impl LoadSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Loads stub (and optionally source) files from a search root into an
/// [`AnalysisHost`].
#[derive(Clone, Debug)]
pub struct StubLoader {
    extensions: Vec<String>,
}

impl Default for StubLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl StubLoader {
    /// A loader accepting `.pyi` files only.
    pub fn new() -> Self {
        Self::with_extensions(["pyi"])
    }

    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    /// Collect every accepted file under `root`, sorted by path.
    pub fn collect_paths(&self, root: &Path) -> Result<Vec<PathBuf>, LoadError> {
        if !root.is_dir() {
            return Err(LoadError::NotADirectory(root.to_path_buf()));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|source| LoadError::Walk {
                root: root.to_path_buf(),
                source,
            })?;
            if entry.file_type().is_file() && self.accepts(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Register `root` as a search root and load every accepted file below it
    /// as one batch.
    pub fn load_directory(
        &self,
        root: impl AsRef<Path>,
        host: &mut AnalysisHost,
    ) -> Result<LoadSummary, LoadError> {
        let root = root.as_ref();
        let paths = self.collect_paths(root)?;
        debug!(root = %root.display(), files = paths.len(), "collected stub files");

        let files = paths
            .into_par_iter()
            .map(|path| match std::fs::read_to_string(&path) {
                Ok(text) => Ok((path, text)),
                Err(source) => Err(LoadError::Io { path, source }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        host.add_search_root(root);

        let mut summary = LoadSummary::default();
        for (path, result) in host.load_modules(files) {
            match result {
                Ok(_) => summary.loaded.push(path),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "stub failed to build");
                    summary.failed.push((path, err));
                }
            }
        }
        info!(
            root = %root.display(),
            loaded = summary.loaded.len(),
            failed = summary.failed.len(),
            "loaded search root"
        );
        Ok(summary)
    }
}
