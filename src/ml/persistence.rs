//! Artifact persistence - save and load trained model bundles
//!
//! The bundle is stored as a JSON document whose key names (`linModel`,
//! `maSeries`, `kmeans`, `metadata`) are the contract between training and
//! serving. Each save replaces the previous bundle outright.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clustering::ClusterModel;
use super::regression::RegressionModel;

/// Complete output of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBundle {
    pub lin_model: RegressionModel,
    /// Moving average of slot counts (diagnostic only)
    pub ma_series: Vec<f64>,
    pub kmeans: ClusterModel,
    pub metadata: BundleMetadata,
}

/// Metadata attached to every bundle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    /// When the bundle was trained
    pub updated_at: DateTime<Utc>,
    /// Number of feature rows used for training
    pub n: usize,
    /// Layout version, constant across runs
    pub version: u32,
}

impl BundleMetadata {
    /// Current layout version
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(updated_at: DateTime<Utc>, n: usize) -> Self {
        Self {
            updated_at,
            n,
            version: Self::CURRENT_VERSION,
        }
    }
}

impl ArtifactBundle {
    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Bundle v{}: {} slots, slope={:.4}, intercept={:.2}, k={}, trained {}",
            self.metadata.version,
            self.metadata.n,
            self.lin_model.slope,
            self.lin_model.intercept,
            self.kmeans.k(),
            self.metadata.updated_at.format("%Y-%m-%d %H:%M UTC")
        )
    }
}

/// Errors that can occur during artifact persistence
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Deserialization error: {0}")]
    Deserialize(#[source] serde_json::Error),
    #[error("Artifact version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Storage for the single current artifact bundle.
///
/// `load` returns `Ok(None)` when nothing has been trained yet. Faults are
/// reported to the caller and never retried here.
pub trait ArtifactStore: Send + Sync {
    fn load(&self) -> Result<Option<ArtifactBundle>, PersistenceError>;

    fn save(&self, bundle: &ArtifactBundle) -> Result<(), PersistenceError>;
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for Arc<S> {
    fn load(&self) -> Result<Option<ArtifactBundle>, PersistenceError> {
        (**self).load()
    }

    fn save(&self, bundle: &ArtifactBundle) -> Result<(), PersistenceError> {
        (**self).save(bundle)
    }
}

/// JSON file store with replace-on-write semantics
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    path: PathBuf,
}

impl FileArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the bundle is written to before being renamed into place
    fn staging_path(&self) -> PathBuf {
        let mut name: OsString = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ArtifactStore for FileArtifactStore {
    fn load(&self) -> Result<Option<ArtifactBundle>, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let bundle: ArtifactBundle =
            serde_json::from_slice(&bytes).map_err(PersistenceError::Deserialize)?;

        if bundle.metadata.version > BundleMetadata::CURRENT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: BundleMetadata::CURRENT_VERSION,
                found: bundle.metadata.version,
            });
        }

        Ok(Some(bundle))
    }

    fn save(&self, bundle: &ArtifactBundle) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let bytes = serde_json::to_vec_pretty(bundle).map_err(PersistenceError::Serialize)?;

        // Readers never observe a half-written file
        let staging = self.staging_path();
        fs::write(&staging, bytes).map_err(|e| self.io_error(e))?;
        fs::rename(&staging, &self.path).map_err(|e| self.io_error(e))?;

        Ok(())
    }
}

/// In-process store, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    bundle: RwLock<Option<ArtifactBundle>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(bundle: ArtifactBundle) -> Self {
        Self {
            bundle: RwLock::new(Some(bundle)),
        }
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn load(&self) -> Result<Option<ArtifactBundle>, PersistenceError> {
        Ok(self
            .bundle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, bundle: &ArtifactBundle) -> Result<(), PersistenceError> {
        *self.bundle.write().unwrap_or_else(PoisonError::into_inner) = Some(bundle.clone());
        Ok(())
    }
}
