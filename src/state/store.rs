//! Durable storage for the project document.
//!
//! One YAML file at `.usher/project.yaml`, one writer per process. Saves
//! go through a sibling temp file and an atomic rename so a crash never
//! leaves a half-written document behind. Durable state only ever
//! advances after a successful fire; callers save explicitly once a
//! command's in-memory work is done.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::StateError;
use crate::state::ProjectDoc;

/// Directory usher keeps its files in, relative to the project root.
pub const USHER_DIR: &str = ".usher";
/// Document file name within [`USHER_DIR`].
pub const DOC_FILE: &str = "project.yaml";

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store rooted at `project_dir/.usher/project.yaml`.
    pub fn in_dir(project_dir: &Path) -> Self {
        Self {
            path: project_dir.join(USHER_DIR).join(DOC_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the document. A missing file is `NotInitialized`; a file
    /// that does not parse is `Corrupt` and is never repaired or
    /// overwritten here.
    pub fn load(&self) -> Result<ProjectDoc, StateError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StateError::NotInitialized {
                    path: self.path.clone(),
                }
            } else {
                StateError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        let doc = serde_yaml::from_str(&raw).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("loaded project document from {}", self.path.display());
        Ok(doc)
    }

    /// Persist the document, stamping `updated_at`. The write lands in a
    /// temp sibling first and is renamed over the document, so readers
    /// only ever see a complete file.
    pub fn save(&self, doc: &mut ProjectDoc) -> Result<(), StateError> {
        doc.touch();
        let yaml =
            serde_yaml::to_string(doc).map_err(|source| StateError::Serialize { source })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = self.path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).map_err(|source| StateError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("saved project document to {}", self.path.display());
        Ok(())
    }

    /// Remove the document. Returns whether a file was actually removed.
    pub fn delete(&self) -> Result<bool, StateError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StateError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
