//! Credential storage: opaque multi-file state owned by the transport.
//!
//! The transport mutates credentials; this service only persists each update
//! and reloads the full state at startup. Files live flat under one directory
//! (e.g. `~/.ferry/auth/`).

use crate::channels::CredentialUpdate;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Opaque credential state: file name to contents, as last persisted.
#[derive(Debug, Clone, Default)]
pub struct CredentialState {
    files: HashMap<String, Vec<u8>>,
}

impl CredentialState {
    pub fn get(&self, file: &str) -> Option<&[u8]> {
        self.files.get(file).map(|v| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// Reads and writes credential files under one directory.
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Load all credential files. A missing directory yields empty state.
    pub fn load(&self) -> Result<CredentialState> {
        let mut files = HashMap::new();
        if !self.dir.exists() {
            return Ok(CredentialState { files });
        }
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("reading credential directory {}", self.dir.display()))?;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("reading credential directory {}", self.dir.display()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let contents = std::fs::read(&path)
                .with_context(|| format!("reading credential file {}", path.display()))?;
            files.insert(name.to_string(), contents);
        }
        Ok(CredentialState { files })
    }

    /// Persist one update: write the file, or remove it when contents are empty.
    /// File names must be flat (no path separators).
    pub fn persist(&self, update: &CredentialUpdate) -> Result<()> {
        if update.file.is_empty() || update.file.contains('/') || update.file.contains('\\') {
            anyhow::bail!("invalid credential file name: {:?}", update.file);
        }
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating credential directory {}", self.dir.display()))?;
        let path = self.dir.join(&update.file);
        if update.contents.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("removing credential file {}", path.display()))?;
            }
            return Ok(());
        }
        std::fs::write(&path, &update.contents)
            .with_context(|| format!("writing credential file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> CredentialStore {
        let dir = std::env::temp_dir().join(format!("ferry-store-test-{}", uuid::Uuid::new_v4()));
        CredentialStore::new(dir)
    }

    #[test]
    fn load_missing_dir_is_empty() {
        let store = temp_store();
        let state = store.load().expect("load");
        assert!(state.is_empty());
    }

    #[test]
    fn persist_then_load_round_trip() {
        let store = temp_store();
        store
            .persist(&CredentialUpdate {
                file: "creds.json".to_string(),
                contents: b"{\"noiseKey\":\"abc\"}".to_vec(),
            })
            .expect("persist creds");
        store
            .persist(&CredentialUpdate {
                file: "app-state-sync-key-1.json".to_string(),
                contents: b"key-material".to_vec(),
            })
            .expect("persist key");
        let state = store.load().expect("load");
        assert_eq!(state.len(), 2);
        assert_eq!(state.get("creds.json"), Some(b"{\"noiseKey\":\"abc\"}".as_slice()));
    }

    #[test]
    fn empty_contents_removes_file() {
        let store = temp_store();
        store
            .persist(&CredentialUpdate {
                file: "creds.json".to_string(),
                contents: b"data".to_vec(),
            })
            .expect("persist");
        store
            .persist(&CredentialUpdate {
                file: "creds.json".to_string(),
                contents: Vec::new(),
            })
            .expect("remove");
        let state = store.load().expect("load");
        assert!(state.is_empty());
    }

    #[test]
    fn rejects_path_separators() {
        let store = temp_store();
        let err = store.persist(&CredentialUpdate {
            file: "../escape".to_string(),
            contents: b"x".to_vec(),
        });
        assert!(err.is_err());
    }
}
