//! Persistence for the bearer token between runs.

use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The token plus the instant after which it must not be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl PersistedToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub trait TokenStore {
    /// `Ok(None)` when nothing is persisted.
    fn load(&self) -> Result<Option<PersistedToken>>;
    fn save(&self, token: &PersistedToken) -> Result<()>;
    /// Removing an absent token succeeds.
    fn clear(&self) -> Result<()>;
}

/// In-memory store. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Rc<RefCell<Option<PersistedToken>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: PersistedToken) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Some(token))),
        }
    }

    pub fn current(&self) -> Option<PersistedToken> {
        self.slot.borrow().clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<PersistedToken>> {
        Ok(self.current())
    }

    fn save(&self, token: &PersistedToken) -> Result<()> {
        *self.slot.borrow_mut() = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.slot.borrow_mut().take();
        Ok(())
    }
}

/// JSON file store, e.g. `.coop/token.json`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<PersistedToken>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::Deserialization(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, token: &PersistedToken) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let raw =
            serde_json::to_string_pretty(token).map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
