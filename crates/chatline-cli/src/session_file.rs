use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use chatline_types::Session;

/// Session token persisted between runs.
#[derive(Debug, Serialize, Deserialize)]
struct SavedSession {
    user_id: String,
    token: String,
}

pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<Option<String>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        let saved: SavedSession = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed session file {}", self.path.display()))?;
        debug!(user_id = %saved.user_id, "Loaded saved session");
        Ok(Some(saved.token))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let saved = SavedSession {
            user_id: session.user_id.clone(),
            token: session.token.clone(),
        };
        let json = serde_json::to_string_pretty(&saved)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                Err(e).with_context(|| format!("Failed to remove {}", self.path.display()))
            }
            _ => Ok(()),
        }
    }
}
