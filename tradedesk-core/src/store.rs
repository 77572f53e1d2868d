//! Persistent store backed by two JSON documents.
//!
//! The store owns the only writable copy of the ticket and vouch maps. Every
//! mutation is followed by [`Store::save`], which rewrites both documents in
//! full; there are no partial updates.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info};

use crate::ticket::TicketMap;
use crate::vouch::VouchMap;

pub const VOUCH_DATA_FILE: &str = "vouches.json";
pub const TICKET_DATA_FILE: &str = "tickets.json";

/// Locations of the two persisted documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub vouches: PathBuf,
    pub tickets: PathBuf,
}

impl StorePaths {
    /// Both documents under `dir`, with their conventional file names.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            vouches: dir.join(VOUCH_DATA_FILE),
            tickets: dir.join(TICKET_DATA_FILE),
        }
    }
}

#[derive(Debug)]
pub struct Store {
    paths: StorePaths,
    pub tickets: TicketMap,
    pub vouches: VouchMap,
}

impl Store {
    /// An empty store that will write to `paths` on the next save.
    pub fn empty(paths: StorePaths) -> Self {
        Self {
            paths,
            tickets: TicketMap::new(),
            vouches: VouchMap::new(),
        }
    }

    /// Load both documents.
    ///
    /// A missing, empty or unreadable document leaves its map empty; the error
    /// is logged and startup continues.
    pub async fn load(paths: StorePaths) -> Self {
        let vouches = load_document::<VouchMap>(&paths.vouches)
            .await
            .unwrap_or_default();
        let tickets = load_document::<TicketMap>(&paths.tickets)
            .await
            .unwrap_or_default();

        info!(
            "Loaded {} vouch records and {} active tickets",
            vouches.len(),
            tickets.len()
        );

        Self {
            paths,
            tickets,
            vouches,
        }
    }

    /// Rewrite both documents from the in-memory maps.
    pub async fn save(&self) -> Result<()> {
        write_document(&self.paths.vouches, &self.vouches).await?;
        write_document(&self.paths.tickets, &self.tickets).await?;
        Ok(())
    }
}

async fn load_document<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            error!("Data load error reading {}: {}", path.display(), e);
            return None;
        }
    };

    if content.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Data load error parsing {}: {}", path.display(), e);
            None
        }
    }
}

/// Write `value` as pretty JSON to a sibling temp file, then rename it over `path`.
async fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
