//! Persisted mapping from SSID to the static configuration wanted on it
//!
//! The store is a flat JSON object keyed by SSID. Writers replace the whole
//! file, readers reload it whenever they need a current view.

use anyhow::{Context, Result};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_valid::Validate;
use std::{
    collections::{BTreeMap, btree_map},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Static IPv4 configuration for one SSID
///
/// Values are passed to `netsh` verbatim; only non-emptiness is validated.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize, Validate)]
pub struct NetworkProfile {
    #[validate(min_length = 1)]
    pub ip: String,
    #[validate(min_length = 1)]
    pub subnet: String,
    #[validate(min_length = 1)]
    pub gateway: String,
    #[validate(min_length = 1)]
    pub preferred_dns: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(min_length = 1)]
    pub alternate_dns: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProfileStore {
    profiles: BTreeMap<String, NetworkProfile>,
}

impl ProfileStore {
    /// Load the store from `path`
    ///
    /// A missing file yields an empty store. A file that cannot be parsed is
    /// removed and also yields an empty store.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).context(format!("failed to read profiles file {path:?}")),
        };

        match serde_json::from_str(&contents) {
            Ok(store) => Ok(store),
            Err(e) => {
                error!("discarding corrupted profiles file {path:?}: {e}");
                if let Err(e) = fs::remove_file(path) {
                    error!("failed to remove corrupted profiles file {path:?}: {e}");
                }
                Ok(Self::default())
            }
        }
    }

    /// Atomically replace the file at `path` with this store
    ///
    /// The content is written to a sibling temporary file which is then
    /// renamed over `path`, so readers see either the old or the new store.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context(format!("failed to create directory {parent:?}"))?;
        }

        let mut json = Vec::new();
        let mut serializer =
            Serializer::with_formatter(&mut json, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut serializer)
            .context("failed to serialize profiles")?;

        let tmp_path = Self::tmp_path(path);
        fs::write(&tmp_path, &json).context(format!("failed to write {tmp_path:?}"))?;
        fs::rename(&tmp_path, path)
            .context(format!("failed to rename {tmp_path:?} to {path:?}"))?;

        Ok(())
    }

    /// Delete the whole store
    ///
    /// # Returns
    /// true if a file was removed, false if there was none
    pub fn reset(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => {
                info!("profiles file {path:?} removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context(format!("failed to remove profiles file {path:?}")),
        }
    }

    pub fn get(&self, ssid: &str) -> Option<&NetworkProfile> {
        self.profiles.get(ssid)
    }

    /// Add or overwrite the profile of `ssid`, returning the replaced one
    pub fn insert(&mut self, ssid: impl Into<String>, profile: NetworkProfile) -> Option<NetworkProfile> {
        self.profiles.insert(ssid.into(), profile)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, NetworkProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut file_name = path.file_name().unwrap_or_default().to_os_string();
        file_name.push(".tmp");
        path.with_file_name(file_name)
    }
}
