//! The build cache. Each generated target is recorded with the hash of the
//! content last written to it, the files it was built from, and when it was
//! built. The cache is persisted as YAML between builds, along with a
//! fingerprint of the settings every target was rendered with.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// What the cache remembers about one target.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Entry {
    /// SHA-256 of the last content written, hex-encoded.
    pub hash: String,

    /// Every file the target was built from.
    pub dependencies: BTreeSet<PathBuf>,

    /// Milliseconds since the Unix epoch.
    pub last_build: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Cache {
    /// Identifies the settings the entries were built with. See
    /// [`Cache::fingerprint`].
    #[serde(default)]
    fingerprint: String,

    entries: BTreeMap<PathBuf, Entry>,
}

impl Cache {
    /// Loads the cache at `path`. A missing cache is an empty one, as is a
    /// cache that can't be read, since the only consequence is a full rebuild.
    pub fn load(path: &Path) -> Cache {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No cache at `{}`", path.display());
                return Cache::default();
            }
            Err(e) => {
                warn!("Reading cache `{}`: {}", path.display(), e);
                return Cache::default();
            }
        };
        match serde_yaml::from_str(&contents) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Discarding corrupt cache `{}`: {}", path.display(), e);
                Cache::default()
            }
        }
    }

    /// Writes the cache to `path`, creating its directory if needed.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        std::fs::write(path, yaml)
    }

    /// The fingerprint of the settings the cached targets were rendered with.
    /// Targets cached under another fingerprint are out of date regardless of
    /// their dependencies.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn set_fingerprint(&mut self, fingerprint: String) {
        self.fingerprint = fingerprint;
    }

    pub fn get(&self, target: &Path) -> Option<&Entry> {
        self.entries.get(target)
    }

    pub fn insert(&mut self, target: PathBuf, entry: Entry) {
        self.entries.insert(target, entry);
    }

    /// Drops every entry whose target isn't in `keep` and returns the
    /// dropped targets.
    pub fn retain(&mut self, keep: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
        let mut dropped = Vec::new();
        self.entries.retain(|target, _| {
            let kept = keep.contains(target);
            if !kept {
                dropped.push(target.clone());
            }
            kept
        });
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decides whether `target` must be regenerated from `dependencies`.
    pub fn needs_update(
        &self,
        target: &Path,
        dependencies: &BTreeSet<PathBuf>,
    ) -> bool {
        if !target.exists() {
            return true;
        }
        let entry = match self.get(target) {
            None => return true,
            Some(entry) => entry,
        };
        if &entry.dependencies != dependencies {
            return true;
        }
        dependencies.iter().any(|dep| match modified_millis(dep) {
            Some(modified) => modified > entry.last_build,
            None => true,
        })
    }
}

/// Hashes `content` the way cache entries record it.
pub fn hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// The current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    to_millis(SystemTime::now())
}

fn modified_millis(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(to_millis)
}

fn to_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
