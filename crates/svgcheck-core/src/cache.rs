//! Storage for previously fetched include targets.
//!
//! Only the loader talks to a cache; the engine never sees one.

use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

pub trait IncludeCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<()>;
    /// Removes every entry. Returns how many were removed.
    fn delete_all(&mut self) -> Result<usize>;
}

/// One file per entry under a directory.
#[derive(Debug, Clone)]
pub struct DirCache {
    root: PathBuf,
}

impl DirCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(entry_file_name(key))
    }
}

/// Maps a URL or path to a flat file name. Distinct keys that sanitize to the same name are
/// kept apart by a hash suffix.
fn entry_file_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    if name.len() > 120 {
        let mut cut = 120;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    format!("{name}-{:016x}", fnv1a(key.as_bytes()))
}

// FNV-1a. Entry names must be identical across runs and platforms.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x0100_0000_01b3);
    }
    h
}

impl IncludeCache for DirCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
        let path = self.entry_path(key);
        std::fs::write(&path, bytes).map_err(|e| Error::io(path, e))
    }

    fn delete_all(&mut self) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::io(&self.root, e)),
        };
        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.root, e))?;
            let path = entry.path();
            if path.is_file() {
                std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
                removed += 1;
            }
        }
        tracing::debug!(root = %self.root.display(), removed, "cache cleared");
        Ok(removed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: FxHashMap<String, Vec<u8>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IncludeCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete_all(&mut self) -> Result<usize> {
        let n = self.entries.len();
        self.entries.clear();
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_cache_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DirCache::new(dir.path().join("cache"));

        assert_eq!(cache.get("https://example.org/a.svg").unwrap(), None);
        assert_eq!(cache.delete_all().unwrap(), 0);

        cache.put("https://example.org/a.svg", b"<svg/>").unwrap();
        cache.put("https://example.org/a_svg", b"other").unwrap();
        assert_eq!(
            cache.get("https://example.org/a.svg").unwrap().as_deref(),
            Some(&b"<svg/>"[..])
        );
        assert_eq!(
            cache.get("https://example.org/a_svg").unwrap().as_deref(),
            Some(&b"other"[..])
        );

        assert_eq!(cache.delete_all().unwrap(), 2);
        assert_eq!(cache.get("https://example.org/a.svg").unwrap(), None);
    }

    #[test]
    fn entry_names_are_flat_and_stable() {
        let a = entry_file_name("../../etc/passwd");
        assert!(!a.contains('/'));
        assert_eq!(a, entry_file_name("../../etc/passwd"));
        assert_ne!(a, entry_file_name("../../etc/passwd2"));
    }

    #[test]
    fn memory_cache_counts_entries() {
        let mut cache = MemoryCache::new();
        cache.put("k", b"v").unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.delete_all().unwrap(), 1);
        assert!(cache.is_empty());
    }
}
