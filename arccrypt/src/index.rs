use std::collections::HashMap;
use std::path::Path;

use md5::{Digest, Md5};

use crate::{looks_like_md5, Error};

pub type Md5Digest = [u8; 16];

/// Characters a relative path in the paths file may never contain
const INVALID_PATH_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

pub fn md5_digest(value: &str) -> Md5Digest {
    let mut digest = [0; 16];
    digest.copy_from_slice(&Md5::digest(value.as_bytes()));
    digest
}

/// Decode the MD5 digest a file name starts with
pub fn name_digest(name: &str) -> Option<Md5Digest> {
    let hex = name.get(..32).filter(|h| looks_like_md5(h))?;
    let mut digest = [0; 16];
    hex::decode_to_slice(hex, &mut digest).ok()?;
    Some(digest)
}

/// Canonical form of a relative game path as it is hashed by the MD5-keyed titles:
/// lowercase, `/` separated, no repeated separators.
pub fn normalize_path(path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() || path.chars().any(|c| c.is_control() || INVALID_PATH_CHARS.contains(&c)) {
        return None;
    }
    let path = path.to_lowercase().replace('\\', "/");
    let mut normalized = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(c);
    }
    Some(normalized)
}

/// Reverse lookup from the digest of a normalized path back to the path as listed
#[derive(Debug, Default, Clone)]
pub struct PathIndex {
    entries: HashMap<Md5Digest, String>,
}

impl PathIndex {
    /// Lines that fail normalization are dropped without affecting the others.
    pub fn build<S: AsRef<str>>(lines: impl IntoIterator<Item = S>) -> Self {
        let entries = lines
            .into_iter()
            .filter_map(|line| {
                let original = line.as_ref().trim();
                let normalized = normalize_path(original)?;
                Some((md5_digest(&normalized), original.to_string()))
            })
            .collect();
        PathIndex { entries }
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let index = Self::build(std::fs::read_to_string(path)?.lines());
        tracing::debug!("indexed {} paths from {}", index.len(), path.display());
        Ok(index)
    }

    pub fn lookup(&self, digest: &Md5Digest) -> Option<&str> {
        self.entries.get(digest).map(String::as_str)
    }

    /// Look up an MD5 file name, ignoring anything after the leading 32 hex digits
    pub fn lookup_name(&self, name: &str) -> Option<&str> {
        self.lookup(&name_digest(name)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
