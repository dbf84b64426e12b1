// Store path utilities.
// Maps store namespaces and keys onto the filesystem for the file-backed store.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};

/// Name used when no store namespace is configured.
pub const DEFAULT_STORE_NAME: &str = "fetch-cache";

/// Longest encoded key used verbatim as a filename. Longer keys are hashed,
/// keeping every entry name well under the usual 255-byte limit.
pub const MAX_ENCODED_KEY_LEN: usize = 200;

/// Get the base cache directory (~/.cache/fetchstate on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "fetchstate").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Directory holding one store namespace.
pub fn store_dir(root: &Path, store_name: &str) -> PathBuf {
    root.join(entry_name(store_name))
}

/// Default location of a store namespace under the platform cache directory.
pub fn default_store_dir(store_name: &str) -> Option<PathBuf> {
    cache_dir().map(|dir| store_dir(&dir, store_name))
}

/// Path of the file holding `key` inside a store directory.
pub fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.json", entry_name(key)))
}

/// Filename stem for `key`: the encoded key, or `_h<sha256>` when that
/// would be too long. `encode_key` only emits `_` before two uppercase hex
/// digits, so the two forms never overlap.
pub fn entry_name(key: &str) -> String {
    let encoded = encode_key(key);
    if encoded.len() <= MAX_ENCODED_KEY_LEN {
        return encoded;
    }
    let digest = Sha256::digest(key.as_bytes());
    format!("_h{}", hex::encode(digest))
}

/// Encode a key into a filename.
///
/// ASCII alphanumerics, `-` and `.` pass through; every other byte becomes
/// `_XX` (uppercase hex). The mapping is injective, so distinct keys never
/// share a file.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' => out.push(byte as char),
            _ => out.push_str(&format!("_{:02X}", byte)),
        }
    }
    out
}
