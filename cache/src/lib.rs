// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
// Enable all clippy lints except for many of the pedantic ones. It's a shame this needs to be copied and pasted across crates, but there doesn't appear to be a way to include inner attributes from a common source.
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
// It is often more clear to show that nothing is being moved.
#![allow(clippy::match_ref_pats)]
// Subjective style.
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
// Default isn't as big a deal as people seem to think it is.
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use hashing::Digest;
use log::debug;
use tempfile::Builder;

/// Where the cache lives, relative to the repository's git directory.
pub const CACHE_RELDIR: &str = "bifrost/data";

///
/// A content-addressed directory of blob bytes keyed by digest.
///
/// Entries are immutable once written: a `put` for an existing path is a no-op, and writes land
/// under a temporary name in the destination directory before being renamed into place, so
/// readers and concurrent writers never observe a partial entry under its final name.
///
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    pub fn new(root: PathBuf) -> LocalCache {
        LocalCache { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    ///
    /// The cache-relative path for a digest: the first three hex nybbles as nested directories
    /// (a 4096-way fanout), then `<HEX40>.bin`.
    ///
    pub fn rel_path(digest: Digest) -> PathBuf {
        let hex = digest.hash.to_hex();
        PathBuf::from(&hex[0..1])
            .join(&hex[1..2])
            .join(&hex[2..3])
            .join(format!("{hex}.bin"))
    }

    pub fn path(&self, digest: Digest) -> PathBuf {
        self.root.join(Self::rel_path(digest))
    }

    pub fn exists(&self, digest: Digest) -> bool {
        self.path(digest).is_file()
    }

    pub fn open(&self, digest: Digest) -> Result<File, String> {
        let path = self.path(digest);
        File::open(&path).map_err(|e| format!("Failed to open {}: {e}", path.display()))
    }

    ///
    /// Stores `bytes` at the cache path for `digest`. Idempotent: if the entry already exists the
    /// call does nothing, which also makes racing writers of identical content safe.
    ///
    pub fn put(&self, digest: Digest, bytes: &[u8]) -> Result<(), String> {
        let dest = self.path(digest);
        if dest.is_file() {
            debug!("cache already holds {}", digest.hash);
            return Ok(());
        }

        let parent = dest
            .parent()
            .expect("cache paths always have a parent directory");
        fs::create_dir_all(parent).map_err(|e| {
            format!(
                "Failed to create cache directory {}: {e}",
                parent.display()
            )
        })?;

        // Stage in the destination directory so the rename cannot cross filesystems.
        let mut staged = Builder::new()
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|e| format!("Failed to create temp file in {}: {e}", parent.display()))?;
        staged
            .write_all(bytes)
            .map_err(|e| format!("Failed to write cache entry for {}: {e}", digest.hash))?;
        staged
            .persist(&dest)
            .map_err(|e| format!("Failed to rename cache entry into {}: {e}", dest.display()))?;
        debug!("cached {} ({} bytes)", digest.hash, digest.size_bytes);
        Ok(())
    }
}
