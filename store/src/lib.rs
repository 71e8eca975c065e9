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

mod catalog;
mod local;
mod remote;

pub use crate::catalog::{normalize_remote, Catalog, StoreRecord, INTERNAL_STORE_NAME};
pub use crate::local::FileStore;
pub use crate::remote::CurlStore;

use std::path::Path;

use bytes::Bytes;

/// How a push to a single store concluded, short of a hard failure (hard failures are `Err`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PushOutcome {
    /// Bytes were transferred.
    Success,
    /// The transport determined the destination already had the bytes before transferring.
    Skipped,
    /// Duplication was only detected after a transfer was attempted.
    SkippedLate,
}

///
/// The capability contract every store transport implements.
///
/// A provider is a single session owned by the calling operation: `open` before the first
/// transfer, `close` on completion or on the first hard failure. `pull` distinguishes a file
/// that is absent (`Ok(None)`) from a transport that failed (`Err`), so that callers can fail
/// over to the next store only when it makes sense to.
///
pub trait StoreProvider {
    fn open(&mut self) -> Result<(), String>;

    fn push(&mut self, local_path: &Path, rel_path: &Path) -> Result<PushOutcome, String>;

    fn pull(&mut self, rel_path: &Path) -> Result<Option<Bytes>, String>;

    fn close(&mut self);
}

///
/// The scheme registry: maps a store record's URI scheme to a transport implementation.
///
/// Returns `Ok(None)` for a scheme with no registered implementation; callers warn and skip the
/// store.
///
pub fn provider_for(record: &StoreRecord) -> Result<Option<Box<dyn StoreProvider>>, String> {
    match record.url.scheme() {
        "file" => Ok(Some(Box::new(FileStore::new(record)?))),
        "ftp" | "ftps" | "sftp" => Ok(Some(Box::new(CurlStore::new(record)))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod catalog_tests;
