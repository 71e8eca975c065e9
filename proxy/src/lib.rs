// Copyright 2023 Bifrost project contributors (see CONTRIBUTORS.md).
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

use hashing::{Digest, Fingerprint};

/// First line of every proxy file. A blob whose first line equals this string is conclusively a
/// proxy; anything else is raw content.
pub const SENTINEL: &str = "~*@git-bifrost@*~";

/// Version written into line 2 of newly encoded proxies.
pub const FORMAT_VERSION: u32 = 1;

///
/// The decoded form of the four-line surrogate stored in history in place of a large blob:
/// sentinel, format version, 40-hex digest, decimal byte length.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Proxy {
    pub version: u32,
    pub digest: Digest,
}

impl Proxy {
    pub fn new(digest: Digest) -> Proxy {
        Proxy {
            version: FORMAT_VERSION,
            digest,
        }
    }
}

///
/// Renders the four-line proxy text for `digest`, LF-terminated including the final line.
///
pub fn encode(digest: Digest) -> String {
    format!(
        "{sentinel}\n{version}\n{hash}\n{len}\n",
        sentinel = SENTINEL,
        version = FORMAT_VERSION,
        hash = digest.hash,
        len = digest.size_bytes
    )
}

///
/// Decodes a blob that may be a proxy.
///
/// Returns `Ok(None)` when the first line is not the sentinel (the blob is raw content),
/// `Ok(Some(..))` for a well-formed proxy, and `Err` when the sentinel matched but the remaining
/// lines are malformed. Content after the fourth line is ignored.
///
pub fn decode(bytes: &[u8]) -> Result<Option<Proxy>, String> {
    if !first_line_is_sentinel(bytes) {
        return Ok(None);
    }

    let rest = &bytes[SENTINEL.len()..];
    let rest = std::str::from_utf8(rest.strip_prefix(b"\n").unwrap_or(rest))
        .map_err(|_| "Corrupt proxy: non-text bytes after the sentinel".to_owned())?;
    let mut lines = rest.lines();

    let version_line = lines
        .next()
        .ok_or_else(|| "Corrupt proxy: missing version line".to_owned())?;
    let version = version_line
        .parse::<u32>()
        .map_err(|e| format!("Corrupt proxy: bad version line {version_line:?}: {e}"))?;

    let digest_line = lines
        .next()
        .ok_or_else(|| "Corrupt proxy: missing digest line".to_owned())?;
    let hash = Fingerprint::from_hex_string(digest_line)
        .map_err(|e| format!("Corrupt proxy: bad digest line {digest_line:?}: {e}"))?;

    let length_line = lines
        .next()
        .ok_or_else(|| "Corrupt proxy: missing length line".to_owned())?;
    let size_bytes = length_line
        .parse::<usize>()
        .map_err(|e| format!("Corrupt proxy: bad length line {length_line:?}: {e}"))?;

    Ok(Some(Proxy {
        version,
        digest: Digest::new(hash, size_bytes),
    }))
}

/// True when the blob's first line is exactly the sentinel. Used by the clean filter to refuse to
/// clean something that is already a proxy.
pub fn first_line_is_sentinel(bytes: &[u8]) -> bool {
    let sentinel = SENTINEL.as_bytes();
    bytes.starts_with(sentinel)
        && (bytes.len() == sentinel.len() || bytes[sentinel.len()] == b'\n')
}

/// True when the blob begins with the sentinel bytes. The pre-commit guard compares only this
/// prefix when deciding whether a filtered path was actually cleaned.
pub fn starts_with_sentinel(bytes: &[u8]) -> bool {
    bytes.starts_with(SENTINEL.as_bytes())
}

#[cfg(test)]
mod tests;
