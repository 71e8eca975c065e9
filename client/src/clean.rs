// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::io::{self, Read, Write};

use cache::LocalCache;
use git::Git;
use log::info;

pub fn run(git: &Git, path: &str) -> Result<i32, String> {
    let cache = crate::local_cache(git)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    clean(&mut stdin.lock(), &mut stdout.lock(), &cache, path)?;
    Ok(0)
}

///
/// The clean transform: buffer the whole blob (hashing as it streams through), refuse to clean
/// something that is already a proxy, emit the proxy text, then persist the blob in the cache.
/// After this runs, git's object store holds only the proxy; the bytes live in the cache until
/// they are pushed.
///
pub fn clean(
    input: &mut dyn Read,
    output: &mut dyn Write,
    cache: &LocalCache,
    path: &str,
) -> Result<(), String> {
    let mut blob: Vec<u8> = Vec::new();
    let digest = hashing::sync_copy_and_hash(input, &mut blob)
        .map_err(|e| format!("Failed to read '{path}' from stdin: {e}"))?;

    if proxy::first_line_is_sentinel(&blob) {
        return Err(format!(
            "'{path}' is already a bifrost proxy; cleaning it again would corrupt history"
        ));
    }

    output
        .write_all(proxy::encode(digest).as_bytes())
        .and_then(|()| output.flush())
        .map_err(|e| format!("Failed to write the proxy for '{path}': {e}"))?;
    cache.put(digest, &blob)?;
    info!(
        "cleaned '{path}' into {} ({} bytes)",
        digest.hash, digest.size_bytes
    );
    Ok(())
}
