// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::io::{self, Read, Write};

use cache::LocalCache;
use git::Git;
use hashing::Digest;
use log::{error, info, warn};
use store::Catalog;

pub fn run(git: &Git, path: &str) -> Result<i32, String> {
    let cache = crate::local_cache(git)?;
    let catalog = crate::load_catalog(git, &cache)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    smudge(&mut stdin.lock(), &mut stdout.lock(), &cache, &catalog, path)?;
    Ok(0)
}

///
/// The smudge transform: decode the proxy on stdin, then try every store in catalog order (the
/// internal cache first) until one serves bytes that verify against the proxy's digest and
/// length. A store that serves mismatched bytes is bypassed with an integrity diagnostic rather
/// than failing the whole operation; only when every store has been exhausted does smudge fail.
///
pub fn smudge(
    input: &mut dyn Read,
    output: &mut dyn Write,
    cache: &LocalCache,
    catalog: &Catalog,
    path: &str,
) -> Result<(), String> {
    let mut text = Vec::new();
    input
        .read_to_end(&mut text)
        .map_err(|e| format!("Failed to read '{path}' from stdin: {e}"))?;
    let decoded = proxy::decode(&text)?
        .ok_or_else(|| format!("content of '{path}' on stdin is not a bifrost proxy"))?;
    let digest = decoded.digest;
    let rel_path = LocalCache::rel_path(digest);

    for record in catalog.records() {
        let mut provider = match store::provider_for(record) {
            Ok(Some(provider)) => provider,
            Ok(None) => {
                warn!(
                    "store '{}' uses unsupported scheme '{}'; skipping it",
                    record.name,
                    record.url.scheme()
                );
                continue;
            }
            Err(e) => {
                warn!("skipping store '{}': {e}", record.name);
                continue;
            }
        };
        if let Err(e) = provider.open() {
            warn!("Failed to open store '{}' ({}): {e}", record.name, record.url);
            continue;
        }
        let bytes = match provider.pull(&rel_path) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                provider.close();
                continue;
            }
            Err(e) => {
                warn!(
                    "Failed to pull {} from store '{}': {e}",
                    rel_path.display(),
                    record.name
                );
                provider.close();
                continue;
            }
        };

        if bytes.len() != digest.size_bytes {
            error!(
                "store '{}' ({}) returned {} bytes for '{path}' where the proxy records {}; \
                 not trusting this store",
                record.name,
                record.url,
                bytes.len(),
                digest.size_bytes
            );
            provider.close();
            continue;
        }
        let actual = Digest::of_bytes(&bytes);
        if actual != digest {
            error!(
                "store '{}' ({}) returned corrupt bytes for '{path}': digest {} does not match \
                 the expected {}; not trusting this store",
                record.name, record.url, actual.hash, digest.hash
            );
            provider.close();
            continue;
        }

        cache.put(digest, &bytes)?;
        output
            .write_all(&bytes)
            .and_then(|()| output.flush())
            .map_err(|e| format!("Failed to write '{path}': {e}"))?;
        provider.close();
        info!("smudged '{path}' from store '{}'", record.name);
        return Ok(());
    }

    Err(format!(
        "no configured store could provide '{path}' ({}, {} bytes)",
        digest.hash, digest.size_bytes
    ))
}
