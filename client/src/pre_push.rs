// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::io::{self, Read};

use cache::LocalCache;
use git::Git;
use hashing::{Digest, Fingerprint};
use indexmap::IndexMap;
use log::{error, info, warn};
use store::{Catalog, PushOutcome};

/// One line of the pre-push hook's stdin.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PushRecord {
    pub local_ref: String,
    pub local_sha: String,
    pub remote_ref: String,
    pub remote_sha: String,
}

pub fn parse_push_records(text: &str) -> Result<Vec<PushRecord>, String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [local_ref, local_sha, remote_ref, remote_sha] => Ok(PushRecord {
                    local_ref: (*local_ref).to_owned(),
                    local_sha: (*local_sha).to_owned(),
                    remote_ref: (*remote_ref).to_owned(),
                    remote_sha: (*remote_sha).to_owned(),
                }),
                _ => Err(format!("Malformed push record on stdin: {line:?}")),
            }
        })
        .collect()
}

/// An all-zero sha marks a ref deletion: nothing is being pushed for it.
fn is_zero_sha(sha: &str) -> bool {
    !sha.is_empty() && sha.bytes().all(|b| b == b'0')
}

/// A blob that an outgoing proxy references, with one of the revisions that referenced it for
/// diagnostics.
#[derive(Clone, Debug)]
pub(crate) struct PendingBlob {
    pub digest: Digest,
    pub revision: String,
}

///
/// The pre-push orchestrator. Phase 1 walks every outgoing revision and collects the digests of
/// the proxies it references; phase 2 replicates the backing bytes from the local cache to every
/// store declared for the destination remote. The push may only proceed when at least one
/// primary store was updated without a hard failure.
///
pub fn run(git: &Git, remote_name: &str, remote_url: &str) -> Result<i32, String> {
    let mut text = String::new();
    io::stdin()
        .lock()
        .read_to_string(&mut text)
        .map_err(|e| format!("Failed to read push records from stdin: {e}"))?;
    let records = parse_push_records(&text)?;
    let cache = crate::local_cache(git)?;

    // Phase 1: enumerate the proxies behind the outgoing revisions.
    let mut pending: IndexMap<Fingerprint, PendingBlob> = IndexMap::new();
    for record in &records {
        if is_zero_sha(&record.local_sha) {
            continue;
        }
        for commit in git.rev_list_not_remotes(&record.local_ref, remote_name)? {
            for entry in git.changed_entries(&commit)? {
                match entry.status_char() {
                    'X' => {
                        return Err(format!(
                            "git reported a broken diff status for '{}' in commit {commit}; \
                             aborting the push",
                            entry.path.display()
                        ))
                    }
                    'D' => continue,
                    _ => {}
                }
                let revision = format!("{commit}:{}", entry.path.display());
                let head = git.read_blob_prefix(&revision, crate::PROXY_PREFIX_LEN)?;
                if let Some(decoded) = proxy::decode(&head)? {
                    pending
                        .entry(decoded.digest.hash)
                        .or_insert_with(|| PendingBlob {
                            digest: decoded.digest,
                            revision,
                        });
                }
            }
        }
    }

    if pending.is_empty() {
        info!("no bifrost blobs are referenced by this push");
        return Ok(0);
    }
    if !cache.root().is_dir() {
        return Err(format!(
            "local cache {} is missing but {} blob(s) need it to source this push; restore the \
             cache before pushing",
            cache.root().display(),
            pending.len()
        ));
    }

    // Phase 2: replicate to the destination remote's stores.
    let catalog = crate::load_catalog(git, &cache)?;
    let blobs: Vec<PendingBlob> = pending.into_values().collect();
    push_blobs(&cache, &catalog, remote_name, remote_url, &blobs)?;
    Ok(0)
}

pub(crate) fn push_blobs(
    cache: &LocalCache,
    catalog: &Catalog,
    remote_name: &str,
    remote_url: &str,
    blobs: &[PendingBlob],
) -> Result<(), String> {
    let mut primaries_updated = 0;
    for record in catalog.records_for_remote(remote_url) {
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
            error!("Failed to open store '{}' ({}): {e}", record.name, record.url);
            continue;
        }

        let mut uploaded = 0;
        let mut skipped = 0;
        let mut skipped_late = 0;
        for blob in blobs {
            let local_path = cache.path(blob.digest);
            if !local_path.is_file() {
                error!(
                    "cache entry {} (first referenced by {}) is missing",
                    local_path.display(),
                    blob.revision
                );
                provider.close();
                return Err(format!(
                    "the local cache no longer holds {}; it cannot source this push",
                    blob.digest.hash
                ));
            }
            match provider.push(&local_path, &LocalCache::rel_path(blob.digest)) {
                Ok(PushOutcome::Success) => uploaded += 1,
                Ok(PushOutcome::Skipped) => skipped += 1,
                Ok(PushOutcome::SkippedLate) => skipped_late += 1,
                Err(e) => {
                    provider.close();
                    return Err(format!(
                        "Failed to push {} to store '{}': {e}",
                        blob.digest.hash, record.name
                    ));
                }
            }
        }
        provider.close();
        info!(
            "store '{}': {uploaded} uploaded, {skipped} already present, {skipped_late} \
             detected late",
            record.name
        );
        if record.primary {
            primaries_updated += 1;
        }
    }

    if primaries_updated == 0 {
        return Err(format!(
            "no primary store was updated for remote '{remote_name}' ({remote_url}); declare \
             one with store.<name>.remote and store.<name>.primary = true in {}",
            crate::REPO_CONFIG_FILE
        ));
    }
    Ok(())
}
