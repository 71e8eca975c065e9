// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use cache::LocalCache;
use git::Git;
use hashing::{Digest, Fingerprint};
use store::{StoreProvider, StoreRecord};
use url::Url;

/// The verdict for one stored blob, against the digest and length its proxies record.
struct BlobCheck {
    missing: bool,
    wrong_size: bool,
    bad_sha: bool,
}

impl BlobCheck {
    fn is_bad(&self) -> bool {
        self.missing || self.wrong_size || self.bad_sha
    }

    fn describe(&self) -> String {
        let mut conditions: Vec<&str> = Vec::new();
        if self.missing {
            conditions.push("file missing");
        }
        if self.wrong_size {
            conditions.push("wrong size");
        }
        if self.bad_sha {
            conditions.push("bad sha");
        }
        conditions.join(", ")
    }
}

///
/// The verify sweep: walk every reachable revision, and pull every referenced proxy's backing
/// file from the store under audit, checking its length and digest. Pull results are memoized
/// per digest; the tally is per referencing entry. The bad-entry count is the exit status, so a
/// clean store exits 0.
///
pub fn run(
    git: &Git,
    store_uri: &str,
    username: Option<String>,
    password: Option<String>,
    verbose: bool,
) -> Result<i32, String> {
    let url = Url::parse(store_uri)
        .map_err(|e| format!("'{store_uri}' is not a valid store uri: {e}"))?;
    let record = StoreRecord {
        name: store_uri.to_owned(),
        url,
        remote: None,
        primary: false,
        username,
        password,
    };
    let mut provider = store::provider_for(&record)?.ok_or_else(|| {
        format!(
            "no transport is registered for scheme '{}'",
            record.url.scheme()
        )
    })?;
    provider
        .open()
        .map_err(|e| format!("Failed to open store {store_uri}: {e}"))?;

    let mut results: HashMap<Fingerprint, BlobCheck> = HashMap::new();
    let mut bad_files: i32 = 0;
    let mut total: u64 = 0;
    for commit in git.rev_list_all()? {
        for entry in git.changed_entries(&commit)? {
            match entry.status_char() {
                'X' => {
                    return Err(format!(
                        "git reported a broken diff status for '{}' in commit {commit}",
                        entry.path.display()
                    ))
                }
                'D' => continue,
                _ => {}
            }
            let revision = format!("{commit}:{}", entry.path.display());
            let head = git.read_blob_prefix(&revision, crate::PROXY_PREFIX_LEN)?;
            let Some(decoded) = proxy::decode(&head)? else {
                continue;
            };
            total += 1;
            let check = match results.entry(decoded.digest.hash) {
                Entry::Occupied(occupied) => occupied.into_mut(),
                Entry::Vacant(vacant) => {
                    vacant.insert(check_blob(provider.as_mut(), decoded.digest)?)
                }
            };
            if check.is_bad() {
                bad_files += 1;
                eprintln!("{revision}: {}", check.describe());
            } else if verbose {
                eprintln!("{revision}: ok");
            }
        }
    }
    provider.close();
    eprintln!("checked {total} proxy reference(s) against {store_uri}; {bad_files} bad");
    Ok(bad_files)
}

fn check_blob(provider: &mut dyn StoreProvider, digest: Digest) -> Result<BlobCheck, String> {
    match provider.pull(&LocalCache::rel_path(digest))? {
        None => Ok(BlobCheck {
            missing: true,
            wrong_size: false,
            bad_sha: false,
        }),
        Some(bytes) => Ok(BlobCheck {
            missing: false,
            wrong_size: bytes.len() != digest.size_bytes,
            bad_sha: Digest::of_bytes(&bytes).hash != digest.hash,
        }),
    }
}
