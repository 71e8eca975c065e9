// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).
use crate::pre_push::{parse_push_records, push_blobs, PendingBlob, PushRecord};

use std::fs;

use cache::LocalCache;
use hashing::Digest;
use store::Catalog;
use tempfile::TempDir;
use url::Url;

#[test]
fn parses_push_records() {
    let text = "refs/heads/main 67890abc refs/heads/main 12345def\n";
    assert_eq!(
        parse_push_records(text).unwrap(),
        vec![PushRecord {
            local_ref: "refs/heads/main".to_owned(),
            local_sha: "67890abc".to_owned(),
            remote_ref: "refs/heads/main".to_owned(),
            remote_sha: "12345def".to_owned(),
        }]
    );
    assert_eq!(parse_push_records("").unwrap(), vec![]);
}

#[test]
fn malformed_push_record_is_an_error() {
    parse_push_records("refs/heads/main 67890abc\n").expect_err("Want err");
}

fn new_cache_with_blob(content: &[u8]) -> (TempDir, LocalCache, PendingBlob) {
    let dir = TempDir::new().unwrap();
    let cache = LocalCache::new(dir.path().join("data"));
    let digest = Digest::of_bytes(content);
    cache.put(digest, content).unwrap();
    let blob = PendingBlob {
        digest,
        revision: "0123abc:assets/tree.png".to_owned(),
    };
    (dir, cache, blob)
}

fn catalog(entries: &[(&str, String)], cache: &LocalCache) -> Catalog {
    Catalog::assemble(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<Vec<_>>(),
        cache.root(),
    )
    .unwrap()
}

#[test]
fn pushes_to_the_matching_primary_store() {
    let (_dir, cache, blob) = new_cache_with_blob(b"hello world");
    let store_dir = TempDir::new().unwrap();
    let catalog = catalog(
        &[
            (
                "store.depot.url",
                Url::from_file_path(store_dir.path()).unwrap().to_string(),
            ),
            ("store.depot.remote", "/srv/git/repo".to_owned()),
            ("store.depot.primary", "true".to_owned()),
        ],
        &cache,
    );

    push_blobs(&cache, &catalog, "origin", "/srv/git/repo", &[blob.clone()]).unwrap();

    let pushed = store_dir.path().join(LocalCache::rel_path(blob.digest));
    assert_eq!(fs::read(pushed).unwrap(), b"hello world");
}

#[test]
fn fails_without_a_matching_primary_store() {
    let (_dir, cache, blob) = new_cache_with_blob(b"hello world");
    let store_dir = TempDir::new().unwrap();
    // Declared for a different remote entirely.
    let catalog = catalog(
        &[
            (
                "store.depot.url",
                Url::from_file_path(store_dir.path()).unwrap().to_string(),
            ),
            ("store.depot.remote", "/srv/git/elsewhere".to_owned()),
            ("store.depot.primary", "true".to_owned()),
        ],
        &cache,
    );

    let err = push_blobs(&cache, &catalog, "origin", "/srv/git/repo", &[blob])
        .expect_err("Want err");
    assert!(err.contains("no primary store"), "{err}");
}

#[test]
fn a_non_primary_store_does_not_satisfy_the_push() {
    let (_dir, cache, blob) = new_cache_with_blob(b"hello world");
    let store_dir = TempDir::new().unwrap();
    let catalog = catalog(
        &[
            (
                "store.depot.url",
                Url::from_file_path(store_dir.path()).unwrap().to_string(),
            ),
            ("store.depot.remote", "/srv/git/repo".to_owned()),
        ],
        &cache,
    );

    let err = push_blobs(&cache, &catalog, "origin", "/srv/git/repo", &[blob.clone()])
        .expect_err("Want err");
    assert!(err.contains("no primary store"), "{err}");
    // The mirror was still updated before the push was declared failed.
    assert!(store_dir
        .path()
        .join(LocalCache::rel_path(blob.digest))
        .is_file());
}

#[test]
fn a_missing_cache_entry_fails_the_push() {
    let dir = TempDir::new().unwrap();
    let cache = LocalCache::new(dir.path().join("data"));
    fs::create_dir_all(cache.root()).unwrap();
    let store_dir = TempDir::new().unwrap();
    let catalog = catalog(
        &[
            (
                "store.depot.url",
                Url::from_file_path(store_dir.path()).unwrap().to_string(),
            ),
            ("store.depot.remote", "/srv/git/repo".to_owned()),
            ("store.depot.primary", "true".to_owned()),
        ],
        &cache,
    );
    let blob = PendingBlob {
        digest: Digest::of_bytes(b"never cached"),
        revision: "0123abc:assets/tree.png".to_owned(),
    };

    push_blobs(&cache, &catalog, "origin", "/srv/git/repo", &[blob]).expect_err("Want err");
}
