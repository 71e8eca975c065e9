// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).
use crate::smudge::smudge;

use std::fs;
use std::path::Path;

use cache::LocalCache;
use hashing::Digest;
use store::Catalog;
use tempfile::TempDir;
use url::Url;

fn new_cache() -> (TempDir, LocalCache) {
    let dir = TempDir::new().unwrap();
    let cache = LocalCache::new(dir.path().join("data"));
    (dir, cache)
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

fn seed_store(root: &Path, digest: Digest, content: &[u8]) {
    let path = root.join(LocalCache::rel_path(digest));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn serves_from_the_internal_cache_first() {
    let (_dir, cache) = new_cache();
    let digest = Digest::of_bytes(b"hello world");
    cache.put(digest, b"hello world").unwrap();
    let catalog = catalog(&[], &cache);

    let proxy_text = proxy::encode(digest);
    let mut input: &[u8] = proxy_text.as_bytes();
    let mut output: Vec<u8> = Vec::new();
    smudge(&mut input, &mut output, &cache, &catalog, "greeting.txt").unwrap();
    assert_eq!(output, b"hello world");
}

#[test]
fn serves_from_a_file_store_and_repopulates_the_cache() {
    let (_dir, cache) = new_cache();
    let store_dir = TempDir::new().unwrap();
    let digest = Digest::of_bytes(b"hello world");
    seed_store(store_dir.path(), digest, b"hello world");
    let catalog = catalog(
        &[(
            "store.depot.url",
            Url::from_file_path(store_dir.path()).unwrap().to_string(),
        )],
        &cache,
    );

    let proxy_text = proxy::encode(digest);
    let mut input: &[u8] = proxy_text.as_bytes();
    let mut output: Vec<u8> = Vec::new();
    smudge(&mut input, &mut output, &cache, &catalog, "greeting.txt").unwrap();
    assert_eq!(output, b"hello world");
    // A successful pull repopulates the local cache.
    assert!(cache.exists(digest));
}

#[test]
fn rejects_a_store_whose_bytes_do_not_verify() {
    let (_dir, cache) = new_cache();
    let store_dir = TempDir::new().unwrap();
    let digest = Digest::of_bytes(b"hello world");
    // Same length, different digest.
    seed_store(store_dir.path(), digest, b"HELLO WORLD");
    let catalog = catalog(
        &[(
            "store.depot.url",
            Url::from_file_path(store_dir.path()).unwrap().to_string(),
        )],
        &cache,
    );

    let proxy_text = proxy::encode(digest);
    let mut input: &[u8] = proxy_text.as_bytes();
    let mut output: Vec<u8> = Vec::new();
    smudge(&mut input, &mut output, &cache, &catalog, "greeting.txt").expect_err("Want err");
    assert!(output.is_empty());
    assert!(!cache.exists(digest));
}

#[test]
fn falls_past_a_corrupt_store_to_a_valid_one() {
    let (_dir, cache) = new_cache();
    let bad_dir = TempDir::new().unwrap();
    let good_dir = TempDir::new().unwrap();
    let digest = Digest::of_bytes(b"hello world");
    seed_store(bad_dir.path(), digest, b"HELLO WORLD");
    seed_store(good_dir.path(), digest, b"hello world");
    let catalog = catalog(
        &[
            (
                "store.bad.url",
                Url::from_file_path(bad_dir.path()).unwrap().to_string(),
            ),
            (
                "store.good.url",
                Url::from_file_path(good_dir.path()).unwrap().to_string(),
            ),
        ],
        &cache,
    );

    let proxy_text = proxy::encode(digest);
    let mut input: &[u8] = proxy_text.as_bytes();
    let mut output: Vec<u8> = Vec::new();
    smudge(&mut input, &mut output, &cache, &catalog, "greeting.txt").unwrap();
    assert_eq!(output, b"hello world");
    assert!(cache.exists(digest));
}

#[test]
fn wrong_length_bytes_are_rejected() {
    let (_dir, cache) = new_cache();
    let store_dir = TempDir::new().unwrap();
    let digest = Digest::of_bytes(b"hello world");
    seed_store(store_dir.path(), digest, b"hello world, but longer");
    let catalog = catalog(
        &[(
            "store.depot.url",
            Url::from_file_path(store_dir.path()).unwrap().to_string(),
        )],
        &cache,
    );

    let proxy_text = proxy::encode(digest);
    let mut input: &[u8] = proxy_text.as_bytes();
    let mut output: Vec<u8> = Vec::new();
    smudge(&mut input, &mut output, &cache, &catalog, "greeting.txt").expect_err("Want err");
}

#[test]
fn non_proxy_input_is_an_error() {
    let (_dir, cache) = new_cache();
    let catalog = catalog(&[], &cache);
    let mut input: &[u8] = b"just some ordinary file content";
    let mut output: Vec<u8> = Vec::new();
    smudge(&mut input, &mut output, &cache, &catalog, "greeting.txt").expect_err("Want err");
}
