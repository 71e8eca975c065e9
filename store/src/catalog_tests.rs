// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).
use crate::{normalize_remote, Catalog, INTERNAL_STORE_NAME};

use std::path::Path;

fn entries(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn cache_root() -> &'static Path {
    Path::new("/tmp/repo/.git/bifrost/data")
}

#[test]
fn internal_store_is_always_first() {
    let catalog = Catalog::assemble(entries(&[]), cache_root()).unwrap();
    assert_eq!(catalog.records().len(), 1);
    let internal = &catalog.records()[0];
    assert_eq!(internal.name, INTERNAL_STORE_NAME);
    assert_eq!(internal.url.scheme(), "file");
    assert!(!internal.primary);
    assert_eq!(internal.remote, None);
}

#[test]
fn groups_fields_by_store_name_in_declaration_order() {
    let catalog = Catalog::assemble(
        entries(&[
            ("store.depot.url", "ftp://example.com/blobs"),
            ("store.depot.primary", "true"),
            ("store.depot.remote", "/srv/git/repo"),
            ("store.mirror.url", "file:///mnt/mirror"),
        ]),
        cache_root(),
    )
    .unwrap();

    let names: Vec<&str> = catalog
        .records()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, vec![INTERNAL_STORE_NAME, "store.depot", "store.mirror"]);

    let depot = &catalog.records()[1];
    assert_eq!(depot.url.as_str(), "ftp://example.com/blobs");
    assert!(depot.primary);
    assert_eq!(depot.remote.as_deref(), Some("/srv/git/repo"));

    let mirror = &catalog.records()[2];
    assert!(!mirror.primary);
}

#[test]
fn later_entries_override_earlier_ones() {
    // The user overlay arrives after the repository config and shadows by (name, field).
    let catalog = Catalog::assemble(
        entries(&[
            ("store.depot.url", "ftp://example.com/blobs"),
            ("store.depot.username", "build"),
            ("store.depot.username", "me"),
            ("store.depot.password", "hunter2"),
        ]),
        cache_root(),
    )
    .unwrap();
    let depot = &catalog.records()[1];
    assert_eq!(depot.username.as_deref(), Some("me"));
    assert_eq!(depot.password.as_deref(), Some("hunter2"));
}

#[test]
fn a_store_with_no_url_is_dropped() {
    let catalog =
        Catalog::assemble(entries(&[("store.depot.primary", "true")]), cache_root()).unwrap();
    assert_eq!(catalog.records().len(), 1);
}

#[test]
fn a_store_with_an_unparseable_url_is_dropped() {
    let catalog =
        Catalog::assemble(entries(&[("store.depot.url", "not a url")]), cache_root()).unwrap();
    assert_eq!(catalog.records().len(), 1);
}

#[test]
fn reserved_name_is_rejected() {
    Catalog::assemble(
        entries(&[("store.BIFROST.INTERNAL.url", "file:///tmp/x")]),
        cache_root(),
    )
    .expect_err("Want err");
}

#[test]
fn records_for_remote_matches_normalized_paths() {
    let catalog = Catalog::assemble(
        entries(&[
            ("store.depot.url", "file:///mnt/blobs"),
            ("store.depot.remote", "/srv/git/repo/"),
            ("store.other.url", "file:///mnt/other"),
            ("store.other.remote", "/srv/git/elsewhere"),
        ]),
        cache_root(),
    )
    .unwrap();

    let matching = catalog.records_for_remote("/srv/git/./repo");
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].name, "store.depot");

    assert!(catalog.records_for_remote("/srv/git/unrelated").is_empty());
}

#[test]
fn normalize_remote_handles_urls_and_paths() {
    assert_eq!(
        normalize_remote("ssh://host/srv/git/repo/"),
        "ssh://host/srv/git/repo"
    );
    assert_eq!(normalize_remote("/a/b/../c"), "/a/c");
    assert_eq!(normalize_remote("/a/./b"), "/a/b");
}
