// Copyright 2023 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).
use crate::{decode, encode, first_line_is_sentinel, starts_with_sentinel, Proxy, SENTINEL};

use hashing::Digest;

#[test]
fn encodes_the_four_line_format() {
    let digest = Digest::of_bytes(b"hello world");
    assert_eq!(
        encode(digest),
        "~*@git-bifrost@*~\n1\n2AAE6C35C94FCFB415DBE95F408B9CE91EE846ED\n11\n"
    );
}

#[test]
fn decode_of_encode_is_identity() {
    let digest = Digest::of_bytes(b"some blob contents");
    assert_eq!(
        decode(encode(digest).as_bytes()).unwrap(),
        Some(Proxy::new(digest))
    );
}

#[test]
fn raw_content_is_not_a_proxy() {
    assert_eq!(decode(b"hello world").unwrap(), None);
    assert_eq!(decode(b"").unwrap(), None);
}

#[test]
fn partial_sentinel_is_not_a_proxy() {
    assert_eq!(decode(b"~*@git-bifr").unwrap(), None);
    // A full sentinel prefix on a longer first line is not the sentinel line.
    assert_eq!(decode(b"~*@git-bifrost@*~junk\n1\n").unwrap(), None);
    assert!(!first_line_is_sentinel(b"~*@git-bifrost@*~junk\n"));
    assert!(starts_with_sentinel(b"~*@git-bifrost@*~junk\n"));
}

#[test]
fn trailing_whitespace_is_tolerated() {
    let digest = Digest::of_bytes(b"hello world");
    let text = format!("{}\n", encode(digest));
    assert_eq!(decode(text.as_bytes()).unwrap(), Some(Proxy::new(digest)));
}

#[test]
fn sentinel_with_no_further_lines_is_corrupt() {
    decode(SENTINEL.as_bytes()).expect_err("Want err");
    decode(b"~*@git-bifrost@*~\n").expect_err("Want err");
}

#[test]
fn bad_version_is_corrupt() {
    decode(b"~*@git-bifrost@*~\nxyzzy\n2AAE6C35C94FCFB415DBE95F408B9CE91EE846ED\n11\n")
        .expect_err("Want err");
}

#[test]
fn bad_digest_is_corrupt() {
    decode(b"~*@git-bifrost@*~\n1\nnot-forty-hex-characters\n11\n").expect_err("Want err");
}

#[test]
fn bad_length_is_corrupt() {
    decode(b"~*@git-bifrost@*~\n1\n2AAE6C35C94FCFB415DBE95F408B9CE91EE846ED\neleven\n")
        .expect_err("Want err");
}

#[test]
fn empty_blob_proxy_round_trips() {
    let digest = Digest::of_bytes(b"");
    let decoded = decode(encode(digest).as_bytes()).unwrap().unwrap();
    assert_eq!(decoded.digest, digest);
    assert_eq!(decoded.version, 1);
}
