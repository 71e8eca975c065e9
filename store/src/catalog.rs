// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::env;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, warn};
use url::Url;

/// The reserved name of the local-cache pseudo-store prepended to every catalog.
pub const INTERNAL_STORE_NAME: &str = "store.BIFROST.INTERNAL";

///
/// One configured backing location for blobs.
///
#[derive(Clone, Debug)]
pub struct StoreRecord {
    pub name: String,
    pub url: Url,
    /// The push URL of the logical remote this store backs, if any. Compared in normalized form
    /// against the destination URL at push time.
    pub remote: Option<String>,
    /// Push must update at least one primary store per remote to succeed.
    pub primary: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

///
/// The ordered list of store records visible to this repository: the internal cache pseudo-store
/// first, then every `store.<name>.*` declaration in first-appearance order.
///
#[derive(Debug)]
pub struct Catalog {
    records: Vec<StoreRecord>,
}

impl Catalog {
    ///
    /// Builds a catalog by a grouping reduction over `(key, value)` config entries, where keys
    /// have the shape `store.<name>.<field>`. Entries arriving later override earlier values for
    /// the same `(name, field)`, which is how the `.gitbifrostuser` overlay shadows
    /// `.gitbifrost`.
    ///
    pub fn assemble<I>(entries: I, cache_root: &Path) -> Result<Catalog, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut grouped: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
        for (key, value) in entries {
            let Some((name, field)) = key.rsplit_once('.') else {
                debug!("ignoring config entry with no field component: {key}");
                continue;
            };
            if !name.starts_with("store.") {
                debug!("ignoring non-store config entry: {key}");
                continue;
            }
            grouped
                .entry(name.to_owned())
                .or_default()
                .insert(field.to_owned(), value);
        }

        let mut records = vec![internal_record(cache_root)?];
        for (name, fields) in grouped {
            if name == INTERNAL_STORE_NAME {
                return Err(format!("the store name {INTERNAL_STORE_NAME} is reserved"));
            }
            // A store with no usable url cannot serve anything; dropping it here (rather than
            // failing the whole catalog) keeps checkouts working when one declaration has a typo.
            let Some(url_value) = fields.get("url") else {
                warn!("store '{name}' is missing the required key url; ignoring this store");
                continue;
            };
            let url = match Url::parse(url_value) {
                Ok(url) => url,
                Err(e) => {
                    warn!("store '{name}' has an unusable url {url_value:?} ({e}); ignoring this store");
                    continue;
                }
            };
            for field in fields.keys() {
                if !matches!(
                    field.as_str(),
                    "url" | "remote" | "primary" | "username" | "password"
                ) {
                    warn!("store '{name}' has an unrecognized key '{field}'; ignoring it");
                }
            }
            records.push(StoreRecord {
                name,
                url,
                remote: fields.get("remote").cloned(),
                primary: fields.get("primary").map(|v| v == "true").unwrap_or(false),
                username: fields.get("username").cloned(),
                password: fields.get("password").cloned(),
            });
        }
        Ok(Catalog { records })
    }

    pub fn records(&self) -> &[StoreRecord] {
        &self.records
    }

    ///
    /// The records declared to back `remote_url`, in catalog order. Records with no `remote`
    /// (including the internal pseudo-store) never match.
    ///
    pub fn records_for_remote(&self, remote_url: &str) -> Vec<&StoreRecord> {
        let destination = normalize_remote(remote_url);
        self.records
            .iter()
            .filter(|record| {
                record
                    .remote
                    .as_deref()
                    .map(|remote| normalize_remote(remote) == destination)
                    .unwrap_or(false)
            })
            .collect()
    }
}

fn internal_record(cache_root: &Path) -> Result<StoreRecord, String> {
    let url = Url::from_file_path(cache_root).map_err(|()| {
        format!(
            "cache root {} cannot be expressed as a file url",
            cache_root.display()
        )
    })?;
    Ok(StoreRecord {
        name: INTERNAL_STORE_NAME.to_owned(),
        url,
        remote: None,
        primary: false,
        username: None,
        password: None,
    })
}

///
/// Canonicalizes a remote declaration or push URL for comparison. Scheme-qualified URLs compare
/// verbatim (minus any trailing slash); anything else is treated as a path and made absolute
/// against the working directory, with `.` and `..` components folded away lexically.
///
pub fn normalize_remote(value: &str) -> String {
    if value.contains("://") && Url::parse(value).is_ok() {
        return value.trim_end_matches('/').to_owned();
    }
    let path = Path::new(value);
    let absolute = if path.is_absolute() {
        path.to_owned()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_owned())
    };
    normalize_path(&absolute).to_string_lossy().into_owned()
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
