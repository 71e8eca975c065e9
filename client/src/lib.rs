// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
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

pub mod clean;
pub mod pre_commit;
pub mod pre_push;
pub mod setup;
pub mod smudge;
pub mod verify;

use std::env;
use std::path::Path;
use std::str::FromStr;

use cache::LocalCache;
use clap::{Parser, Subcommand};
use git::Git;
use log::LevelFilter;
use store::Catalog;
use strum::VariantNames;
use strum_macros::{EnumString, VariantNames};

/// Repository-visible config file holding store declarations and thresholds.
pub const REPO_CONFIG_FILE: &str = ".gitbifrost";
/// Optional per-user overlay; may add stores or shadow keys from the repository file.
pub const USER_CONFIG_FILE: &str = ".gitbifrostuser";

pub const VERBOSITY_ENV_VAR: &str = "GITBIFROST_VERBOSITY";

/// How many bytes of a historical blob we read when deciding whether it is a proxy. Proxies are
/// well under a hundred bytes; everything past the fourth line is ignored anyway.
pub(crate) const PROXY_PREFIX_LEN: usize = 256;

#[derive(Parser)]
#[command(
    name = "git-bifrost",
    version,
    about = "Large file support for git, backed by pluggable blob stores."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: BifrostCommand,
}

#[derive(Subcommand)]
pub enum BifrostCommand {
    /// Clean filter: read a blob on stdin, emit its proxy on stdout and cache the blob.
    FilterClean {
        /// Path of the file being filtered, for diagnostics only.
        path: String,
    },
    /// Smudge filter: read a proxy on stdin, emit the original blob on stdout.
    FilterSmudge {
        /// Path of the file being filtered, for diagnostics only.
        path: String,
    },
    /// Pre-commit hook: reject oversize unfiltered blobs and incorrectly staged proxies.
    HookPreCommit,
    /// Pre-push hook: replicate the blobs behind outgoing proxies to the remote's stores.
    HookPrePush {
        remote_name: String,
        remote_url: String,
    },
    /// Audit a store against every proxy reachable in history. Exits with the bad-file count.
    Verify {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Report every entry rather than only the bad ones.
        #[arg(long)]
        verbose: bool,
        store_uri: String,
    },
    /// Install the bifrost filter entries and hooks into the current repository.
    Init,
    /// Clone a repository and initialize bifrost inside the clone.
    Clone {
        /// Arguments forwarded to `git clone`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString, VariantNames)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Verbosity {
    Normal,
    Loud,
    Debug,
}

impl Verbosity {
    fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Normal => LevelFilter::Warn,
            Verbosity::Loud => LevelFilter::Info,
            Verbosity::Debug => LevelFilter::Debug,
        }
    }
}

pub fn init_logging() {
    let verbosity = match env::var(VERBOSITY_ENV_VAR) {
        Ok(value) => Verbosity::from_str(&value).unwrap_or_else(|_| {
            eprintln!(
                "git-bifrost: unrecognized {VERBOSITY_ENV_VAR} {value:?}; expected one of {}",
                Verbosity::VARIANTS.join(", ")
            );
            Verbosity::Normal
        }),
        Err(_) => Verbosity::Normal,
    };
    env_logger::Builder::new()
        .filter_level(verbosity.level_filter())
        .format_timestamp(None)
        .init();
}

pub fn execute(cli: Cli) -> Result<i32, String> {
    let git = Git::for_current_dir()?;
    match cli.command {
        BifrostCommand::FilterClean { path } => clean::run(&git, &path),
        BifrostCommand::FilterSmudge { path } => smudge::run(&git, &path),
        BifrostCommand::HookPreCommit => pre_commit::run(&git),
        BifrostCommand::HookPrePush {
            remote_name,
            remote_url,
        } => pre_push::run(&git, &remote_name, &remote_url),
        BifrostCommand::Verify {
            username,
            password,
            verbose,
            store_uri,
        } => verify::run(&git, &store_uri, username, password, verbose),
        BifrostCommand::Init => setup::init(&git),
        BifrostCommand::Clone { args } => setup::clone(&args),
    }
}

/// The repository's local blob cache, beneath its git directory.
pub fn local_cache(git: &Git) -> Result<LocalCache, String> {
    Ok(LocalCache::new(git.git_dir()?.join(cache::CACHE_RELDIR)))
}

///
/// Loads the store catalog: `.gitbifrost` first, then the `.gitbifrostuser` overlay, with the
/// internal cache pseudo-store prepended. A missing config file contributes nothing.
///
pub fn load_catalog(git: &Git, cache: &LocalCache) -> Result<Catalog, String> {
    let mut entries = Vec::new();
    for file in [REPO_CONFIG_FILE, USER_CONFIG_FILE] {
        let path = Path::new(file);
        if path.is_file() {
            entries.extend(git.config_get_regexp(r"store\..*", path)?);
        }
    }
    Catalog::assemble(entries, cache.root())
}


#[cfg(test)]
mod smudge_tests;


#[cfg(test)]
mod pre_push_tests;
