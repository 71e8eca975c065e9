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

mod parse;

pub use crate::parse::{
    parse_check_attr_z, parse_config_lines, parse_name_status_z, ChangedEntry,
};

use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

///
/// Adapter over the `git` binary. Every operation launches a subprocess with stdin closed and
/// stdout captured; a non-zero exit is surfaced as an error except where an operation explicitly
/// tolerates it (config lookups tolerate "not set", prefix reads tolerate early pipe closure).
///
pub struct Git {
    work_dir: PathBuf,
}

impl Git {
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Git {
        Git {
            work_dir: work_dir.as_ref().to_owned(),
        }
    }

    pub fn for_current_dir() -> Result<Git, String> {
        let cwd = env::current_dir()
            .map_err(|e| format!("Could not detect current working directory: {e}"))?;
        Ok(Git::new(cwd))
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new("git");
        command
            .args(args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null());
        command
    }

    fn output(&self, args: &[&str]) -> Result<Vec<u8>, String> {
        debug!("git {}", args.join(" "));
        let output = self
            .command(args)
            .output()
            .map_err(|e| format!("Failed to launch git: {e}"))?;
        if !output.status.success() {
            return Err(format!(
                "git {} failed ({}): {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(output.stdout)
    }

    /// Like `output`, but treats exit status 1 as "nothing found". `git config --get` and
    /// `--get-regexp` use that status for an unset key rather than a real failure.
    fn output_allowing_unset(&self, args: &[&str]) -> Result<Option<Vec<u8>>, String> {
        debug!("git {}", args.join(" "));
        let output = self
            .command(args)
            .output()
            .map_err(|e| format!("Failed to launch git: {e}"))?;
        if output.status.success() {
            Ok(Some(output.stdout))
        } else if output.status.code() == Some(1) {
            Ok(None)
        } else {
            Err(format!(
                "git {} failed ({}): {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }

    fn output_lines(&self, args: &[&str]) -> Result<Vec<String>, String> {
        let stdout = self.output(args)?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::to_owned)
            .collect())
    }

    /// The repository's git directory, made absolute against the working directory.
    pub fn git_dir(&self) -> Result<PathBuf, String> {
        let stdout = self.output(&["rev-parse", "--git-dir"])?;
        let path = PathBuf::from(String::from_utf8_lossy(&stdout).trim());
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(self.work_dir.join(path))
        }
    }

    /// Commits reachable from `local_ref` but not from any ref under `remote_name`, in
    /// rev-list order.
    pub fn rev_list_not_remotes(
        &self,
        local_ref: &str,
        remote_name: &str,
    ) -> Result<Vec<String>, String> {
        self.output_lines(&[
            "rev-list",
            local_ref,
            "--not",
            &format!("--remotes={remote_name}"),
        ])
    }

    /// All reachable commits.
    pub fn rev_list_all(&self) -> Result<Vec<String>, String> {
        self.output_lines(&["rev-list", "--all"])
    }

    /// The `(status, path)` pairs of everything `commit` changed, NUL-parsed so arbitrary
    /// filenames survive.
    pub fn changed_entries(&self, commit: &str) -> Result<Vec<ChangedEntry>, String> {
        let stdout = self.output(&[
            "diff-tree",
            "--no-commit-id",
            "--name-status",
            "--root",
            "-r",
            "-z",
            commit,
        ])?;
        parse_name_status_z(&stdout)
    }

    /// Paths staged against the index, excluding deletions (a deleted path has no staged blob to
    /// inspect).
    pub fn staged_paths(&self) -> Result<Vec<PathBuf>, String> {
        let stdout = self.output(&[
            "diff",
            "--cached",
            "--name-only",
            "--diff-filter=d",
            "-z",
        ])?;
        Ok(parse::split_nul_paths(&stdout))
    }

    /// The value of the `filter` attribute for `path`, as recorded in the index:
    /// `"unspecified"`, `"set"`, `"unset"`, or the attribute's string value.
    pub fn filter_attribute(&self, path: &Path) -> Result<String, String> {
        self.attribute_value(path, "filter")
    }

    /// True when the boolean attribute `name` is set on `path`.
    pub fn attribute_is_set(&self, path: &Path, name: &str) -> Result<bool, String> {
        Ok(self.attribute_value(path, name)? == "set")
    }

    fn attribute_value(&self, path: &Path, name: &str) -> Result<String, String> {
        let path_arg = path.to_string_lossy();
        let stdout = self.output(&["check-attr", "--cached", "-z", name, "--", &path_arg])?;
        let records = parse_check_attr_z(&stdout)?;
        records
            .into_iter()
            .find(|(_, attr, _)| attr.as_str() == name)
            .map(|(_, _, value)| value)
            .ok_or_else(|| format!("git check-attr reported nothing for '{}'", path.display()))
    }

    ///
    /// Reads at most `max_len` bytes of the blob at `revision` (a `commit:path` or `:path`
    /// reference). The pipe is closed without draining it, so git's resulting write failure is
    /// expected and the exit status is deliberately ignored.
    ///
    pub fn read_blob_prefix(&self, revision: &str, max_len: usize) -> Result<Vec<u8>, String> {
        debug!("git cat-file blob {revision} (prefix of {max_len})");
        let mut child = self
            .command(&["cat-file", "blob", revision])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("Failed to launch git: {e}"))?;
        let mut buf = Vec::with_capacity(max_len);
        let stdout = child
            .stdout
            .take()
            .expect("child was spawned with piped stdout");
        stdout
            .take(max_len as u64)
            .read_to_end(&mut buf)
            .map_err(|e| format!("Failed to read git cat-file output for {revision}: {e}"))?;
        let _ = child.kill();
        let _ = child.wait();
        Ok(buf)
    }

    /// The size in bytes of the blob at `revision`.
    pub fn blob_size(&self, revision: &str) -> Result<u64, String> {
        let stdout = self.output(&["cat-file", "-s", revision])?;
        let text = String::from_utf8_lossy(&stdout);
        text.trim()
            .parse::<u64>()
            .map_err(|e| format!("Unexpected git cat-file -s output {:?}: {e}", text.trim()))
    }

    /// An integer-valued key from `file`, or `None` when unset.
    pub fn config_get_int(&self, key: &str, file: &Path) -> Result<Option<i64>, String> {
        let file_arg = file.to_string_lossy();
        let Some(stdout) =
            self.output_allowing_unset(&["config", "-f", &file_arg, "--int", "--get", key])?
        else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&stdout);
        text.trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|e| format!("Unexpected git config --int output {:?}: {e}", text.trim()))
    }

    /// All `(key, value)` pairs in `file` whose keys match `pattern`, in file order. An empty
    /// result is not an error.
    pub fn config_get_regexp(
        &self,
        pattern: &str,
        file: &Path,
    ) -> Result<Vec<(String, String)>, String> {
        let file_arg = file.to_string_lossy();
        let Some(stdout) =
            self.output_allowing_unset(&["config", "-f", &file_arg, "--get-regexp", pattern])?
        else {
            return Ok(Vec::new());
        };
        Ok(parse_config_lines(&String::from_utf8_lossy(&stdout)))
    }

    /// Sets `key` to `value`, in `file` when given and in the repository config otherwise.
    pub fn config_set(&self, key: &str, value: &str, file: Option<&Path>) -> Result<(), String> {
        match file {
            Some(file) => {
                let file_arg = file.to_string_lossy();
                self.output(&["config", "-f", &file_arg, key, value])?;
            }
            None => {
                self.output(&["config", key, value])?;
            }
        }
        Ok(())
    }
}
