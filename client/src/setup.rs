// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use git::Git;
use log::info;

const PRE_COMMIT_HOOK: &str = "#!/bin/sh\nexec git-bifrost hook-pre-commit\n";
const PRE_PUSH_HOOK: &str = "#!/bin/sh\nexec git-bifrost hook-pre-push \"$@\"\n";

///
/// Installs the bifrost filter entries into the repository config and the pre-commit/pre-push
/// hook scripts into the hooks directory. Idempotent; refuses to overwrite a hook script it did
/// not write.
///
pub fn init(git: &Git) -> Result<i32, String> {
    git.config_set("filter.bifrost.clean", "git-bifrost filter-clean %f", None)?;
    git.config_set("filter.bifrost.smudge", "git-bifrost filter-smudge %f", None)?;
    git.config_set("filter.bifrost.required", "true", None)?;

    let hooks_dir = git.git_dir()?.join("hooks");
    install_hook(&hooks_dir, "pre-commit", PRE_COMMIT_HOOK)?;
    install_hook(&hooks_dir, "pre-push", PRE_PUSH_HOOK)?;

    info!("installed the bifrost filter and hooks");
    eprintln!(
        "bifrost is initialized; mark large files with 'filter=bifrost' in .gitattributes and \
         declare stores in {}",
        crate::REPO_CONFIG_FILE
    );
    Ok(0)
}

fn install_hook(dir: &Path, name: &str, body: &str) -> Result<(), String> {
    let path = dir.join(name);
    if path.exists() {
        let existing = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        if existing == body {
            return Ok(());
        }
        return Err(format!(
            "hook {} already exists and was not written by bifrost; refusing to overwrite it",
            path.display()
        ));
    }
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {e}", dir.display()))?;
    fs::write(&path, body).map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
    make_executable(&path)?;
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| format!("Failed to mark {} executable: {e}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), String> {
    Ok(())
}

///
/// Runs `git clone` with the given arguments (stdio inherited, so progress is the user's), then
/// initializes bifrost inside the fresh clone.
///
pub fn clone(args: &[String]) -> Result<i32, String> {
    let status = Command::new("git")
        .arg("clone")
        .args(args)
        .status()
        .map_err(|e| format!("Failed to launch git: {e}"))?;
    if !status.success() {
        return Ok(status.code().unwrap_or(1));
    }
    let destination = clone_destination(args).ok_or_else(|| {
        "could not work out the clone destination; run 'git-bifrost init' inside the new \
         repository"
            .to_owned()
    })?;
    init(&Git::new(destination))
}

///
/// Best-effort reproduction of where `git clone` put the repository: an explicit destination
/// argument when one was given, the basename of the source URL otherwise.
///
pub fn clone_destination(args: &[String]) -> Option<PathBuf> {
    let positionals: Vec<&String> = args.iter().filter(|arg| !arg.starts_with('-')).collect();
    match positionals.as_slice() {
        [source] => {
            let trimmed = source.trim_end_matches('/');
            let tail = trimmed.rsplit(['/', ':']).next()?;
            let name = tail.strip_suffix(".git").unwrap_or(tail);
            if name.is_empty() {
                None
            } else {
                Some(PathBuf::from(name))
            }
        }
        [_, destination] => Some(PathBuf::from(destination)),
        _ => None,
    }
}
