// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::Path;

use git::Git;

pub const DEFAULT_TEXT_SIZE_THRESHOLD: i64 = 5 * 1024 * 1024;
pub const DEFAULT_BIN_SIZE_THRESHOLD: i64 = 100 * 1024;

/// How much of a blob we scan for NUL bytes when no `binary` attribute decides for us.
const NUL_SCAN_LIMIT: usize = 4000;

///
/// The pre-commit guard. For every staged path, either the path carries `filter=bifrost` and its
/// staged content must already be a proxy (the user changed attributes after staging otherwise),
/// or it is unfiltered and its size is held to the text/binary threshold from `.gitbifrost`.
/// A threshold of -1 disables that check. Exits non-zero, with per-file messages in staged-list
/// order and a guidance line, when anything is flagged.
///
pub fn run(git: &Git) -> Result<i32, String> {
    let staged = git.staged_paths()?;
    if staged.is_empty() {
        return Ok(0);
    }

    let config = Path::new(crate::REPO_CONFIG_FILE);
    let (text_threshold, bin_threshold) = if config.is_file() {
        (
            git.config_get_int("repo.text-size-threshold", config)?
                .unwrap_or(DEFAULT_TEXT_SIZE_THRESHOLD),
            git.config_get_int("repo.bin-size-threshold", config)?
                .unwrap_or(DEFAULT_BIN_SIZE_THRESHOLD),
        )
    } else {
        (DEFAULT_TEXT_SIZE_THRESHOLD, DEFAULT_BIN_SIZE_THRESHOLD)
    };

    let mut messages: Vec<String> = Vec::new();
    let mut needs_restage = false;
    let mut oversize = false;
    let total = staged.len();
    for (index, path) in staged.iter().enumerate() {
        eprint!("\rChecking staged files {}%", (index + 1) * 100 / total);
        let revision = format!(":{}", path.display());

        if git.filter_attribute(path)? == "bifrost" {
            let head = git.read_blob_prefix(&revision, proxy::SENTINEL.len())?;
            if !proxy::starts_with_sentinel(&head) {
                messages.push(format!(
                    "File '{}' has filter=bifrost but its staged content is not a proxy.",
                    path.display()
                ));
                needs_restage = true;
            }
        } else {
            let binary = git.attribute_is_set(path, "binary")?
                || git.read_blob_prefix(&revision, NUL_SCAN_LIMIT)?.contains(&0);
            let size_bytes = git.blob_size(&revision)?;
            let threshold = if binary { bin_threshold } else { text_threshold };
            if threshold >= 0 && size_bytes > threshold as u64 {
                let kind = if binary { "Binary" } else { "Text" };
                messages.push(format!(
                    "{kind} file too big '{}' ({} bytes).",
                    path.display(),
                    group_digits(size_bytes)
                ));
                oversize = true;
            }
        }
    }
    eprintln!();

    if messages.is_empty() {
        return Ok(0);
    }
    for message in &messages {
        eprintln!("{message}");
    }
    if needs_restage {
        eprintln!(
            "Some staged files changed filter attributes after staging; restage them \
             (git rm --cached <file> && git add <file>) so the bifrost clean filter runs."
        );
    }
    if oversize {
        eprintln!(
            "Track large files with bifrost (filter=bifrost in .gitattributes) or adjust the \
             thresholds in {}.",
            crate::REPO_CONFIG_FILE
        );
    }
    Ok(1)
}

/// Renders a byte count with thousands separators, e.g. `6,000,000`.
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
