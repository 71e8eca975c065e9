// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::PathBuf;

///
/// One record of `diff-tree --name-status -z` output: the status field (`A`, `M`, `D`, `R<n>`,
/// `C<n>`, or `X` when git itself reports something is wrong) and the affected path. Renames and
/// copies carry the destination path.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChangedEntry {
    pub status: String,
    pub path: PathBuf,
}

impl ChangedEntry {
    /// The leading status character, which is what callers dispatch on.
    pub fn status_char(&self) -> char {
        self.status.chars().next().unwrap_or('X')
    }
}

/// Splits NUL-delimited output into raw byte fields, dropping the empty trailing field.
fn split_nul(bytes: &[u8]) -> Vec<&[u8]> {
    bytes
        .split(|&b| b == 0)
        .filter(|field| !field.is_empty())
        .collect()
}

fn os_path(bytes: &[u8]) -> PathBuf {
    #[cfg(unix)]
    {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        PathBuf::from(OsStr::from_bytes(bytes))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Parses `git diff --name-only -z` style output: NUL-terminated paths.
pub(crate) fn split_nul_paths(bytes: &[u8]) -> Vec<PathBuf> {
    split_nul(bytes).into_iter().map(os_path).collect()
}

///
/// Parses `git diff-tree --name-status -z` output. Records are `status NUL path NUL`, except
/// that rename and copy statuses (`R<score>`, `C<score>`) are followed by both the source and the
/// destination path.
///
pub fn parse_name_status_z(bytes: &[u8]) -> Result<Vec<ChangedEntry>, String> {
    let fields = split_nul(bytes);
    let mut entries = Vec::new();
    let mut index = 0;
    while index < fields.len() {
        let status = String::from_utf8_lossy(fields[index]).into_owned();
        let path_count = match status.chars().next() {
            Some('R') | Some('C') => 2,
            Some(_) => 1,
            None => return Err("Malformed diff-tree output: empty status field".to_owned()),
        };
        let path_field = fields.get(index + path_count).ok_or_else(|| {
            format!("Malformed diff-tree output: status '{status}' with no path")
        })?;
        entries.push(ChangedEntry {
            status,
            path: os_path(path_field),
        });
        index += 1 + path_count;
    }
    Ok(entries)
}

///
/// Parses `git check-attr -z` output: repeated `path NUL attribute NUL value NUL` triples.
///
pub fn parse_check_attr_z(bytes: &[u8]) -> Result<Vec<(PathBuf, String, String)>, String> {
    let fields: Vec<&[u8]> = bytes
        .split(|&b| b == 0)
        .collect();
    // A trailing NUL leaves one empty field at the end.
    let fields = match fields.last() {
        Some(last) if last.is_empty() => &fields[..fields.len() - 1],
        _ => &fields[..],
    };
    if fields.len() % 3 != 0 {
        return Err(format!(
            "Malformed check-attr output: {} fields is not a multiple of three",
            fields.len()
        ));
    }
    Ok(fields
        .chunks(3)
        .map(|record| {
            (
                os_path(record[0]),
                String::from_utf8_lossy(record[1]).into_owned(),
                String::from_utf8_lossy(record[2]).into_owned(),
            )
        })
        .collect())
}

///
/// Parses `git config --get-regexp` output: one `key value` pair per line, where a key with no
/// value occupies the whole line.
///
pub fn parse_config_lines(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(' ') {
            Some((key, value)) => (key.to_owned(), value.to_owned()),
            None => (line.to_owned(), String::new()),
        })
        .collect()
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod parse_tests;
