// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use log::debug;
use tempfile::Builder;

use crate::{PushOutcome, StoreProvider, StoreRecord};

///
/// The `file` scheme transport: a store rooted at a local (or mounted) directory.
///
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(record: &StoreRecord) -> Result<FileStore, String> {
        let root = record.url.to_file_path().map_err(|()| {
            format!(
                "store '{}' has a file url with no usable path: {}",
                record.name, record.url
            )
        })?;
        Ok(FileStore { root })
    }
}

impl StoreProvider for FileStore {
    fn open(&mut self) -> Result<(), String> {
        // There is no session to establish; a missing root directory simply means every pull
        // is absent and the first push creates it.
        Ok(())
    }

    fn push(&mut self, local_path: &Path, rel_path: &Path) -> Result<PushOutcome, String> {
        let dest = self.root.join(rel_path);
        let src_len = fs::metadata(local_path)
            .map_err(|e| format!("Failed to stat {}: {e}", local_path.display()))?
            .len();

        if let Ok(existing) = fs::metadata(&dest) {
            if existing.len() == src_len {
                debug!("{} already present, skipping", dest.display());
                return Ok(PushOutcome::Skipped);
            }
        }

        let parent = dest
            .parent()
            .expect("store-relative paths always have a parent directory");
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;

        let staged = Builder::new()
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|e| format!("Failed to create temp file in {}: {e}", parent.display()))?;
        let mut src = fs::File::open(local_path)
            .map_err(|e| format!("Failed to open {}: {e}", local_path.display()))?;
        io::copy(&mut src, &mut staged.as_file())
            .map_err(|e| format!("Failed to copy into {}: {e}", dest.display()))?;
        staged
            .persist(&dest)
            .map_err(|e| format!("Failed to rename into {}: {e}", dest.display()))?;
        Ok(PushOutcome::Success)
    }

    fn pull(&mut self, rel_path: &Path) -> Result<Option<Bytes>, String> {
        let path = self.root.join(rel_path);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(format!("Failed to read {}: {e}", path.display())),
        }
    }

    fn close(&mut self) {}
}
