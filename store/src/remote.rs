// Copyright 2024 Bifrost project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use bytes::Bytes;
use curl::easy::{Easy, ReadError};
use log::debug;
use url::Url;

use crate::{PushOutcome, StoreProvider, StoreRecord};

///
/// The `ftp`/`ftps`/`sftp` transport, backed by libcurl. One `Easy` handle lives for the whole
/// session so that libcurl's connection reuse spans the transfers of a push sweep.
///
pub struct CurlStore {
    base: Url,
    username: Option<String>,
    password: Option<String>,
    handle: Option<Easy>,
}

/// True for the libcurl result codes that mean the remote side simply lacks the file:
/// CURLE_FTP_COULDNT_RETR_FILE (19) and CURLE_REMOTE_FILE_NOT_FOUND (78, the SFTP spelling).
fn error_means_absent(err: &curl::Error) -> bool {
    matches!(err.code(), 19 | 78)
}

impl CurlStore {
    pub fn new(record: &StoreRecord) -> CurlStore {
        CurlStore {
            base: record.url.clone(),
            username: record.username.clone(),
            password: record.password.clone(),
            handle: None,
        }
    }

    fn remote_url(&self, rel_path: &Path) -> Result<Url, String> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| format!("store url {} cannot carry a path", self.base))?;
            segments.pop_if_empty();
            for component in rel_path.components() {
                segments.push(&component.as_os_str().to_string_lossy());
            }
        }
        Ok(url)
    }

    /// Points the session handle at `url` and reapplies credentials and baseline options. Every
    /// option that varies between operations is set explicitly each time, so transfers cannot
    /// inherit a stale configuration from the previous one.
    fn prepare(&mut self, url: &Url) -> Result<&mut Easy, String> {
        let username = self.username.clone();
        let password = self.password.clone();
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| format!("store session for {url} was not opened"))?;
        handle
            .url(url.as_str())
            .map_err(|e| format!("{url}: {e}"))?;
        handle.nobody(false).map_err(|e| format!("{url}: {e}"))?;
        handle.upload(false).map_err(|e| format!("{url}: {e}"))?;
        if let Some(username) = username.as_deref() {
            handle
                .username(username)
                .map_err(|e| format!("{url}: {e}"))?;
        }
        if let Some(password) = password.as_deref() {
            handle
                .password(password)
                .map_err(|e| format!("{url}: {e}"))?;
        }
        Ok(handle)
    }

    /// Probes the remote length of `url`, for the pre-transfer duplicate check. Any failure is
    /// treated as "unknown" so that the subsequent upload gets to report the real error.
    fn remote_size(&mut self, url: &Url) -> Option<u64> {
        let handle = self.prepare(url).ok()?;
        if let Err(e) = handle.nobody(true) {
            debug!("{url}: {e}");
            return None;
        }
        if let Err(e) = handle.perform() {
            if !error_means_absent(&e) {
                debug!("probe of {url} failed: {e}");
            }
            return None;
        }
        match handle.content_length_download() {
            Ok(length) if length >= 0.0 => Some(length as u64),
            _ => None,
        }
    }
}

impl StoreProvider for CurlStore {
    fn open(&mut self) -> Result<(), String> {
        if self.handle.is_none() {
            // Authentication happens on the first transfer; libcurl keeps the control
            // connection alive on the handle afterwards.
            self.handle = Some(Easy::new());
        }
        Ok(())
    }

    fn push(&mut self, local_path: &Path, rel_path: &Path) -> Result<PushOutcome, String> {
        let url = self.remote_url(rel_path)?;
        let src_len = std::fs::metadata(local_path)
            .map_err(|e| format!("Failed to stat {}: {e}", local_path.display()))?
            .len();

        if self.remote_size(&url) == Some(src_len) {
            debug!("{url} already present, skipping");
            return Ok(PushOutcome::Skipped);
        }

        let mut src = File::open(local_path)
            .map_err(|e| format!("Failed to open {}: {e}", local_path.display()))?;
        let handle = self.prepare(&url)?;
        handle.upload(true).map_err(|e| format!("{url}: {e}"))?;
        handle
            .in_filesize(src_len)
            .map_err(|e| format!("{url}: {e}"))?;
        // curl-rs has no safe wrapper for CURLOPT_FTP_CREATE_MISSING_DIRS, so set it directly.
        unsafe {
            let rc = curl_sys::curl_easy_setopt(
                handle.raw(),
                curl_sys::CURLOPT_FTP_CREATE_MISSING_DIRS,
                1 as std::os::raw::c_long,
            );
            if rc != curl_sys::CURLE_OK {
                return Err(format!("{url}: failed to set FTP_CREATE_MISSING_DIRS ({rc})"));
            }
        }
        {
            let mut transfer = handle.transfer();
            transfer
                .read_function(move |into| src.read(into).map_err(|_| ReadError::Abort))
                .map_err(|e| format!("{url}: {e}"))?;
            transfer
                .perform()
                .map_err(|e| format!("upload to {url} failed: {e}"))?;
        }
        Ok(PushOutcome::Success)
    }

    fn pull(&mut self, rel_path: &Path) -> Result<Option<Bytes>, String> {
        let url = self.remote_url(rel_path)?;
        let mut buf: Vec<u8> = Vec::new();
        let handle = self.prepare(&url)?;
        {
            let mut transfer = handle.transfer();
            transfer
                .write_function(|data| {
                    buf.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(|e| format!("{url}: {e}"))?;
            match transfer.perform() {
                Ok(()) => {}
                Err(e) if error_means_absent(&e) => return Ok(None),
                Err(e) => return Err(format!("download of {url} failed: {e}")),
            }
        }
        Ok(Some(Bytes::from(buf)))
    }

    fn close(&mut self) {
        self.handle = None;
    }
}
