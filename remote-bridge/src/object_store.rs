/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Content checksums and a directory-backed [`ObjectStorage`].

use crate::transport::{ObjectStorage, TransportError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

const READ_CHUNK: usize = 64 * 1024;

/// Size and base64 encoded MD5 (`Content-MD5`) of a file.
pub fn file_size_and_md5(path: &Path) -> io::Result<(u64, String)> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; READ_CHUNK];
    let mut size = 0u64;
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as u64;
    }
    Ok((size, STANDARD.encode(hasher.finalize())))
}

/// Converts an S3 style ETag (quoted hex MD5) to the base64 `Content-MD5` form.
///
/// Multipart ETags (`<hex>-<parts>`) are not content digests and yield `None`.
pub fn etag_to_content_md5(etag: &str) -> Option<String> {
    let hex_digest = etag.trim().trim_matches('"');
    if hex_digest.len() != 32 {
        return None;
    }
    hex::decode(hex_digest).ok().map(|digest| STANDARD.encode(digest))
}

/// Object storage rooted at a local directory: `<root>/<bucket>/<remote path>`.
///
/// Metadata is written next to the object as `<object>.meta.json` when present.
#[derive(Clone, Debug)]
pub struct LocalObjectStorage {
    root: PathBuf,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, remote_path: &str) -> Result<PathBuf, TransportError> {
        let remote = Path::new(remote_path.trim_start_matches('/'));
        let escapes = remote
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if bucket.is_empty() || remote_path.is_empty() || escapes {
            return Err(TransportError::new(format!(
                "invalid object key `{bucket}/{remote_path}`"
            )));
        }
        Ok(self.root.join(bucket).join(remote))
    }
}

fn meta_path(object: &Path) -> PathBuf {
    let mut name = object.as_os_str().to_os_string();
    name.push(".meta.json");
    PathBuf::from(name)
}

fn store_file(
    source: &Path,
    object: &Path,
    meta: &HashMap<String, String>,
) -> Result<(), TransportError> {
    let fail = |err: io::Error| TransportError::new(format!("{}: {err}", object.display()));
    if let Some(parent) = object.parent() {
        fs::create_dir_all(parent).map_err(fail)?;
    }
    fs::copy(source, object).map_err(fail)?;
    let meta_file = meta_path(object);
    if meta.is_empty() {
        match fs::remove_file(&meta_file) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(fail(err)),
            _ => {}
        }
    } else {
        let encoded = serde_json::to_vec_pretty(meta)
            .map_err(|err| TransportError::new(format!("encode metadata: {err}")))?;
        fs::write(&meta_file, encoded).map_err(fail)?;
    }
    Ok(())
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put_object_from_file(
        &self,
        bucket: &str,
        remote_path: &str,
        local_path: &Path,
        meta: &HashMap<String, String>,
    ) -> Result<(), TransportError> {
        let object = self.object_path(bucket, remote_path)?;
        let source = local_path.to_path_buf();
        let meta = meta.clone();
        tokio::task::spawn_blocking(move || store_file(&source, &object, &meta))
            .await
            .map_err(|err| TransportError::new(format!("store task failed: {err}")))?
    }

    async fn object_exists(
        &self,
        bucket: &str,
        remote_path: &str,
        content_md5: &str,
    ) -> Result<bool, TransportError> {
        let object = self.object_path(bucket, remote_path)?;
        let expected = content_md5.to_string();
        tokio::task::spawn_blocking(move || match file_size_and_md5(&object) {
            Ok((_, md5)) => Ok(md5 == expected),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(TransportError::new(format!("{}: {err}", object.display()))),
        })
        .await
        .map_err(|err| TransportError::new(format!("lookup task failed: {err}")))?
    }
}
