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

//! Decides whether a path is uploaded as-is or archived first, and owns the
//! temporary archives it creates.

use crate::observability::events;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const COMPONENT: &str = "staging";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("walk: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("entry `{0}` is outside the archived tree")]
    Entry(PathBuf),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
    Other,
}

impl PathKind {
    pub fn of(metadata: &fs::Metadata) -> Self {
        if metadata.is_file() {
            PathKind::File
        } else if metadata.is_dir() {
            PathKind::Directory
        } else {
            PathKind::Other
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagingPlan {
    Direct,
    Archive(ArchiveFormat),
}

impl StagingPlan {
    /// Files are archived only on request. Directories are always archived, zip if
    /// requested and tar otherwise. Anything else cannot be uploaded.
    pub fn select(kind: PathKind, zip: bool) -> Option<Self> {
        match (kind, zip) {
            (PathKind::File, false) => Some(StagingPlan::Direct),
            (PathKind::File, true) | (PathKind::Directory, true) => {
                Some(StagingPlan::Archive(ArchiveFormat::Zip))
            }
            (PathKind::Directory, false) => Some(StagingPlan::Archive(ArchiveFormat::Tar)),
            (PathKind::Other, _) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("path `{0}` is neither a regular file nor a directory")]
    UnsupportedKind(PathBuf),
    #[error("failed to inspect `{path}`: {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to zip/tar `{path}`: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },
}

/// The file to upload. Removed on drop when it was created by staging.
#[derive(Debug)]
pub struct StagedArtifact {
    path: PathBuf,
    temporary: bool,
}

impl StagedArtifact {
    fn source(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            temporary: false,
        }
    }

    fn temporary(path: PathBuf) -> Self {
        Self {
            path,
            temporary: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if !self.temporary {
            return;
        }
        let result = if self.path.is_dir() {
            fs::remove_dir_all(&self.path)
        } else {
            fs::remove_file(&self.path)
        };
        match result {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                event = events::STAGING_CLEANUP_FAILED,
                component = COMPONENT,
                path = %self.path.display(),
                err = %err,
                "failed to remove staged artifact"
            ),
        }
    }
}

/// Archives into a dedicated temporary directory.
#[derive(Clone, Debug)]
pub struct ArchivalStaging {
    temp_dir: PathBuf,
}

impl ArchivalStaging {
    /// Creates `temp_dir` (and parents) if missing.
    pub fn new(temp_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let temp_dir = temp_dir.into();
        fs::create_dir_all(&temp_dir)?;
        Ok(Self { temp_dir })
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Blocking. Produces the single file to upload for `source`.
    pub fn stage(&self, source: &Path, zip: bool) -> Result<StagedArtifact, StageError> {
        let metadata = fs::metadata(source).map_err(|source_err| StageError::Inspect {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        let plan = StagingPlan::select(PathKind::of(&metadata), zip)
            .ok_or_else(|| StageError::UnsupportedKind(source.to_path_buf()))?;

        let format = match plan {
            StagingPlan::Direct => return Ok(StagedArtifact::source(source)),
            StagingPlan::Archive(format) => format,
        };

        // The guard exists before archiving so partial output is removed on failure.
        let artifact = StagedArtifact::temporary(self.temp_dir.join(Uuid::new_v4().to_string()));
        let archived = match format {
            ArchiveFormat::Zip => write_zip(source, artifact.path()),
            ArchiveFormat::Tar => write_tar(source, artifact.path()),
        };
        archived.map_err(|err| StageError::Archive {
            path: source.to_path_buf(),
            source: err,
        })?;

        debug!(
            event = events::STAGING_ARCHIVE_OK,
            component = COMPONENT,
            source = %source.display(),
            artifact = %artifact.path().display(),
            format = ?format,
            "staged archive"
        );
        Ok(artifact)
    }
}

fn zip_entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Entries are named relative to the parent of `source`, so the archive root is
/// the source's own name.
fn write_zip(source: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let base = source.parent().unwrap_or_else(|| Path::new(""));
    let mut writer = ZipWriter::new(File::create(dest)?);

    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(base)
            .map_err(|_| ArchiveError::Entry(entry.path().to_path_buf()))?;
        let name = relative.to_string_lossy().replace('\\', "/");
        if name.is_empty() {
            continue;
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            writer.add_directory(name, zip_entry_options())?;
        } else if file_type.is_symlink() {
            // Stored as a link entry, like the tar writer does.
            let target = fs::read_link(entry.path())?;
            let target = target.to_string_lossy().replace('\\', "/");
            writer.add_symlink(name, target, zip_entry_options())?;
        } else if file_type.is_file() {
            writer.start_file(name, zip_entry_options())?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut writer)?;
        }
    }

    writer.finish()?;
    Ok(())
}

fn write_tar(source: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let name = source
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut builder = tar::Builder::new(File::create(dest)?);
    builder.follow_symlinks(false);
    if source.is_dir() {
        builder.append_dir_all(&name, source)?;
    } else {
        builder.append_path_with_name(source, &name)?;
    }
    builder.into_inner()?.sync_all()?;
    Ok(())
}
