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

//! Error types shared across the pipeline.

use crate::config::ConfigError;
use crate::quota::QuotaError;
use crate::staging::{ArchiveError, StageError};
use crate::transport::TransportError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Terminal outcome of one message that did not succeed.
///
/// Every variant reaches the completion handler exactly once; none of them is fatal
/// to the process.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("local path `{0}` must not contain a `..` segment")]
    PathTraversal(String),
    #[error("failed to find path `{path}`: {reason}")]
    PathNotFound { path: PathBuf, reason: String },
    #[error("failed to zip/tar `{path}`: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },
    #[error("failed to checksum `{path}`: {source}")]
    Checksum {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("transport call timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to submit task: no worker can be used ({0} workers busy)")]
    PoolSaturated(usize),
    #[error("client `{0}` is closed")]
    ClientClosed(String),
    #[error("event kind `{kind}` is not supported by client `{client}`")]
    UnsupportedEvent { client: String, kind: &'static str },
    #[error("delivery task failed: {0}")]
    TaskPanicked(String),
}

impl DeliveryError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, DeliveryError::Quota(QuotaError::Exceeded { .. }))
    }
}

impl From<StageError> for DeliveryError {
    fn from(err: StageError) -> Self {
        match err {
            StageError::Inspect { path, source } => DeliveryError::PathNotFound {
                path,
                reason: source.to_string(),
            },
            StageError::UnsupportedKind(path) => DeliveryError::PathNotFound {
                path,
                reason: "neither a regular file nor a directory".to_string(),
            },
            StageError::Archive { path, source } => DeliveryError::Archive { path, source },
        }
    }
}

/// Failure to construct a sink client.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to prepare temp path `{path}`: {source}")]
    TempPath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to resolve working directory: {0}")]
    WorkingDir(#[source] io::Error),
    #[error("failed to load stats for client `{client}`: {source}")]
    Quota {
        client: String,
        #[source]
        source: QuotaError,
    },
    #[error("failed to create transport for client `{client}`: {source}")]
    Connector {
        client: String,
        #[source]
        source: TransportError,
    },
}

/// Failure to set up a rule.
#[derive(Debug, Error)]
pub enum RulerError {
    #[error("client ({0}) not found")]
    TargetNotFound(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to connect source for rule `{rule}`: {source}")]
    Source {
        rule: String,
        #[source]
        source: TransportError,
    },
}

#[cfg(test)]
mod tests {
    use super::{DeliveryError, RulerError};
    use crate::quota::QuotaError;
    use crate::staging::StageError;
    use std::path::PathBuf;

    #[test]
    fn unsupported_kind_maps_to_path_not_found() {
        let err = DeliveryError::from(StageError::UnsupportedKind(PathBuf::from("/dev/null")));

        assert!(matches!(err, DeliveryError::PathNotFound { .. }));
        assert_eq!(
            err.to_string(),
            "failed to find path `/dev/null`: neither a regular file nor a directory"
        );
    }

    #[test]
    fn quota_exceeded_is_recognized() {
        let err = DeliveryError::from(QuotaError::Exceeded {
            month: "2026-10".to_string(),
            used: 10,
            requested: 5,
            limit: 12,
        });

        assert!(err.is_quota_exceeded());
        assert!(!DeliveryError::PoolSaturated(4).is_quota_exceeded());
    }

    #[test]
    fn target_not_found_names_client() {
        assert_eq!(
            RulerError::TargetNotFound("bos".to_string()).to_string(),
            "client (bos) not found"
        );
    }
}
