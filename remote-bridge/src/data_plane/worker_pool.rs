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

//! Fixed-capacity worker pool with non-blocking admission and draining shutdown.

use crate::observability::events;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, info};

const COMPONENT: &str = "worker_pool";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AdmissionError {
    Saturated,
    Closed,
}

/// Proof of admission. The worker slot is released when this is dropped.
pub(crate) struct WorkerSlot {
    _permit: OwnedSemaphorePermit,
}

pub(crate) struct WorkerPool {
    name: String,
    capacity: u32,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl WorkerPool {
    pub(crate) fn new(name: &str, capacity: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.to_string(),
            capacity,
            permits: Arc::new(Semaphore::new(capacity as usize)),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Workers currently executing.
    pub(crate) fn running(&self) -> usize {
        self.capacity().saturating_sub(self.permits.available_permits())
    }

    /// O(1) admission check. Never waits for a free worker.
    pub(crate) fn try_admit(&self) -> Result<WorkerSlot, AdmissionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AdmissionError::Closed);
        }
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => Ok(WorkerSlot { _permit: permit }),
            Err(TryAcquireError::NoPermits) => Err(AdmissionError::Saturated),
            Err(TryAcquireError::Closed) => Err(AdmissionError::Closed),
        }
    }

    /// Runs `job` on its own task while holding `slot`.
    pub(crate) fn spawn<F>(&self, slot: WorkerSlot, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let _slot = slot;
            job.await;
        });
    }

    /// Stops admission, then waits for every running worker to finish. Idempotent.
    pub(crate) async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(
            event = events::POOL_DRAIN_START,
            component = COMPONENT,
            pool = self.name.as_str(),
            running = self.running(),
            "draining worker pool"
        );
        // Every running worker holds one permit until it completes.
        if let Ok(all) = self.permits.acquire_many(self.capacity).await {
            all.forget();
        }
        self.permits.close();
        info!(
            event = events::POOL_DRAIN_OK,
            component = COMPONENT,
            pool = self.name.as_str(),
            "worker pool drained"
        );
    }
}

/// Polls `job` to completion, turning a panic into its message.
pub(crate) async fn catch_panic<F: Future>(pool: &str, job: F) -> Result<F::Output, String> {
    AssertUnwindSafe(job).catch_unwind().await.map_err(|panic| {
        let reason = panic_message(panic.as_ref());
        debug!(
            event = events::POOL_TASK_PANICKED,
            component = COMPONENT,
            pool,
            reason = reason.as_str(),
            "worker task panicked"
        );
        reason
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
