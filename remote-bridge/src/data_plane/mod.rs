//! Data-plane layer.
//!
//! Owns the per-message path: rule listeners decode and deduplicate deliveries,
//! sink clients admit them into a bounded worker pool, and workers run the
//! storage or queue pipeline before reporting back to the rule's completion
//! handler.

pub(crate) mod file_stats;
pub(crate) mod in_flight;
pub(crate) mod ingress_listener;
pub(crate) mod queue_client;
pub(crate) mod sink_client;
pub(crate) mod storage_client;
pub(crate) mod worker_pool;
