//! Canonical structured event names used across `remote-bridge`.

// Ingress events emitted by rule listeners.
pub const INGRESS_RECEIVE: &str = "ingress_receive";
pub const INGRESS_DECODE_FAILED: &str = "ingress_decode_failed";
pub const INGRESS_DUPLICATE_DROPPED: &str = "ingress_duplicate_dropped";
pub const INGRESS_SOURCE_ERROR: &str = "ingress_source_error";

// Completion and acknowledgment events.
pub const DELIVERY_OK: &str = "delivery_ok";
pub const DELIVERY_FAILED: &str = "delivery_failed";
pub const ACK_SENT: &str = "ack_sent";
pub const ACK_FAILED: &str = "ack_failed";

// Worker pool events.
pub const POOL_REJECT_SATURATED: &str = "pool_reject_saturated";
pub const POOL_REJECT_CLOSED: &str = "pool_reject_closed";
pub const POOL_TASK_PANICKED: &str = "pool_task_panicked";
pub const POOL_DRAIN_START: &str = "pool_drain_start";
pub const POOL_DRAIN_OK: &str = "pool_drain_ok";

// Storage pipeline events.
pub const UPLOAD_PATH_REJECTED: &str = "upload_path_rejected";
pub const UPLOAD_PATH_NOT_FOUND: &str = "upload_path_not_found";
pub const UPLOAD_SKIPPED_UNCHANGED: &str = "upload_skipped_unchanged";
pub const UPLOAD_OK: &str = "upload_ok";
pub const UPLOAD_FAILED: &str = "upload_failed";
pub const QUOTA_EXCEEDED: &str = "quota_exceeded";
pub const QUOTA_PERSIST_FAILED: &str = "quota_persist_failed";
pub const STAGING_ARCHIVE_OK: &str = "staging_archive_ok";
pub const STAGING_CLEANUP_FAILED: &str = "staging_cleanup_failed";

// Queue sink events.
pub const PRODUCE_OK: &str = "produce_ok";
pub const PRODUCE_FAILED: &str = "produce_failed";

// Lifecycle events.
pub const RULE_START: &str = "rule_start";
pub const RULE_SUBSCRIBE_FAILED: &str = "rule_subscribe_failed";
pub const RULE_CLOSE_OK: &str = "rule_close_ok";
pub const RULE_CLOSE_FAILED: &str = "rule_close_failed";
pub const SINK_CREATE_OK: &str = "sink_create_ok";
pub const SINK_CLOSE_START: &str = "sink_close_start";
pub const SINK_CLOSE_OK: &str = "sink_close_ok";
pub const STATS_REPORT: &str = "stats_report";
