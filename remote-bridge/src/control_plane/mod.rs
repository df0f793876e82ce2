//! Control-plane layer.
//!
//! Owns construction and teardown: the registry of named sink clients built from
//! configuration, and the rulers that bind one source subscription to one sink.

pub(crate) mod ruler;
pub(crate) mod sink_registry;
