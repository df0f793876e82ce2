//! Canonical event names and structured field helpers shared by every layer.

pub mod events;
pub mod fields;
