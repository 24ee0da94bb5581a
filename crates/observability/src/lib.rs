//! Tracing/logging setup shared by every binary.

pub mod tracing;

pub use crate::tracing::{LogFormat, UnknownLogFormat, init};
