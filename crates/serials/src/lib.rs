//! Serial unit lifecycle module.
//!
//! This crate contains the rules for individually tracked units, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage):
//! - the closed [`SerialState`] enumeration and its (permissive) transition rule
//! - serial code normalization and generated-code suffix parsing
//! - batch validation and provisioning plans

pub mod batch;
pub mod code;
pub mod state;
pub mod unit;

pub use batch::{MAX_BATCH, ProvisionPlan, RegisterBatch, internal_duplicates, normalize_codes, validate_count};
pub use code::{SerialCode, format_code, parse_suffix};
pub use state::SerialState;
pub use unit::{RegisterSerial, SerialHistoryEntry, SerialUnit, TransitionSerial};
