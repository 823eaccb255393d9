//! Internal Implementation Details
//!
//! This module contains implementation details that are not part of the public API.
//! Types in this module may change without notice between minor versions.
//!
//! # Contents
//!
//! - [`register`]: Register map and typed register views
//! - [`constants`]: Timing defaults and size limits
//! - [`dma`]: Descriptor records and rings
//! - `fmt`: Logging shims over `log`/`defmt`
//!
//! # Stability
//!
//! Only the items re-exported from the crate root are public API.

pub mod constants;
pub mod dma;
pub(crate) mod fmt;
pub mod register;
