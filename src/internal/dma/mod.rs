//! DMA descriptors and rings
//!
//! # Architecture
//!
//! - [`descriptor::Descriptor`]: 32-byte hardware record with volatile fields
//! - [`descriptor::DescriptorLayout`]: where the control/status bits live
//! - [`ring::Ring`]: one direction of one channel, owning its in-flight buffers
//!
//! Rings are sized at run time and allocated with fallible reservation, so
//! storage failures surface as errors instead of aborts.

pub mod descriptor;
pub mod ring;

pub use descriptor::{Descriptor, DescriptorLayout};
pub use ring::{Completion, Ring};
