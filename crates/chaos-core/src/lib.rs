//! Chaos Core - Foundational types for the chaos engine
//!
//! This crate provides the types that all other chaos crates depend on:
//! - `LayerId`, `AllocationId`, `BufferId` - Stable handles
//! - `LayerRequest` - Lookup of layers by name or tag
//! - Error types and Result alias

mod error;
mod id;

pub use error::{ChaosError, Result};
pub use id::{AllocationId, BufferId, LayerId, LayerRequest};
