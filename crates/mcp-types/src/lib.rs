//! # LucentMCP Types
//!
//! Value and identifier primitives shared across the LucentMCP workspace:
//! a dynamically-typed JSON [`Value`] and the [`RequestId`]/[`ProgressToken`]
//! sum types used by the message and peer layers.

mod id;
mod value;

pub use id::{ProgressToken, RequestId, RequestIdGenerator};
pub use value::Value;
