//! PRISM Core - Record and Schema Types
//!
//! Pure data structures shared by every other crate: identities, pattern
//! definitions, field values, the universal node record, its append-only
//! history, error types, and engine configuration.

pub mod common;
pub mod config;
pub mod enums;
pub mod error;
pub mod history;
pub mod identity;
pub mod node;
pub mod schema;
pub mod value;

pub use common::*;
pub use config::*;
pub use enums::*;
pub use error::*;
pub use history::*;
pub use identity::*;
pub use node::*;
pub use schema::*;
pub use value::*;
