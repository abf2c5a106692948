//! PRISM Engine - Pattern Translation
//!
//! Translates nodes between registered patterns:
//!
//! ```text
//! Node (source view) + Registry
//!     ↓
//! Resolver (direct/common → compute → auto-generate)
//!     ↓
//! Scorer (preserved / mapped / auto / empty weights)
//!     ↓
//! Executor (write pattern data, switch view, append history)
//!     ↓
//! CompatibilityMatrix (observed scores refine tiers)
//! ```
//!
//! All operations are synchronous. The engine never owns nodes; callers
//! keep one writer per node.

pub mod compatibility;
pub mod engine;
pub mod resolver;
pub mod scorer;
pub mod tree;

pub use compatibility::*;
pub use engine::{Engine, TranslateOptions, TranslationResult};
pub use resolver::*;
pub use scorer::*;
pub use tree::*;
