//! PRISM Rules - Schema Registry & Rule-Set Compiler
//!
//! Loads pattern definitions and translation rules, validates them, and
//! freezes them into an immutable `Registry`.
//!
//! ```text
//! Rule document (YAML / JSON / TOML)
//!     ↓
//! RuleDocument (serde)
//!     ↓
//! RegistryBuilder (pattern validation, bridges, tables)
//!     ↓
//! RuleSetCompiler (references, arity, constants, compute cycles)
//!     ↓
//! Registry (immutable, Arc<CompiledRuleSet> per pair)
//! ```

pub mod compiler;
pub mod document;
pub mod registry;
pub mod transform;

pub use compiler::*;
pub use document::*;
pub use registry::*;
pub use transform::*;
