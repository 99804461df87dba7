// src/config/mod.rs

//! Run-description parsing and compilation.
//!
//! - [`assemble`] splices `$include` directives into the raw YAML.
//! - [`model`] holds the raw and validated config types plus defaults.
//! - [`compile`] turns the assembled YAML into a runnable [`Runbook`]:
//!   validation, argument substitution, `for-each` replica expansion, tag
//!   inheritance, and tag pruning.
//! - [`cache`] manages the cache root layout and the persisted ETA cache.

pub mod assemble;
pub mod cache;
pub mod compile;
pub mod model;

pub use assemble::assemble_includes;
pub use cache::{CachePaths, EtaCache};
pub use compile::{compile, Runbook};
pub use model::{GlobalOptions, TaskConfig};
