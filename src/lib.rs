//! Cognitive modules: packaged, schema-gated units of LLM work.
//!
//! A module is a directory carrying a descriptor, input/output JSON
//! Schemas, declared constraints, a prompt, and canonical examples. This
//! crate ties the store, the providers, and the schema engine into one
//! execution pipeline.

pub mod install;
pub mod runner;
pub mod schema;
pub mod validate;

pub use install::{install_validated, InstallOutcome};
pub use runner::{
    build_prompt, load_module, parse_response, resolve_module, run_module, RunOptions, RunReport,
};
pub use schema::{ensure_valid, violations};
pub use validate::{validate_module, ValidationReport};
