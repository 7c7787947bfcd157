//! Cogmod Core - error taxonomy and configuration

pub mod config;
pub mod error;

pub use config::{
    expand_tilde, manifest_path, registry_cache_path, user_dir, user_modules_dir,
    Config, Location, LocationClass, ProviderKind, ResolverConfig, DEFAULT_OLLAMA_HOST,
    DEFAULT_REGISTRY_URL, PROJECT_STORE, SYSTEM_STORE,
};
pub use error::{Error, Result, Violation};
