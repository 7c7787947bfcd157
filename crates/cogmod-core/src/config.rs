//! Process configuration — environment is read once here, at startup.
//!
//! Everything downstream (resolver, installer, pipeline) receives explicit
//! config values instead of reading the environment ad hoc.

use std::path::PathBuf;

/// Project-local store, relative to the working directory.
pub const PROJECT_STORE: &str = "cognitive/modules";

/// System-wide store.
pub const SYSTEM_STORE: &str = "/usr/local/share/cognitive/modules";

pub const DEFAULT_REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/cognitive-modules/registry/main/registry.json";

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Closed set of text-generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Ollama,
    /// Offline default: echoes a bundled example, needs no credentials.
    Stub,
}

impl ProviderKind {
    /// Unknown selectors fall back to the stub so a bare environment stays
    /// runnable.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Self::Anthropic,
            "openai" => Self::OpenAi,
            "ollama" => Self::Ollama,
            _ => Self::Stub,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
            Self::Stub => write!(f, "stub"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    /// Model override applied to every run unless the CLI overrides again.
    pub model: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Base URL for any OpenAI-compatible endpoint.
    pub openai_base_url: Option<String>,
    pub ollama_host: String,
    /// Extra module search paths, highest priority first.
    pub extra_module_paths: Vec<PathBuf>,
    pub registry_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        let extra_module_paths = std::env::var("COGNITIVE_MODULES_PATH")
            .ok()
            .map(|raw| {
                raw.split(':')
                    .filter(|p| !p.is_empty())
                    .map(expand_tilde)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            provider: ProviderKind::parse(
                &std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "stub".into()),
            ),
            model: std::env::var("LLM_MODEL").ok(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_base_url: std::env::var("OPENAI_BASE_URL").ok(),
            ollama_host: std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.into()),
            extra_module_paths,
            registry_url: std::env::var("COGNITIVE_REGISTRY_URL")
                .unwrap_or_else(|_| DEFAULT_REGISTRY_URL.into()),
        }
    }

    pub fn resolver(&self) -> ResolverConfig {
        ResolverConfig::with_injected(self.extra_module_paths.clone())
    }
}

/// Which class of store a location belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationClass {
    /// Injected via configuration; always ahead of the fixed stores.
    Injected,
    /// Project-local `./cognitive/modules`.
    Local,
    /// User-global `~/.cognitive/modules` — the install target.
    Global,
    /// System-wide store.
    System,
}

impl std::fmt::Display for LocationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Injected => write!(f, "injected"),
            Self::Local => write!(f, "local"),
            Self::Global => write!(f, "global"),
            Self::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Location {
    pub path: PathBuf,
    pub class: LocationClass,
}

/// Ordered module search locations, built once and threaded through the
/// resolver, installer, and pipeline.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub locations: Vec<Location>,
}

impl ResolverConfig {
    /// The fixed precedence: injected paths (in the order given), then
    /// project-local, user-global, system-wide.
    pub fn with_injected(injected: Vec<PathBuf>) -> Self {
        let mut locations: Vec<Location> = injected
            .into_iter()
            .map(|path| Location { path, class: LocationClass::Injected })
            .collect();
        locations.push(Location {
            path: PathBuf::from(PROJECT_STORE),
            class: LocationClass::Local,
        });
        locations.push(Location {
            path: user_modules_dir(),
            class: LocationClass::Global,
        });
        locations.push(Location {
            path: PathBuf::from(SYSTEM_STORE),
            class: LocationClass::System,
        });
        Self { locations }
    }

    pub fn standard() -> Self {
        Self::with_injected(Vec::new())
    }

    /// Location paths in precedence order, for callers that only need paths.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.locations.iter().map(|l| l.path.clone()).collect()
    }
}

/// `~/.cognitive` — manifest, registry cache, and the user-global store.
pub fn user_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".cognitive")
}

pub fn user_modules_dir() -> PathBuf {
    user_dir().join("modules")
}

pub fn manifest_path() -> PathBuf {
    user_dir().join("installed.json")
}

pub fn registry_cache_path() -> PathBuf {
    user_dir().join("registry-cache.json")
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
