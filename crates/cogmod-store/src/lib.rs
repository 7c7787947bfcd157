//! On-disk module store: descriptor loading, ordered resolution, the
//! multi-source installer, the installed-module manifest, and the registry
//! index client.

pub mod installer;
pub mod loader;
pub mod manifest;
pub mod registry_client;
pub mod resolver;

pub use installer::Installer;
pub use loader::{
    detect_format, frontmatter, is_module_dir, load_descriptor, Constraints, Descriptor,
    DescriptorFormat, ModuleMeta, CONSTRAINTS_FILE, DESCRIPTOR_FILES, INPUT_SCHEMA_FILE,
    OUTPUT_SCHEMA_FILE, PROMPT_FILE,
};
pub use manifest::{read_manifest, ManifestEntry};
pub use registry_client::{RegistryClient, RegistryEntry, RegistryIndex, SearchHit};
pub use resolver::{ModuleSummary, Resolver};
