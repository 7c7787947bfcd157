//! Module resolver — ordered search across the configured store locations.

use crate::loader::{detect_format, is_module_dir, DescriptorFormat};
use cogmod_core::{Location, LocationClass, ResolverConfig};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One entry from `list_all`: the first occurrence of a name across the
/// ordered search paths.
#[derive(Debug, Clone)]
pub struct ModuleSummary {
    pub name: String,
    pub path: PathBuf,
    pub location: LocationClass,
    pub format: DescriptorFormat,
}

pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Search locations in precedence order.
    pub fn search_paths(&self) -> &[Location] {
        &self.config.locations
    }

    /// First path across the ordered locations that exists and holds a
    /// descriptor in any of the three formats.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.config.locations.iter().find_map(|location| {
            let candidate = location.path.join(name);
            is_module_dir(&candidate).then_some(candidate)
        })
    }

    /// Every available module, deduplicated by name: the earlier location
    /// wins and later occurrences are dropped. Entries within one location
    /// are sorted by name for stable output.
    pub fn list_all(&self) -> Vec<ModuleSummary> {
        let mut seen = BTreeSet::new();
        let mut modules = Vec::new();

        for location in &self.config.locations {
            let Ok(entries) = std::fs::read_dir(&location.path) else {
                continue;
            };
            let mut dirs: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect();
            dirs.sort();

            for dir in dirs {
                let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned())
                else {
                    continue;
                };
                if seen.contains(&name) {
                    continue;
                }
                let Some((_, format)) = detect_format(&dir) else {
                    continue;
                };
                seen.insert(name.clone());
                modules.push(ModuleSummary {
                    name,
                    path: dir,
                    location: location.class,
                    format,
                });
            }
        }

        modules
    }
}
