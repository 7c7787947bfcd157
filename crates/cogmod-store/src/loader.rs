//! Descriptor loader — parses one on-disk module into memory.
//!
//! Three generations of the layout coexist: `module.yaml` (v2), `MODULE.md`
//! (v1), and `module.md` (v0). The format is detected once here, behind a
//! single construction function, and nothing downstream branches on it
//! again. The v1/v0 descriptors carry their metadata as a YAML frontmatter
//! block between the first two `---` delimiters.

use cogmod_core::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Descriptor filenames in probe priority order. The first match wins; the
/// formats are mutually exclusive at the directory level, never merged.
pub const DESCRIPTOR_FILES: &[(&str, DescriptorFormat)] = &[
    ("module.yaml", DescriptorFormat::V2),
    ("MODULE.md", DescriptorFormat::V1),
    ("module.md", DescriptorFormat::V0),
];

pub const INPUT_SCHEMA_FILE: &str = "input.schema.json";
pub const OUTPUT_SCHEMA_FILE: &str = "output.schema.json";
pub const CONSTRAINTS_FILE: &str = "constraints.yaml";
pub const PROMPT_FILE: &str = "prompt.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    V0,
    V1,
    V2,
}

impl std::fmt::Display for DescriptorFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V0 => write!(f, "v0"),
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
        }
    }
}

/// Probe a directory for a descriptor file.
pub fn detect_format(dir: &Path) -> Option<(PathBuf, DescriptorFormat)> {
    DESCRIPTOR_FILES.iter().find_map(|(file, format)| {
        let path = dir.join(file);
        path.is_file().then_some((path, *format))
    })
}

/// A directory is a module if any descriptor generation is present.
pub fn is_module_dir(dir: &Path) -> bool {
    dir.is_dir() && detect_format(dir).is_some()
}

/// Frontmatter/descriptor metadata fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModuleMeta {
    pub name: String,
    pub version: String,
    /// What the module is responsible for.
    pub responsibility: String,
    pub description: Option<String>,
    /// Capabilities explicitly outside the module's responsibility.
    pub excludes: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    pub minimum_viable: Option<f64>,
}

/// Declared operational rules and confidence thresholds. An absent
/// `operational` section means "not declared", which validation treats as a
/// warning, not a failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub operational: BTreeMap<String, bool>,
    pub confidence_thresholds: ConfidenceThresholds,
}

/// One loaded module: the unit of distribution and execution.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub name: String,
    pub path: PathBuf,
    pub format: DescriptorFormat,
    pub meta: ModuleMeta,
    pub input_schema: Value,
    pub output_schema: Value,
    pub constraints: Constraints,
    /// Raw constraints document, kept verbatim for prompt rendering.
    pub constraints_raw: serde_yaml::Value,
    pub prompt: String,
}

impl Descriptor {
    /// Canonical example input, read on demand from `examples/input.json`.
    pub fn example_input(&self) -> Result<Value> {
        self.example("input.json")
    }

    /// Canonical example output, read on demand from `examples/output.json`.
    pub fn example_output(&self) -> Result<Value> {
        self.example("output.json")
    }

    fn example(&self, file: &str) -> Result<Value> {
        let path = self.path.join("examples").join(file);
        let text = read_required(&path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::malformed(format!("examples/{file}"), e.to_string()))
    }

    /// Minimum viable confidence, defaulting to 0.6 when undeclared.
    pub fn min_viable_confidence(&self) -> f64 {
        self.constraints
            .confidence_thresholds
            .minimum_viable
            .unwrap_or(0.6)
    }
}

/// Load the module at `dir`. Every failure names the offending file.
pub fn load_descriptor(dir: &Path) -> Result<Descriptor> {
    let (descriptor_path, format) = detect_format(dir)
        .ok_or_else(|| Error::not_found(format!("module at {}", dir.display())))?;

    let descriptor_file = file_name(&descriptor_path);
    let content = read_required(&descriptor_path)?;

    let meta: ModuleMeta = match format {
        DescriptorFormat::V2 => serde_yaml::from_str(&content)
            .map_err(|e| Error::malformed(descriptor_file.clone(), e.to_string()))?,
        DescriptorFormat::V1 | DescriptorFormat::V0 => {
            let block = frontmatter(&content).ok_or_else(|| {
                Error::malformed(
                    descriptor_file.clone(),
                    "missing or unterminated YAML frontmatter (expected a block \
                     delimited by ---)",
                )
            })?;
            serde_yaml::from_str(block)
                .map_err(|e| Error::malformed(descriptor_file.clone(), e.to_string()))?
        }
    };

    let input_schema = load_json_file(&dir.join(INPUT_SCHEMA_FILE))?;
    let output_schema = load_json_file(&dir.join(OUTPUT_SCHEMA_FILE))?;

    let constraints_path = dir.join(CONSTRAINTS_FILE);
    let constraints_text = read_required(&constraints_path)?;
    let constraints_raw: serde_yaml::Value = serde_yaml::from_str(&constraints_text)
        .map_err(|e| Error::malformed(CONSTRAINTS_FILE, e.to_string()))?;
    let constraints: Constraints = serde_yaml::from_value(constraints_raw.clone())
        .map_err(|e| Error::malformed(CONSTRAINTS_FILE, e.to_string()))?;

    let prompt = read_required(&dir.join(PROMPT_FILE))?;

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| meta.name.clone());

    Ok(Descriptor {
        name,
        path: dir.to_path_buf(),
        format,
        meta,
        input_schema,
        output_schema,
        constraints,
        constraints_raw,
        prompt,
    })
}

/// The metadata block between the first two `---` delimiters, or None when
/// the document does not start with frontmatter or never closes it.
pub fn frontmatter(content: &str) -> Option<&str> {
    let rest = content.strip_prefix("---")?;
    let end = rest.find("---")?;
    Some(&rest[..end])
}

fn load_json_file(path: &Path) -> Result<Value> {
    let text = read_required(path)?;
    serde_json::from_str(&text).map_err(|e| Error::malformed(file_name(path), e.to_string()))
}

fn read_required(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::malformed(file_name(path), format!("cannot read: {e}")))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
