//! Execution pipeline: resolve, load, gate input, build the prompt, invoke
//! the provider once, parse, gate output, score confidence.
//!
//! Exactly one provider call per run. A run either produces a schema-valid
//! output document or an error naming the stage that rejected it; low
//! confidence is a flag on the report, never a failure.

use crate::schema;
use cogmod_core::{Error, Result};
use cogmod_llm::TextProvider;
use cogmod_store::{is_module_dir, load_descriptor, Descriptor, Resolver};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const INSTRUCTION_SUFFIX: &str = "## Instructions\n\n\
Respond with a single JSON document that matches the output schema. Include \
`result`, `rationale` (with `decisions`, `assumptions`, and `open_questions`), \
and `confidence` between 0.0 and 1.0. No text outside the JSON.";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub validate_input: bool,
    pub validate_output: bool,
    pub model: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            validate_input: true,
            validate_output: true,
            model: None,
        }
    }
}

/// Outcome of one run. `output` already passed the output gate (unless the
/// caller disabled it).
#[derive(Debug, Clone)]
pub struct RunReport {
    pub output: Value,
    /// Self-reported confidence, when the output carries one.
    pub confidence: Option<f64>,
    /// True when a reported `confidence` fell below the module's minimum
    /// viable threshold. Advisory: the output is still returned. An output
    /// without a confidence field is never flagged.
    pub low_confidence: bool,
    pub threshold: f64,
}

/// A module reference is a filesystem path when one exists at that
/// location, otherwise a name looked up across the search paths.
pub fn resolve_module(resolver: &Resolver, module_ref: &str) -> Result<PathBuf> {
    let as_path = Path::new(module_ref);
    if is_module_dir(as_path) {
        return Ok(as_path.to_path_buf());
    }
    resolver.find(module_ref).ok_or_else(|| {
        let searched = resolver
            .search_paths()
            .iter()
            .map(|l| l.path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Error::not_found(format!("module '{module_ref}' (searched: {searched})"))
    })
}

/// Deterministic prompt assembly: module prompt, declared constraints as
/// YAML, the input as pretty JSON in a fenced block, then the fixed
/// instruction suffix.
pub fn build_prompt(descriptor: &Descriptor, input: &Value) -> Result<String> {
    let constraints = serde_yaml::to_string(&descriptor.constraints_raw)?;
    let input_json = serde_json::to_string_pretty(input)?;
    Ok(format!(
        "{}\n\n## Constraints\n{}\n## Input\n```json\n{}\n```\n\n{}",
        descriptor.prompt.trim_end(),
        constraints,
        input_json,
        INSTRUCTION_SUFFIX
    ))
}

/// Parse the raw model text as JSON, tolerating a single surrounding
/// markdown code fence. Failures carry a bounded preview of the raw text.
pub fn parse_response(raw: &str) -> Result<Value> {
    let body = strip_fences(raw);
    serde_json::from_str(body).map_err(|e| Error::response_parse(e.to_string(), raw))
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the rest of the opening fence line (the info string, if any).
    let Some(newline) = rest.find('\n') else {
        return trimmed;
    };
    let body = &rest[newline + 1..];
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Run one loaded module over one input document.
pub async fn run_module(
    descriptor: &Descriptor,
    input: &Value,
    provider: &dyn TextProvider,
    options: &RunOptions,
) -> Result<RunReport> {
    if options.validate_input {
        schema::ensure_valid(input, &descriptor.input_schema, "input")?;
    }

    let prompt = build_prompt(descriptor, input)?;
    debug!(
        module = %descriptor.name,
        provider = provider.name(),
        prompt_len = prompt.len(),
        "invoking provider"
    );

    let raw = provider
        .generate(&prompt, options.model.as_deref())
        .await
        .map_err(|e| Error::Provider(e.to_string()))?;

    let output = parse_response(&raw)?;

    if options.validate_output {
        schema::ensure_valid(&output, &descriptor.output_schema, "output")?;
    }

    let confidence = output.get("confidence").and_then(Value::as_f64);
    let threshold = descriptor.min_viable_confidence();
    let low_confidence = confidence.is_some_and(|c| c < threshold);
    if low_confidence {
        warn!(
            module = %descriptor.name,
            confidence = confidence.unwrap_or_default(),
            threshold,
            "confidence below the module's minimum viable threshold"
        );
    }

    Ok(RunReport {
        output,
        confidence,
        low_confidence,
        threshold,
    })
}

/// Resolve and load in one step, for callers that start from a reference.
pub fn load_module(resolver: &Resolver, module_ref: &str) -> Result<Descriptor> {
    let dir = resolve_module(resolver, module_ref)?;
    load_descriptor(&dir)
}
