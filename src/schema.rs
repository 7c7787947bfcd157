//! Schema gating — every boundary document is checked by a real JSON
//! Schema engine, never by ad-hoc field peeking.

use cogmod_core::{Error, Result, Violation};
use jsonschema::JSONSchema;
use serde_json::Value;

/// All violations for `instance` against `schema`, in engine order. A
/// schema that itself fails to compile yields a single root violation
/// naming the compile error.
pub fn violations(instance: &Value, schema: &Value) -> Vec<Violation> {
    let compiled = match JSONSchema::compile(schema) {
        Ok(compiled) => compiled,
        Err(e) => {
            return vec![Violation {
                path: String::new(),
                message: format!("schema error: {e}"),
            }]
        }
    };
    // Collected before returning: the error iterator borrows `compiled`.
    let found = match compiled.validate(instance) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| Violation {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect(),
    };
    found
}

/// Gate an instance, reporting every violation at once under `label`
/// ("input" or "output").
pub fn ensure_valid(instance: &Value, schema: &Value, label: &str) -> Result<()> {
    let found = violations(instance, schema);
    if found.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaViolation {
            label: label.to_string(),
            violations: found,
        })
    }
}
