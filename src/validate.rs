//! Structural validation of an on-disk module, independent of any run.
//!
//! Errors make a module unusable; warnings flag declarations a
//! well-formed module should carry but can live without.

use crate::schema;
use cogmod_store::{
    detect_format, load_descriptor, Descriptor, CONSTRAINTS_FILE, INPUT_SCHEMA_FILE,
    OUTPUT_SCHEMA_FILE, PROMPT_FILE,
};
use serde_json::{json, Value};
use std::path::Path;

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

const REQUIRED_FILES: &[&str] = &[
    INPUT_SCHEMA_FILE,
    OUTPUT_SCHEMA_FILE,
    CONSTRAINTS_FILE,
    PROMPT_FILE,
];

/// Validate the module at `dir`. Accumulates every problem it can find
/// rather than stopping at the first.
pub fn validate_module(dir: &Path) -> ValidationReport {
    let mut report = ValidationReport::default();

    if detect_format(dir).is_none() {
        report.errors.push(
            "no descriptor file (expected module.yaml, MODULE.md, or module.md)".to_string(),
        );
        return report;
    }

    for file in REQUIRED_FILES {
        if !dir.join(file).is_file() {
            report.errors.push(format!("missing required file: {file}"));
        }
    }
    if !report.errors.is_empty() {
        return report;
    }

    let descriptor = match load_descriptor(dir) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    };

    check_metadata(&descriptor, &mut report);
    check_schemas(&descriptor, &mut report);
    check_constraints(&descriptor, &mut report);
    check_examples(&descriptor, &mut report);

    report
}

fn check_metadata(descriptor: &Descriptor, report: &mut ValidationReport) {
    let meta = &descriptor.meta;
    for (field, value) in [
        ("name", &meta.name),
        ("version", &meta.version),
        ("responsibility", &meta.responsibility),
    ] {
        if value.trim().is_empty() {
            report.errors.push(format!("descriptor field '{field}' is missing or empty"));
        }
    }
    if meta.excludes.is_empty() {
        report
            .warnings
            .push("no 'excludes' declared; responsibility boundary is implicit".to_string());
    }
    if descriptor.prompt.trim().is_empty() {
        report.errors.push("prompt.txt is empty".to_string());
    } else if descriptor.prompt.trim().len() < 100 {
        report.warnings.push(format!(
            "prompt.txt is very short ({} chars)",
            descriptor.prompt.trim().len()
        ));
    }
}

fn check_schemas(descriptor: &Descriptor, report: &mut ValidationReport) {
    for (label, schema) in [
        ("input.schema.json", &descriptor.input_schema),
        ("output.schema.json", &descriptor.output_schema),
    ] {
        // Compile against a trivially valid instance; only compile failures
        // surface as root violations here.
        for violation in schema::violations(&json!({}), schema) {
            if violation.message.starts_with("schema error") {
                report.errors.push(format!("{label}: {violation}"));
            }
        }
        if !schema.is_object() {
            report.warnings.push(format!("{label}: top level is not an object schema"));
        }
        if schema.get("additionalProperties") != Some(&json!(false)) {
            report.warnings.push(format!(
                "{label}: additionalProperties is not false at the top level"
            ));
        }
    }

    let required: Vec<&str> = descriptor
        .output_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    for field in ["confidence", "rationale"] {
        if !required.contains(&field) {
            report.warnings.push(format!(
                "output.schema.json does not require '{field}'"
            ));
        }
    }
}

fn check_constraints(descriptor: &Descriptor, report: &mut ValidationReport) {
    if descriptor.constraints.operational.is_empty() {
        report
            .warnings
            .push("constraints.yaml declares no operational constraints".to_string());
    }
    match descriptor.constraints.confidence_thresholds.minimum_viable {
        None => report.warnings.push(
            "no confidence_thresholds.minimum_viable declared (default 0.6 applies)".to_string(),
        ),
        Some(t) if !(0.0..=1.0).contains(&t) => {
            report
                .errors
                .push(format!("minimum_viable confidence {t} is outside 0.0..=1.0"));
        }
        Some(_) => {}
    }
}

fn check_examples(descriptor: &Descriptor, report: &mut ValidationReport) {
    check_example(
        report,
        "examples/input.json",
        descriptor.example_input(),
        &descriptor.input_schema,
    );
    check_example(
        report,
        "examples/output.json",
        descriptor.example_output(),
        &descriptor.output_schema,
    );
}

fn check_example(
    report: &mut ValidationReport,
    label: &str,
    example: cogmod_core::Result<Value>,
    schema: &Value,
) {
    match example {
        Ok(value) => {
            for violation in schema::violations(&value, schema) {
                report.errors.push(format!("{label}: {violation}"));
            }
        }
        Err(_) => report
            .errors
            .push(format!("{label} is missing or unreadable")),
    }
}
