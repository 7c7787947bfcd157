//! Offline stub provider.
//!
//! Needs no credentials and no network: it matches the incoming prompt
//! against the prompts of installed modules and echoes the matching
//! module's bundled example output. Anything unmatched gets a minimal
//! zero-confidence document, so pipelines stay exercisable end to end on a
//! bare machine.

use crate::provider::{LlmResult, TextProvider};
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;

/// Prompt-prefix length used for matching; module prompts diverge well
/// before this.
const MATCH_PREFIX_CHARS: usize = 100;

pub struct StubProvider {
    module_roots: Vec<PathBuf>,
}

impl StubProvider {
    pub fn new(module_roots: Vec<PathBuf>) -> Self {
        Self { module_roots }
    }

    fn find_example_output(&self, prompt: &str) -> Option<String> {
        for root in &self.module_roots {
            let Ok(entries) = std::fs::read_dir(root) else {
                continue;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let dir = entry.path();
                let Ok(module_prompt) = std::fs::read_to_string(dir.join("prompt.txt")) else {
                    continue;
                };
                let prefix: String = module_prompt.chars().take(MATCH_PREFIX_CHARS).collect();
                if prefix.is_empty() || !prompt.contains(&prefix) {
                    continue;
                }
                if let Ok(output) = std::fs::read_to_string(dir.join("examples/output.json")) {
                    debug!("stub matched module at {}", dir.display());
                    return Some(output);
                }
            }
        }
        None
    }
}

fn fallback_document() -> String {
    json!({
        "result": {},
        "rationale": {
            "decisions": [],
            "assumptions": ["stub provider: no matching module example"],
            "open_questions": []
        },
        "confidence": 0.0
    })
    .to_string()
}

#[async_trait::async_trait]
impl TextProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn default_model(&self) -> &str {
        "stub"
    }

    async fn generate(&self, prompt: &str, _model: Option<&str>) -> LlmResult<String> {
        Ok(self
            .find_example_output(prompt)
            .unwrap_or_else(fallback_document))
    }
}
