use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known context keys.
pub mod keys {
    /// Absolute URL of the located syllabus PDF.
    pub const PDF_URL: &str = "pdf_url";
    /// Character count of the extracted syllabus text.
    pub const SYLLABUS_CHARS: &str = "syllabus_chars";
    pub const RETRIEVAL_SUMMARY: &str = "retrieval_summary";
    pub const COMPARISON: &str = "comparison";
}

/// Per-run facts accumulated across actors.
///
/// Keys are strings; values are JSON. Actors see the values for their input
/// keys in their system prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandoffContext {
    data: BTreeMap<String, serde_json::Value>,
}

impl HandoffContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Get a value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Set a value.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Set a string value.
    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data
            .insert(key.into(), serde_json::Value::String(value.into()));
    }

    /// Record the facts a successful document tool produced.
    pub fn record_tool_output(&mut self, tool: &str, output: &str) {
        match tool {
            "locate_pdf" => self.set_str(keys::PDF_URL, output.trim()),
            "read_pdf" => self.set(
                keys::SYLLABUS_CHARS,
                serde_json::json!(output.chars().count()),
            ),
            _ => {}
        }
    }

    /// Store an actor's closing text under its output keys.
    ///
    /// A JSON object output fills matching keys individually; any other text
    /// is stored whole under every key. Blank output is ignored.
    pub fn ingest_output(&mut self, output_keys: &[String], output_text: &str) {
        if output_keys.is_empty() || output_text.trim().is_empty() {
            return;
        }

        if let Ok(serde_json::Value::Object(obj)) =
            serde_json::from_str::<serde_json::Value>(output_text)
        {
            for key in output_keys {
                if let Some(val) = obj.get(key) {
                    self.data.insert(key.clone(), val.clone());
                }
            }
            return;
        }

        for key in output_keys {
            self.data.insert(
                key.clone(),
                serde_json::Value::String(output_text.trim().to_string()),
            );
        }
    }

    /// `**key**: value` lines for the given keys that have values.
    pub fn render(&self, keys: &[String]) -> String {
        let mut out = String::new();
        for key in keys {
            if let Some(value) = self.data.get(key) {
                let display = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                out.push_str(&format!("**{}**: {}\n", key, display));
            }
        }
        out
    }

    /// Get the underlying data map.
    pub fn data(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.data
    }
}
