//! The `checkpoint` state file written next to checkpoints
//!
//! The file is a small text protobuf:
//!
//! ```text
//! model_checkpoint_path: "model.ckpt-2000"
//! all_model_checkpoint_paths: "model.ckpt-1000"
//! all_model_checkpoint_paths: "model.ckpt-2000"
//! ```

use std::sync::LazyLock;

use regex::Regex;
use runtime_core::{Error, Result};
use tracing::debug;

/// Name of the manifest file inside a model directory
pub const MANIFEST_FILE: &str = "checkpoint";

static ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*([A-Za-z_]+)\s*:\s*"((?:[^"\\]|\\.)*)"\s*$"#)
        .expect("manifest entry pattern is valid")
});

/// Parsed checkpoint manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointState {
    /// Most recently written checkpoint
    pub model_checkpoint_path: String,

    /// Every checkpoint still retained, oldest first
    pub all_model_checkpoint_paths: Vec<String>,
}

impl CheckpointState {
    pub fn new(model_checkpoint_path: impl Into<String>) -> Self {
        let latest = model_checkpoint_path.into();
        Self {
            all_model_checkpoint_paths: vec![latest.clone()],
            model_checkpoint_path: latest,
        }
    }

    /// Parse the manifest text
    pub fn parse(text: &str) -> Result<Self> {
        let mut latest = None;
        let mut all = Vec::new();

        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let Some(captures) = ENTRY_PATTERN.captures(line) else {
                debug!(line = %line, "Skipping unrecognised manifest line");
                continue;
            };
            let value = unescape(&captures[2]);
            match &captures[1] {
                "model_checkpoint_path" => latest = Some(value),
                "all_model_checkpoint_paths" => all.push(value),
                _ => {}
            }
        }

        let model_checkpoint_path = latest.ok_or_else(|| Error::MalformedIdentifier {
            identifier: format!("{} (no model_checkpoint_path entry)", MANIFEST_FILE),
        })?;

        Ok(Self {
            model_checkpoint_path,
            all_model_checkpoint_paths: all,
        })
    }

    /// Render the manifest text
    pub fn render(&self) -> String {
        let mut out = format!(
            "model_checkpoint_path: \"{}\"\n",
            escape(&self.model_checkpoint_path)
        );
        for path in &self.all_model_checkpoint_paths {
            out.push_str(&format!("all_model_checkpoint_paths: \"{}\"\n", escape(path)));
        }
        out
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
