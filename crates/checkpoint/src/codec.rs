//! Step number encoding in checkpoint file names

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use runtime_core::{Error, Result, Step};

/// File name stem shared by every file belonging to one checkpoint
pub const CHECKPOINT_STEM: &str = "model.ckpt-";

/// Suffix of the file whose presence marks a checkpoint as complete
pub const INDEX_SUFFIX: &str = ".index";

// Digits must end the name or be followed by a separator such as `.index`,
// `.data-00000-of-00001` or `_temp_<id>`.
static STEP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"model\.ckpt-(\d+)(?:[^0-9A-Za-z]|$)").expect("step pattern is valid")
});

/// Checkpoint prefix for `step`, relative to the model directory
pub fn format_step(step: Step) -> String {
    format!("{}{}", CHECKPOINT_STEM, step)
}

/// Index file name of checkpoint `step`, relative to the model directory
pub fn index_file(step: Step) -> String {
    format!("{}{}", format_step(step), INDEX_SUFFIX)
}

/// Full checkpoint prefix path `<model_dir>/model.ckpt-<step>`
pub fn checkpoint_path(model_dir: &Path, step: Step) -> String {
    model_dir
        .join(format_step(step))
        .to_string_lossy()
        .to_string()
}

/// Extract the step embedded in a checkpoint path or file name
///
/// Sharded and auxiliary suffixes are ignored. If the stem occurs several
/// times, the last occurrence wins.
pub fn parse_step(identifier: &str) -> Result<Step> {
    let malformed = || Error::MalformedIdentifier {
        identifier: identifier.to_string(),
    };

    let captures = STEP_PATTERN
        .captures_iter(identifier)
        .last()
        .ok_or_else(malformed)?;

    captures[1].parse::<Step>().map_err(|_| malformed())
}
