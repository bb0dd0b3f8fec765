//! Resolve the ordered list of harness logs to read.
//!
//! Explicit files win. Otherwise either the numbered range
//! `{prefix}{first..=last}.{extension}` is built, or the directory is searched
//! for `{prefix}<N>.{extension}` and the hits are ordered by `N`.

use crate::config::InputConfig;
use regex::Regex;
use std::path::{Path, PathBuf};

pub fn resolve_inputs(input: &InputConfig) -> Result<Vec<PathBuf>, SourceError> {
    if !input.files.is_empty() {
        return Ok(input.files.clone());
    }
    if input.discover {
        return discover(input);
    }
    Ok(numbered_range(input))
}

fn numbered_range(input: &InputConfig) -> Vec<PathBuf> {
    (input.first..=input.last)
        .map(|i| {
            input
                .dir
                .join(format!("{}{}.{}", input.prefix, i, input.extension))
        })
        .collect()
}

fn discover(input: &InputConfig) -> Result<Vec<PathBuf>, SourceError> {
    let dir = glob::Pattern::escape(&input.dir.to_string_lossy());
    let pattern = Path::new(&dir).join(format!(
        "{}*.{}",
        glob::Pattern::escape(&input.prefix),
        glob::Pattern::escape(&input.extension)
    ));
    let name_re = Regex::new(&format!(
        r"^{}(\d+)\.{}$",
        regex::escape(&input.prefix),
        regex::escape(&input.extension)
    ))
    .map_err(SourceError::Regex)?;

    let mut found: Vec<(u64, PathBuf)> = Vec::new();
    for entry in glob::glob(&pattern.to_string_lossy()).map_err(SourceError::Pattern)? {
        let path = entry.map_err(SourceError::Glob)?;
        let number = match path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| name_re.captures(n))
            .and_then(|caps| caps[1].parse().ok())
        {
            Some(n) => n,
            None => {
                tracing::debug!(file = %path.display(), "ignoring non-numbered file");
                continue;
            }
        };
        found.push((number, path));
    }

    found.sort_by_key(|(n, _)| *n);
    tracing::debug!(count = found.len(), dir = %input.dir.display(), "discovered log files");
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

#[derive(Debug)]
pub enum SourceError {
    Pattern(glob::PatternError),
    Glob(glob::GlobError),
    Regex(regex::Error),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Pattern(e) => write!(f, "invalid discovery pattern: {e}"),
            SourceError::Glob(e) => write!(f, "cannot list log files: {e}"),
            SourceError::Regex(e) => write!(f, "invalid file name pattern: {e}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Pattern(e) => Some(e),
            SourceError::Glob(e) => Some(e),
            SourceError::Regex(e) => Some(e),
        }
    }
}
