use std::fs;
use std::path::Path;
use anyhow::Result;
use regex::Regex;
use tracing::warn;

/// Read a text file, tolerating a UTF-8 BOM and replacing invalid bytes.
pub fn load_text_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;

    // `decode` sniffs and strips the BOM.
    let (cow, _, had_errors) = encoding_rs::UTF_8.decode(&bytes);
    if had_errors {
        warn!("{} is not valid UTF-8, invalid bytes were replaced", path.display());
    }

    Ok(cow.into_owned())
}

/// Replace `${VAR_NAME}` references using `lookup`. Unknown variables are
/// left untouched.
pub fn substitute_env_vars<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let pattern = Regex::new(r"\$\{(\w+)\}")?;
    let replaced = pattern.replace_all(content, |caps: &regex::Captures| {
        lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    Ok(replaced.into_owned())
}

/// Read a configuration file with environment variable substitution.
pub fn read_config_text<F>(path: &Path, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }

    let content = load_text_file(path)?;
    if content.trim().is_empty() {
        anyhow::bail!("Configuration file is empty: {}", path.display());
    }

    substitute_env_vars(&content, lookup)
}
