use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;

/// Pick the database connection string: an explicit value (flag or `DATABASE_URL`)
/// wins, otherwise the trimmed content of the secret file.
pub fn resolve_database_url(explicit: Option<&str>, secret_file: &Path) -> Result<String> {
    if let Some(url) = explicit.map(str::trim).filter(|u| !u.is_empty()) {
        return Ok(url.to_string());
    }
    let raw = fs::read_to_string(secret_file)
        .with_context(|| format!("failed to read database url from {:?}", secret_file))?;
    let url = raw.trim();
    if url.is_empty() {
        bail!("database url file {:?} is empty", secret_file);
    }
    Ok(url.to_string())
}
