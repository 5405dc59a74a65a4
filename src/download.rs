//! Resolution of model endpoints to local files.
//!
//! HTTP(S) downloads are cached under `~/.cache/nix-tts/` unless another
//! cache directory is configured.

use anyhow::{Context, Result};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Create the default cache directory if it doesn't exist.
pub fn default_cache_directory() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
    let cache_dir = Path::new(&home).join(".cache").join("nix-tts");
    fs::create_dir_all(&cache_dir)
        .with_context(|| format!("Failed to create cache dir {}", cache_dir.display()))?;
    Ok(cache_dir)
}

/// Download `location` if it is an `http(s)://` URL, or return the local path.
pub fn resolve_model(location: &str, cache_dir: Option<&Path>) -> Result<PathBuf> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let cache_dir = match cache_dir {
            Some(dir) => {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create cache dir {}", dir.display()))?;
                dir.to_path_buf()
            }
            None => default_cache_directory()?,
        };
        return download_http(location, &cache_dir);
    }

    let local = PathBuf::from(location);
    if !local.exists() {
        anyhow::bail!("Failed to open model {location}: no such file");
    }
    Ok(local)
}

fn download_http(url: &str, cache_dir: &Path) -> Result<PathBuf> {
    let cache_path = cache_dir.join(url_to_cache_filename(url));
    if cache_path.exists() {
        tracing::debug!(url, path = %cache_path.display(), "using cached model");
        return Ok(cache_path);
    }

    tracing::info!(url, "downloading model");
    let response = ureq::get(url)
        .call()
        .map_err(|e| anyhow::anyhow!("Failed to download {url}: {e}"))?;

    let mut data = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut data)
        .with_context(|| format!("Failed to download {url}: incomplete body"))?;

    write_cache_file(&cache_path, &data)?;

    tracing::info!(path = %cache_path.display(), bytes = data.len(), "downloaded model");
    Ok(cache_path)
}

/// Write through a uniquely named temp file in the same directory, then
/// rename, so a partial or concurrent download never looks cached.
fn write_cache_file(cache_path: &Path, data: &[u8]) -> Result<()> {
    let dir = cache_path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(cache_path)
        .with_context(|| format!("Failed to write {}", cache_path.display()))?;
    Ok(())
}

/// Convert a URL to a safe cache filename.
fn url_to_cache_filename(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    stripped
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' => c,
            _ => '_',
        })
        .collect()
}
