//! Run artifacts. Every fetch, prediction list, and raw model reply can be
//! written under the output directory with a timestamped name so a bad round
//! can be replayed offline. Callers split artifacts into `forms/` (extracted
//! rows), `predictions/`, and `raw/` (fetched HTML, model replies).

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn stamped(stem: &str, ext: &str) -> String {
    format!("{}_{}.{}", stem, Utc::now().format("%Y%m%dT%H%M%S"), ext)
}

/// Serialize `value` as pretty JSON under `dir`, creating the directory on
/// first use. Returns the written path.
pub fn write_json<T: Serialize>(dir: &Path, stem: &str, value: &T) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let path = dir.join(stamped(stem, "json"));
    let body = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    fs::write(&path, body)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(path)
}

/// Write raw text (fetched HTML, mostly) under `dir`.
pub fn write_text(dir: &Path, stem: &str, ext: &str, body: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let path = dir.join(stamped(stem, ext));
    fs::write(&path, body)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(path)
}

/// Redact a credential down to its first two characters for log lines.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(2).collect();
    if secret.chars().count() <= 2 {
        "***".to_string()
    } else {
        format!("{visible}***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_keep_at_most_two_leading_characters() {
        assert_eq!(mask_secret("geheimnis"), "ge***");
        assert_eq!(mask_secret("ab"), "***");
        assert_eq!(mask_secret(""), "***");
    }

    #[test]
    fn json_artifacts_land_in_the_requested_directory() {
        let dir = std::env::temp_dir().join("tippbot-output-test");
        let _ = std::fs::remove_dir_all(&dir);
        let path = write_json(&dir, "predictions", &serde_json::json!([1, 2])).unwrap();
        assert!(path.starts_with(&dir));
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains('1'));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
