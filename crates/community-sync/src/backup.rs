//! Backup file of an account's subscriptions
//!
//! The document is a JSON object mapping a site identity to the sorted list of
//! community actor URLs it follows:
//!
//! ```json
//! { "https://lemmy.world": ["https://lemmy.ml/c/rust", "https://beehaw.org/c/technology"] }
//! ```
//!
//! Reading flattens every key into one set; the site is informational only.
//! Entries that are not strings, and keys whose value is not a list, are
//! skipped with a warning rather than failing the whole import.
//! Writes use temp file + rename so a crash never leaves a truncated backup.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use lemmy_client::SiteIdentity;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Write `communities` as the backup document for `site`.
pub async fn write(site: &SiteIdentity, communities: &HashSet<String>, path: &Path) -> Result<()> {
    let mut sorted: Vec<&String> = communities.iter().collect();
    sorted.sort();

    let mut document = BTreeMap::new();
    document.insert(site.as_str(), sorted);

    let json = serde_json::to_string_pretty(&document).map_err(|e| Error::BackupFormat {
        path: path.to_path_buf(),
        message: format!("serializing backup: {e}"),
    })?;

    let io_err = |message: String| Error::BackupIo {
        path: path.to_path_buf(),
        message,
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| io_err("backup path has no file name".into()))?;
    let tmp_path = path.with_file_name(format!(
        ".{}.tmp.{}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| io_err(format!("writing temp backup file: {e}")))?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_err(format!("renaming temp backup file: {e}")));
    }

    info!(path = %path.display(), site = %site, communities = communities.len(), "wrote backup");
    Ok(())
}

/// Read a backup document and flatten all listed communities into one set.
///
/// A missing file, malformed JSON or a top-level value that is not an object
/// is an error, never an empty set, so a broken import cannot pass for
/// "nothing to migrate".
pub async fn read(path: &Path) -> Result<HashSet<String>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::BackupIo {
            path: path.to_path_buf(),
            message: format!("reading backup file: {e}"),
        })?;

    let format_err = |message: String| Error::BackupFormat {
        path: path.to_path_buf(),
        message,
    };

    let document = match serde_json::from_str(&contents).map_err(|e| format_err(e.to_string()))? {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(format_err(format!(
                "expected an object of site -> communities, found {}",
                json_kind(&other)
            )));
        }
    };

    if document.len() > 1 {
        debug!(path = %path.display(), sites = document.len(), "backup lists several sites, merging");
    }

    let mut communities = HashSet::new();
    for (site, value) in document {
        let serde_json::Value::Array(items) = value else {
            warn!(path = %path.display(), site = %site, "backup entry is not a list, skipping");
            continue;
        };
        for item in items {
            match item {
                serde_json::Value::String(actor_id) => {
                    communities.insert(actor_id);
                }
                other => {
                    warn!(
                        path = %path.display(),
                        site = %site,
                        kind = json_kind(&other),
                        "skipping non-string backup item"
                    );
                }
            }
        }
    }

    info!(path = %path.display(), communities = communities.len(), "read backup");
    Ok(communities)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
