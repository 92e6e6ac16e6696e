use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

const MAX_NAME_CHARS: usize = 120;
const MAX_EXTENSION_CHARS: usize = 16;
const TRANSIENT_PREFIX_CHARS: usize = 32;

/// Keeps the client's name readable in the upload dir while refusing path
/// separators and control characters. Long names lose characters from the
/// stem, never from the extension.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = truncate_keeping_extension(cleaned.trim_start_matches('.'), MAX_NAME_CHARS);
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

// Input is already ASCII, so byte and char lengths agree.
fn truncate_keeping_extension(name: &str, max_chars: usize) -> String {
    if name.len() <= max_chars {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.len() <= MAX_EXTENSION_CHARS =>
        {
            let keep = max_chars - ext.len() - 1;
            format!("{}.{}", &stem[..keep.min(stem.len())], ext)
        }
        _ => name[..max_chars].to_string(),
    }
}

pub fn transient_path(upload_dir: &Path, client_filename: &str) -> PathBuf {
    upload_dir.join(format!(
        "{}_{}",
        Uuid::new_v4().simple(),
        sanitize_filename(client_filename)
    ))
}

/// True for names produced by [`transient_path`]: 32 lowercase hex chars, `_`,
/// then the sanitized client name.
pub fn is_transient_name(name: &str) -> bool {
    match name.split_once('_') {
        Some((prefix, rest)) => {
            prefix.len() == TRANSIENT_PREFIX_CHARS
                && prefix
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
                && !rest.is_empty()
        }
        None => false,
    }
}

/// Writes `data` to a new file and syncs it. `create_new` refuses to touch a
/// file that already exists.
pub async fn write_transient_file(path: &Path, data: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("create upload dir failed: {e}"))?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| format!("create upload file failed: {e}"))?;
    let written = async {
        file.write_all(data).await?;
        file.sync_all().await
    }
    .await;
    if let Err(err) = written {
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
        return Err(format!("write upload file failed: {err}"));
    }
    Ok(())
}

/// Owns a transient upload; the file is removed when the guard drops.
pub struct TransientFile {
    path: PathBuf,
}

impl TransientFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                "[UPLOAD] remove transient file failed: path={} error={}",
                self.path.display(),
                err
            ),
        }
    }
}
