// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// Write `contents` to `path` unless the file already holds exactly that.
/// Returns true when the file was written.
pub async fn write_if_changed(path: &Path, contents: &[u8]) -> std::io::Result<bool> {
    match fs::read(path).await {
        Ok(existing) if existing == contents => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
        }
        Err(e) => return Err(e),
    }

    fs::write(path, contents).await?;
    Ok(true)
}
