//! Bounded reads and atomic writes shared by the persisted documents

use crate::errors::ManifestError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Documents larger than this are rejected as malformed.
pub const MAX_DOCUMENT_SIZE: u64 = 16 * 1024 * 1024;

/// Parse `path`, or `None` if it does not exist.
pub fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ManifestError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ManifestError::io(path, e)),
    };
    if metadata.len() > MAX_DOCUMENT_SIZE {
        return Err(ManifestError::format(
            path,
            format!(
                "document is {} bytes, limit is {}",
                metadata.len(),
                MAX_DOCUMENT_SIZE
            ),
        ));
    }
    let content = std::fs::read_to_string(path).map_err(|e| ManifestError::io(path, e))?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ManifestError::format(path, e.to_string()))
}

/// Serialize `value` to `path` via a temp file and rename.
pub fn write<T: Serialize>(path: &Path, value: &T) -> Result<(), ManifestError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ManifestError::io(parent, e))?;
    }

    let content = toml::to_string_pretty(value).map_err(|source| ManifestError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_name);
    {
        let file = std::fs::File::create(&temp_path).map_err(|e| ManifestError::io(&temp_path, e))?;
        let mut writer = std::io::BufWriter::with_capacity(64 * 1024, file);
        writer
            .write_all(content.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| ManifestError::io(&temp_path, e))?;
    }

    std::fs::rename(&temp_path, path).map_err(|e| ManifestError::io(path, e))
}
