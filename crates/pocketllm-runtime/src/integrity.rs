//! File integrity gate run before every native load.
//!
//! A model file must exist, be a regular file at least `min_size` bytes
//! long, and start with the GGUF magic number. Anything else is an
//! [`IntegrityError`]; the native loader is never called with such a file.

use std::path::Path;
use tokio::io::AsyncReadExt;

use pocketllm_core::IntegrityError;

/// Magic number at the start of every GGUF file ("GGUF").
pub const GGUF_MAGIC: [u8; 4] = [0x47, 0x47, 0x55, 0x46];

/// Check a model file without loading it.
///
/// Returns the file size on success.
pub async fn verify_model_file(path: &Path, min_size: u64) -> Result<u64, IntegrityError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(IntegrityError::Missing(path.to_path_buf()));
        }
        Err(e) => return Err(unreadable(path, &e)),
    };

    if !metadata.is_file() {
        return Err(IntegrityError::Unreadable {
            path: path.to_path_buf(),
            message: "not a regular file".to_string(),
        });
    }

    let size = metadata.len();
    if size < min_size || size < GGUF_MAGIC.len() as u64 {
        return Err(IntegrityError::Undersized {
            path: path.to_path_buf(),
            size,
            min_size,
        });
    }

    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| unreadable(path, &e))?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)
        .await
        .map_err(|e| unreadable(path, &e))?;

    if magic != GGUF_MAGIC {
        return Err(IntegrityError::BadMagic {
            path: path.to_path_buf(),
            actual: magic,
        });
    }

    Ok(size)
}

fn unreadable(path: &Path, e: &std::io::Error) -> IntegrityError {
    IntegrityError::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
