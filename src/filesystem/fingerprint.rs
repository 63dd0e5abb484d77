use std::fmt;
use std::path::{Path, PathBuf};

use compio::BufResult;
use compio::fs::File;
use compio::io::AsyncReadAt;
use sha2::{Digest, Sha256};
use snafu::{ResultExt, Snafu, ensure};

use crate::ext::{AsyncTryFrom, BestEffortPathExt};

/// Size of the buffer used when streaming file content.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 digest of a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl AsyncTryFrom<&Path> for ContentHash {
    type Error = FingerprintError;

    async fn async_try_from(path: &Path) -> Result<Self, Self::Error> {
        let metadata = compio::fs::metadata(path).await.context(PathSnafu {
            path: path.to_path_buf(),
        })?;
        ensure!(
            !metadata.is_dir(),
            DirectorySnafu {
                path: path.to_path_buf()
            }
        );

        let file = File::open(path).await.context(PathSnafu {
            path: path.to_path_buf(),
        })?;

        let mut hasher = Sha256::new();
        let mut buffer = Vec::with_capacity(CHUNK_SIZE);
        let mut position = 0u64;
        loop {
            buffer.clear();
            let BufResult(result, returned) = file.read_at(buffer, position).await;
            buffer = returned;
            let read = result.context(PathSnafu {
                path: path.to_path_buf(),
            })?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            position += read as u64;
        }

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Ok(ContentHash(digest))
    }
}

#[derive(Debug, Snafu)]
pub enum FingerprintError {
    #[snafu(display("Failed to read content of {}", path.best_effort_path_display()))]
    PathError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("The supplied path {} is a directory", path.best_effort_path_display()))]
    DirectoryError { path: PathBuf },
}
