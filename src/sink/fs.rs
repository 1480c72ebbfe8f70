//! Filesystem-backed [`Sink`] writing one file per dump.

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use log::debug;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};

use super::{DumpIdentity, MAX_NAME_ATTEMPTS, Sink};

/// Writes dumps as `<dir>/<device>_<version>_<timestamp>.dump` files.
///
/// Files are created exclusively, so an existing dump is never appended to or
/// truncated. Partial files left by aborted sessions stay on disk.
#[derive(Clone, Debug)]
pub struct FsSink {
    dir: PathBuf,
}

impl FsSink {
    /// Store dumps under `dir`, creating it on first use if needed.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    /// Directory receiving dump files.
    #[must_use]
    pub fn dir(&self) -> &Path { &self.dir }
}

/// Open dump file owned by one session.
#[derive(Debug)]
pub struct FsHandle {
    path: PathBuf,
    file: File,
}

impl FsHandle {
    /// Path of the file being written.
    #[must_use]
    pub fn path(&self) -> &Path { &self.path }
}

#[async_trait]
impl Sink for FsSink {
    type Handle = FsHandle;

    async fn open(&self, identity: &DumpIdentity) -> io::Result<Self::Handle> {
        fs::create_dir_all(&self.dir).await?;
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(identity.candidate_name(attempt));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    debug!("dump file created: path={}", path.display());
                    return Ok(FsHandle { path, file });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!(
                "no free dump file name for {} after {MAX_NAME_ATTEMPTS} attempts",
                identity.file_stem()
            ),
        ))
    }

    async fn append(&self, handle: &mut Self::Handle, bytes: &[u8]) -> io::Result<()> {
        handle.file.write_all(bytes).await
    }

    async fn close(&self, mut handle: Self::Handle) -> io::Result<()> {
        handle.file.flush().await?;
        handle.file.sync_all().await
    }

    fn output_name(&self, handle: &Self::Handle) -> String { handle.path.display().to_string() }
}
