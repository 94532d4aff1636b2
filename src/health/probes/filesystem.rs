//! Write/read round-trip against the upload directory.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use crate::health::probe::Probe;
use crate::health::status::ServiceStatus;

const MARKER_PREFIX: &str = ".health-check-";

pub struct FilesystemProbe {
    directory: PathBuf,
}

impl FilesystemProbe {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn round_trip(&self) -> io::Result<()> {
        let marker = self
            .directory
            .join(format!("{MARKER_PREFIX}{}", Uuid::new_v4()));
        let payload = Uuid::new_v4().to_string();

        fs::write(&marker, payload.as_bytes()).await?;
        let read_back = fs::read_to_string(&marker).await;
        let removed = fs::remove_file(&marker).await;

        if read_back? != payload {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "marker content mismatch",
            ));
        }
        removed
    }

    /// Remove markers left behind by an interrupted probe. Returns how many
    /// were deleted.
    pub async fn sweep_markers(&self) -> io::Result<usize> {
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let is_marker = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(MARKER_PREFIX));
            if is_marker {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl Probe for FilesystemProbe {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn check(&self) -> ServiceStatus {
        let started = Instant::now();
        let status = match self.round_trip().await {
            Ok(()) => ServiceStatus::healthy(),
            Err(e) => ServiceStatus::unhealthy(e.to_string()),
        };
        status
            .with_response_time(started.elapsed())
            .with_detail("path", self.directory.display().to_string())
    }
}
