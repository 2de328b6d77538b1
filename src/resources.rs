//! Upload of locally supplied application resources.
//!
//! After an application is created the control plane holds placeholder
//! entries for resources that must come from the local machine. This module
//! streams them up one by one inside a single session.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::controlplane::{ControlPlane, ResourceUpload, Session};
use crate::error::{ConvergeError, Result, UploadError};
use crate::reader::{CallContext, Interrupt};

/// Kind of a charm resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A plain file.
    File,
    /// An OCI image description.
    OciImage,
}

/// A resource waiting for its local content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResourceUpload {
    /// Resource name.
    pub name: String,
    /// Local path of the content.
    pub filename: PathBuf,
    /// Resource type as written by the user (`file` or `oci-image`).
    pub kind: String,
}

/// Read access to local files.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Reads the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error.
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// [`Filesystem`] backed by the operating system, off the runtime threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFilesystem;

#[async_trait]
impl Filesystem for OsFilesystem {
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "oci-image" => Ok(Self::OciImage),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::File => "file",
            Self::OciImage => "oci-image",
        };
        write!(f, "{s}")
    }
}

impl PendingResourceUpload {
    /// Parses a `name=path[:type]` argument. The type defaults to `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or path is missing.
    pub fn parse_arg(arg: &str) -> std::result::Result<Self, String> {
        let (name, rest) = arg
            .split_once('=')
            .ok_or_else(|| format!("Invalid resource {arg:?}. Expected format: NAME=PATH[:TYPE]"))?;

        let (path, kind) = match rest.rsplit_once(':') {
            Some((path, kind)) if kind.parse::<ResourceKind>().is_ok() => (path, kind),
            _ => (rest, "file"),
        };

        if name.is_empty() || path.is_empty() {
            return Err(format!("Invalid resource {arg:?}. Name and path are required"));
        }

        Ok(Self {
            name: name.to_string(),
            filename: PathBuf::from(path),
            kind: kind.to_string(),
        })
    }
}

fn interrupted(resource: &str, interrupt: Interrupt) -> ConvergeError {
    let message = match interrupt {
        Interrupt::Cancelled => "cancelled",
        Interrupt::DeadlineExceeded => "deadline exceeded",
    };
    UploadError::Failed {
        resource: resource.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Uploads `pending` resources for `application`, in order.
///
/// Returns at once when there is nothing to upload. The first failure aborts
/// the batch; resources uploaded before it are left in place.
///
/// # Errors
///
/// Returns [`UploadError::InvalidType`] or [`UploadError::Open`] for a bad
/// entry, the control plane error of a rejected upload, or
/// [`UploadError::Failed`] if the context ends mid batch.
pub async fn upload_pending_resources<C, F>(
    ctx: &CallContext,
    client: &C,
    model: &str,
    application: &str,
    pending: &[PendingResourceUpload],
    filesystem: &F,
) -> Result<()>
where
    C: ControlPlane + ?Sized,
    F: Filesystem + ?Sized,
{
    if pending.is_empty() {
        debug!("No pending resources for {application}");
        return Ok(());
    }

    let session = ctx
        .run(Session::open(client, model))
        .await
        .map_err(|i| interrupted(&pending[0].name, i))??;

    for resource in pending {
        let kind: ResourceKind = resource.kind.parse().map_err(|kind| UploadError::InvalidType {
            resource: resource.name.clone(),
            kind,
        })?;

        let content = filesystem
            .read(&resource.filename)
            .await
            .map_err(|source| UploadError::Open {
                resource: resource.name.clone(),
                source,
            })?;

        let upload = ResourceUpload {
            application: application.to_string(),
            resource: resource.name.clone(),
            filename: resource.filename.display().to_string(),
            revision: String::new(),
            content,
        };

        ctx.run(session.client().upload_resource(session.model(), &upload))
            .await
            .map_err(|i| interrupted(&resource.name, i))??;

        info!(
            "Uploaded {kind} resource {} for {application} ({} bytes)",
            resource.name,
            upload.content.len()
        );
    }

    Ok(())
}
