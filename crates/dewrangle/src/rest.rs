use crate::Client;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use ureq::SendBody;

pub static CSV_CONTENT_TYPE: &str = "text/csv";

pub fn job_errors_path(job_id: &str) -> String {
    format!("/api/rest/jobs/{job_id}/errors")
}

pub fn hash_report_path(job_id: &str) -> String {
    format!("/api/rest/jobs/{job_id}/report/volume-hash")
}

pub fn study_file_path(study_id: &str, filename: &str) -> String {
    format!("/api/rest/studies/{study_id}/files/{filename}")
}

pub fn global_descriptors_path(study_id: &str) -> String {
    format!("/api/rest/studies/{study_id}/global-descriptors")
}

/// A REST request against Dewrangle: the full URL, its query parameters, and
/// any HTTP error statuses that should not be treated as failures
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransferRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub ignore_status: Vec<u16>,
}

impl TransferRequest {
    pub fn new<S: Into<String>>(url: S) -> TransferRequest {
        TransferRequest {
            url: url.into(),
            ..TransferRequest::default()
        }
    }

    pub fn param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn ignore_status(mut self, status: u16) -> Self {
        self.ignore_status.push(status);
        self
    }

    fn check_status<F>(&self, status: u16, body: F) -> Result<(), TransferError>
    where
        F: FnOnce() -> String,
    {
        if status < 300 {
            Ok(())
        } else if self.ignore_status.contains(&status) {
            tracing::warn!(url = %self.url, status, "Ignoring HTTP error status");
            Ok(())
        } else {
            Err(TransferError::Status {
                url: self.url.clone(),
                status,
                body: body(),
            })
        }
    }
}

/// Where a downloaded file should be written
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Destination {
    /// Write to exactly this path
    File(PathBuf),
    /// Write into this directory (created if missing), naming the file from
    /// the response's `Content-Disposition` header
    Directory(PathBuf),
}

/// Upload and download of files through Dewrangle's REST API
pub trait FileTransfer {
    /// Upload the file at `path` as the body of a POST, returning the decoded
    /// JSON response (`null` if the response has no body)
    fn upload_file(
        &self,
        request: &TransferRequest,
        path: &Path,
    ) -> Result<serde_json::Value, TransferError>;

    /// Download the body of a GET to `dest`, returning the path written
    fn download_file(
        &self,
        request: &TransferRequest,
        dest: &Destination,
    ) -> Result<PathBuf, TransferError>;
}

impl FileTransfer for Client {
    fn upload_file(
        &self,
        request: &TransferRequest,
        path: &Path,
    ) -> Result<serde_json::Value, TransferError> {
        tracing::info!(path = %path.display(), url = %request.url, "Starting upload");
        let mut file = File::open(path).map_err(|source| TransferError::Open {
            path: path.to_owned(),
            source,
        })?;
        let mut response = self
            .transfer_agent()
            .post(&request.url)
            .query_pairs(request.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .header("content-type", CSV_CONTENT_TYPE)
            .send(SendBody::from_reader(&mut file))
            .map_err(|e| TransferError::Http {
                url: request.url.clone(),
                source: Box::new(e),
            })?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransferError::Read(Box::new(e)))?;
        request.check_status(status, || body.clone())?;
        tracing::info!(path = %path.display(), "Completed upload");
        if body.trim().is_empty() {
            Ok(serde_json::Value::Null)
        } else {
            serde_json::from_str(&body).map_err(Into::into)
        }
    }

    fn download_file(
        &self,
        request: &TransferRequest,
        dest: &Destination,
    ) -> Result<PathBuf, TransferError> {
        tracing::info!(url = %request.url, "Starting download");
        let mut response = self
            .transfer_agent()
            .get(&request.url)
            .query_pairs(request.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .header("content-type", CSV_CONTENT_TYPE)
            .call()
            .map_err(|e| TransferError::Http {
                url: request.url.clone(),
                source: Box::new(e),
            })?;
        let status = response.status().as_u16();
        request.check_status(status, || {
            response.body_mut().read_to_string().unwrap_or_default()
        })?;
        let disposition = response
            .headers()
            .get("content-disposition")
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition);
        let path = resolve_destination(dest, disposition)?;
        let mut fp = File::create(&path).map_err(|source| TransferError::Create {
            path: path.clone(),
            source,
        })?;
        let mut reader = response.into_body().into_reader();
        io::copy(&mut reader, &mut fp).map_err(|source| TransferError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Completed download");
        Ok(path)
    }
}

/// Determine the output path for a download.  For a directory destination,
/// the directory is created if needed and the file is named after
/// `filename`, falling back to a timestamped default.
pub fn resolve_destination(
    dest: &Destination,
    filename: Option<String>,
) -> Result<PathBuf, TransferError> {
    match dest {
        Destination::File(path) => Ok(path.clone()),
        Destination::Directory(dir) => {
            fs::create_dir_all(dir).map_err(|source| TransferError::Create {
                path: dir.clone(),
                source,
            })?;
            let name = filename.unwrap_or_else(default_filename);
            Ok(dir.join(name))
        }
    }
}

pub fn default_filename() -> String {
    format!(
        "dewrangle-file-{}.csv",
        jiff::Timestamp::now().strftime("%Y-%m-%dT%H%M%SZ")
    )
}

/// Extract the `filename` parameter of a `Content-Disposition` header value.
/// Only the final path component is kept.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("filename"))
        .map(|(_, v)| v.trim().trim_matches('"'))
        .and_then(|v| Path::new(v).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to perform request to {url}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("request to {url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to read response body")]
    Read(#[source] Box<ureq::Error>),
    #[error("failed to deserialize response body")]
    Json(#[from] serde_json::Error),
    #[error("failed to open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create {}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write to {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
