//! In-memory stand-ins for the Dewrangle client, for driving code that talks
//! to Dewrangle without a network.
use crate::rest::{Destination, FileTransfer, TransferError, TransferRequest, resolve_destination};
use crate::types::JsonMap;
use crate::{Executor, QueryError, QueryPayload};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// An [`Executor`] that answers each request with the next canned response
/// and records every payload it was sent.
///
/// # Panics
///
/// `send` panics when the script runs out of responses or a canned response
/// is not a JSON object.
#[derive(Debug)]
pub struct ScriptedExecutor {
    base_url: String,
    responses: RefCell<VecDeque<serde_json::Value>>,
    sent: RefCell<Vec<QueryPayload>>,
}

impl ScriptedExecutor {
    pub fn new(base_url: &str) -> ScriptedExecutor {
        ScriptedExecutor {
            base_url: base_url.trim_end_matches('/').to_owned(),
            responses: RefCell::new(VecDeque::new()),
            sent: RefCell::new(Vec::new()),
        }
    }

    /// Queue the `data` member of a future response
    pub fn push(&self, data: serde_json::Value) {
        self.responses.borrow_mut().push_back(data);
    }

    pub fn sent(&self) -> Vec<QueryPayload> {
        self.sent.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl Executor for ScriptedExecutor {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send(&self, payload: QueryPayload) -> Result<JsonMap, QueryError> {
        let response = self.responses.borrow_mut().pop_front();
        let Some(response) = response else {
            panic!("no scripted response left for query:\n{}", payload.query);
        };
        self.sent.borrow_mut().push(payload);
        match response {
            serde_json::Value::Object(data) => Ok(data),
            other => panic!("scripted response is not an object: {other}"),
        }
    }
}

/// A [`FileTransfer`] that records requests, answers uploads with a canned
/// JSON value, and "downloads" fixed content under a fixed server-side name
#[derive(Debug)]
pub struct RecordingTransfer {
    upload_response: serde_json::Value,
    download_name: Option<String>,
    download_body: String,
    uploads: RefCell<Vec<(TransferRequest, PathBuf)>>,
    downloads: RefCell<Vec<(TransferRequest, Destination)>>,
}

impl RecordingTransfer {
    pub fn new(upload_response: serde_json::Value) -> RecordingTransfer {
        RecordingTransfer {
            upload_response,
            download_name: None,
            download_body: String::new(),
            uploads: RefCell::new(Vec::new()),
            downloads: RefCell::new(Vec::new()),
        }
    }

    pub fn with_download(mut self, name: Option<&str>, body: &str) -> RecordingTransfer {
        self.download_name = name.map(ToOwned::to_owned);
        self.download_body = body.to_owned();
        self
    }

    pub fn uploads(&self) -> Vec<(TransferRequest, PathBuf)> {
        self.uploads.borrow().clone()
    }

    pub fn downloads(&self) -> Vec<(TransferRequest, Destination)> {
        self.downloads.borrow().clone()
    }
}

impl FileTransfer for RecordingTransfer {
    fn upload_file(
        &self,
        request: &TransferRequest,
        path: &Path,
    ) -> Result<serde_json::Value, TransferError> {
        self.uploads
            .borrow_mut()
            .push((request.clone(), path.to_owned()));
        Ok(self.upload_response.clone())
    }

    fn download_file(
        &self,
        request: &TransferRequest,
        dest: &Destination,
    ) -> Result<PathBuf, TransferError> {
        self.downloads
            .borrow_mut()
            .push((request.clone(), dest.clone()));
        let path = resolve_destination(dest, self.download_name.clone())?;
        fs::write(&path, &self.download_body).map_err(|source| TransferError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
