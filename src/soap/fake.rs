use std::sync::{Arc, Mutex, PoisonError};

use super::{SoapRequest, Transport};
use crate::core::NfseError;

/// In-memory transport that records every request.
///
/// Clones share the same log, so a test can keep one handle while the client
/// owns another. Without a canned response the envelope itself is returned.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    requests: Arc<Mutex<Vec<SoapRequest>>>,
    response: Option<String>,
    failure: Option<String>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request with `response`.
    pub fn respond_with(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Record each request, then fail it with `TransportFailure(detail)`.
    pub fn fail_with(mut self, detail: impl Into<String>) -> Self {
        self.failure = Some(detail.into());
        self
    }

    /// All requests sent so far, oldest first.
    pub fn requests(&self) -> Vec<SoapRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_request(&self) -> Option<SoapRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: &SoapRequest) -> Result<String, NfseError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        if let Some(detail) = &self.failure {
            return Err(NfseError::TransportFailure(detail.clone()));
        }
        Ok(self
            .response
            .clone()
            .unwrap_or_else(|| request.envelope.clone()))
    }
}
