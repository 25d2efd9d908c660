//! Blocking HTTPS transport with TLS client authentication.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use super::{SoapRequest, Transport, fault_message};
use crate::core::NfseError;
use crate::sign::Certificate;

/// Posts envelopes over HTTPS, presenting the issuer certificate as the TLS
/// client identity.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

/// Options for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder<'a> {
    certificate: &'a Certificate,
    timeout: Option<Duration>,
    accept_invalid_certs: bool,
}

impl HttpTransportBuilder<'_> {
    /// Overall request timeout. None by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Skip server certificate verification. Some homologation servers run
    /// with self-signed certificates.
    pub fn disable_cert_validation(mut self, disable: bool) -> Self {
        self.accept_invalid_certs = disable;
        self
    }

    pub fn build(self) -> Result<HttpTransport, NfseError> {
        let identity = reqwest::Identity::from_pem(self.certificate.pem())
            .map_err(|e| NfseError::Certificate(format!("TLS identity: {e}")))?;

        let mut builder = Client::builder()
            .identity(identity)
            .danger_accept_invalid_certs(self.accept_invalid_certs);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| NfseError::TransportFailure(e.to_string()))?;
        Ok(HttpTransport { client })
    }
}

impl HttpTransport {
    /// Transport with default options.
    pub fn new(certificate: &Certificate) -> Result<Self, NfseError> {
        Self::builder(certificate).build()
    }

    pub fn builder(certificate: &Certificate) -> HttpTransportBuilder<'_> {
        HttpTransportBuilder {
            certificate,
            timeout: None,
            accept_invalid_certs: false,
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &SoapRequest) -> Result<String, NfseError> {
        let mut post = self.client.post(&request.url);
        for (name, value) in &request.headers {
            post = post.header(name.as_str(), value.as_str());
        }

        let resp = post.body(request.envelope.clone()).send().map_err(|e| {
            warn!(operation = %request.operation, error = %e, "request failed");
            NfseError::TransportFailure(e.to_string())
        })?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = resp
            .bytes()
            .map_err(|e| NfseError::TransportFailure(e.to_string()))?;
        let body = decode_body(&bytes, &content_type);
        debug!(operation = %request.operation, %status, bytes = bytes.len(), "response received");
        check_response(&request.operation, status, body)
    }
}

/// Map SOAP faults and HTTP error statuses to `TransportFailure`. A fault
/// wins over the status, since servers usually send it with a 500.
fn check_response(operation: &str, status: StatusCode, body: String) -> Result<String, NfseError> {
    if let Some(fault) = fault_message(&body) {
        warn!(operation, %fault, "SOAP fault");
        return Err(NfseError::TransportFailure(format!("SOAP fault: {fault}")));
    }
    if !status.is_success() {
        warn!(operation, %status, "HTTP error");
        return Err(NfseError::TransportFailure(format!("HTTP {status}: {body}")));
    }
    Ok(body)
}

/// Decode a body as UTF-8 unless the content type or XML declaration says
/// ISO-8859-1 (read as its Windows-1252 superset).
fn decode_body(bytes: &[u8], content_type: &str) -> String {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(100)]).to_ascii_lowercase();
    let declared = content_type.to_ascii_lowercase();
    let latin1 = ["iso-8859-1", "windows-1252", "latin1"]
        .iter()
        .any(|label| declared.contains(label) || (head.starts_with("<?xml") && head.contains(label)));

    if latin1 {
        let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
        text.into_owned()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
