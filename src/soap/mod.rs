//! SOAP 1.1 plumbing: envelope construction, the [`Transport`] seam and
//! unwrapping of the `<return>` payload.
//!
//! The Publica services take the request document entity-escaped inside a
//! single `<XML>` element and answer with the response document escaped
//! inside `<return>`.
//!
//! ```
//! use nfse_publica::soap::{build_envelope, unwrap_response};
//!
//! let env = build_envelope("http://service.nfse.integracao.ws.publica/", "GerarNfse", "<a>1</a>");
//! assert!(env.contains("<XML>&lt;a&gt;1&lt;/a&gt;</XML>"));
//!
//! let raw = "<S:Envelope xmlns:S=\"http://schemas.xmlsoap.org/soap/envelope/\"><S:Body>\
//!            <ns2:GerarNfseResponse xmlns:ns2=\"x\"><return>&lt;ok/&gt;</return>\
//!            </ns2:GerarNfseResponse></S:Body></S:Envelope>";
//! assert_eq!(unwrap_response(raw), "<ok/>");
//! ```

mod fake;
#[cfg(feature = "http")]
mod http;

pub use fake::FakeTransport;
#[cfg(feature = "http")]
pub use http::HttpTransport;

use crate::core::NfseError;
use crate::xml::{self, escape_text};

pub const SOAP_ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// A fully prepared outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapRequest {
    /// Web service operation, e.g. `GerarNfse`.
    pub operation: String,
    pub url: String,
    /// SOAPAction value, without quotes.
    pub action: String,
    pub envelope: String,
    /// HTTP headers in send order.
    pub headers: Vec<(String, String)>,
}

impl SoapRequest {
    /// Prepare a request whose SOAPAction is the operation name.
    pub fn new(operation: &str, url: &str, envelope: String) -> Self {
        let headers = vec![
            ("Content-Type".to_string(), "text/xml;charset=UTF-8".to_string()),
            ("SOAPAction".to_string(), format!("\"{operation}\"")),
            ("Content-length".to_string(), envelope.len().to_string()),
        ];
        Self {
            operation: operation.to_string(),
            url: url.to_string(),
            action: operation.to_string(),
            envelope,
            headers,
        }
    }
}

/// Delivers a [`SoapRequest`] and returns the raw response body.
pub trait Transport {
    /// # Errors
    ///
    /// `TransportFailure` for network errors, HTTP error statuses and SOAP
    /// faults.
    fn send(&self, request: &SoapRequest) -> Result<String, NfseError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &SoapRequest) -> Result<String, NfseError> {
        (**self).send(request)
    }
}

/// Wrap a request document in the SOAP envelope of `operation`.
pub fn build_envelope(soap_namespace: &str, operation: &str, message: &str) -> String {
    format!(
        "<soapenv:Envelope xmlns:soapenv=\"{SOAP_ENVELOPE_NAMESPACE}\" xmlns:e=\"{soap_namespace}\">\
         <soapenv:Body><e:{operation}><XML>{}</XML></e:{operation}></soapenv:Body>\
         </soapenv:Envelope>",
        escape_text(message)
    )
}

/// Extract the response document from the `<return>` element.
///
/// The text is re-labelled from ISO-8859-1 to UTF-8 and flattened to a single
/// line. Responses that do not parse or have no `<return>` are handed back
/// unchanged.
pub fn unwrap_response(raw: &str) -> String {
    let Ok(doc) = xml::parse(raw) else {
        return raw.to_string();
    };
    match xml::find(doc.root_element(), "return") {
        Some(ret) => normalize(&xml::text_content(ret).replace("ISO-8859-1", "UTF-8")),
        None => raw.to_string(),
    }
}

/// `faultstring` of a SOAP fault, if the body is one.
pub fn fault_message(raw: &str) -> Option<String> {
    let doc = xml::parse(raw).ok()?;
    let fault = xml::find(doc.root_element(), "Fault")?;
    let message = xml::text_content(xml::find(fault, "faultstring").unwrap_or(fault));
    Some(normalize(&message))
}

fn normalize(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t'))
        .collect();

    let mut out = String::with_capacity(stripped.len());
    let mut chars = stripped.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_whitespace() && chars.peek().is_some_and(|n| n.is_whitespace()) {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  <a>\r\n\t<b>x    y</b></a>  "), "<a><b>x y</b></a>");
        assert_eq!(normalize("a b"), "a b");
    }

    #[test]
    fn request_headers() {
        let req = SoapRequest::new("CancelarNfse", "https://host/Services", "<x/>".into());
        assert_eq!(req.action, "CancelarNfse");
        assert_eq!(
            req.headers,
            vec![
                ("Content-Type".to_string(), "text/xml;charset=UTF-8".to_string()),
                ("SOAPAction".to_string(), "\"CancelarNfse\"".to_string()),
                ("Content-length".to_string(), "4".to_string()),
            ]
        );
    }

    #[test]
    fn fault_detected() {
        let raw = "<S:Envelope xmlns:S=\"http://schemas.xmlsoap.org/soap/envelope/\"><S:Body>\
                   <S:Fault><faultcode>S:Server</faultcode><faultstring>Certificado invalido</faultstring>\
                   </S:Fault></S:Body></S:Envelope>";
        assert_eq!(fault_message(raw).as_deref(), Some("Certificado invalido"));
        assert_eq!(fault_message("<ok/>"), None);
    }
}
