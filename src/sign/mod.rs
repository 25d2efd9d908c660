//! XML-DSig signing of request documents.
//!
//! Every request carries one or more enveloped signatures. Each
//! [`SignStep`] names the element it signs, the attribute holding its
//! reference id, and the parent that receives the `<Signature>` right after
//! the signed element. A [`SignaturePipeline`] applies steps in a fixed
//! order; since signatures are inserted as siblings, later steps never change
//! the bytes covered by earlier ones.
//!
//! # Example
//!
//! ```no_run
//! use nfse_publica::sign::*;
//!
//! let cert = Certificate::from_pem_file("certificate.pem").unwrap();
//! let signer = CertificateSigner::new(cert);
//! let signed = SignaturePipeline::new()
//!     .then(SignStep::each("InfRps", "Rps"))
//!     .then(SignStep::single("LoteRps", "EnviarLoteRpsEnvio"))
//!     .apply(&signer, "<EnviarLoteRpsEnvio>...</EnviarLoteRpsEnvio>")
//!     .unwrap();
//! ```

mod certificate;
mod xmldsig;

pub use certificate::Certificate;
pub use xmldsig::{
    C14N_ALGORITHM, CertificateSigner, DIGEST_ALGORITHM, DSIG_NAMESPACE, ENVELOPED_TRANSFORM,
    SIGNATURE_ALGORITHM,
};

use tracing::debug;

use crate::core::NfseError;

/// Which occurrences of the target element a step signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrences {
    /// Every element with the target name, each with its own signature.
    Each,
    /// Only the first element in document order.
    First,
}

/// One signing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignStep {
    /// Local name of the element to sign.
    pub element: &'static str,
    /// Attribute whose value is referenced as `URI="#value"`.
    pub id_attribute: &'static str,
    /// Local name of the parent that receives the signature, inserted
    /// immediately after the signed element.
    pub parent: &'static str,
    pub occurrences: Occurrences,
}

impl SignStep {
    /// Sign every `element` below a `parent`.
    pub const fn each(element: &'static str, parent: &'static str) -> Self {
        Self {
            element,
            id_attribute: "id",
            parent,
            occurrences: Occurrences::Each,
        }
    }

    /// Sign the first `element` below `parent`.
    pub const fn single(element: &'static str, parent: &'static str) -> Self {
        Self {
            element,
            id_attribute: "id",
            parent,
            occurrences: Occurrences::First,
        }
    }
}

/// Produces enveloped signatures. Implementations must insert the signature
/// as the sibling following each signed element and leave the rest of the
/// document untouched.
pub trait Signer {
    fn sign(&self, xml: &str, step: &SignStep) -> Result<String, NfseError>;
}

impl<S: Signer + ?Sized> Signer for Box<S> {
    fn sign(&self, xml: &str, step: &SignStep) -> Result<String, NfseError> {
        (**self).sign(xml, step)
    }
}

/// Ordered list of signing steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignaturePipeline {
    steps: Vec<SignStep>,
}

impl SignaturePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, step: SignStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[SignStep] {
        &self.steps
    }

    pub fn apply(&self, signer: &dyn Signer, xml: &str) -> Result<String, NfseError> {
        let mut doc = xml.to_string();
        for step in &self.steps {
            debug!(element = step.element, parent = step.parent, "signing");
            doc = signer.sign(&doc, step)?;
        }
        Ok(doc)
    }
}
