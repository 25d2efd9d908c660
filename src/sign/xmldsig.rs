use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rsa::Pkcs1v15Sign;
use sha1::{Digest, Sha1};

use super::{Certificate, Occurrences, SignStep, Signer};
use crate::core::NfseError;
use crate::xml::{self, XmlResult, XmlWriter};

pub const DSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const C14N_ALGORITHM: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const SIGNATURE_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const DIGEST_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const ENVELOPED_TRANSFORM: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

const SIGNATURE_VALUE_SLOT: &str = "<SignatureValue></SignatureValue>";

/// Enveloped XML-DSig with RSA-SHA1 and Canonical XML 1.0, the profile the
/// Publica web services verify.
///
/// The input text is kept byte for byte; each signature is spliced in right
/// after the end tag of the element it covers.
#[derive(Debug, Clone)]
pub struct CertificateSigner {
    certificate: Certificate,
    certificate_b64: String,
}

impl CertificateSigner {
    pub fn new(certificate: Certificate) -> Self {
        let certificate_b64 = STANDARD.encode(certificate.der());
        Self {
            certificate,
            certificate_b64,
        }
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Sign the `nth` occurrence of the step's element.
    fn sign_occurrence(&self, input: &str, step: &SignStep, nth: usize) -> XmlResult {
        let doc = xml::parse(input)?;
        let target = xml::find_all(doc.root_element(), step.element)
            .nth(nth)
            .ok_or_else(|| NfseError::Signing(format!("element {} not found", step.element)))?;

        let parent = target.parent_element().ok_or_else(|| {
            NfseError::Signing(format!(
                "{} is the document element and has no parent to hold the signature",
                step.element
            ))
        })?;
        let parent_name = parent.tag_name().name();
        if parent_name != step.parent {
            return Err(NfseError::Signing(format!(
                "{} is inside {parent_name}, expected {}",
                step.element, step.parent
            )));
        }

        let reference = target
            .attribute(step.id_attribute)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                NfseError::Signing(format!(
                    "{} has no {} attribute to reference",
                    step.element, step.id_attribute
                ))
            })?;

        let digest = STANDARD.encode(Sha1::digest(xml::canonicalize(target).as_bytes()));
        let template = signature_template(reference, &digest, &self.certificate_b64)?;

        let at = target.range().end;
        let mut signed = String::with_capacity(input.len() + template.len() + 512);
        signed.push_str(&input[..at]);
        signed.push_str(&template);
        signed.push_str(&input[at..]);

        let value = self.signature_value(&signed, at)?;
        let slot = template
            .find(SIGNATURE_VALUE_SLOT)
            .map(|i| at + i + "<SignatureValue>".len())
            .ok_or_else(|| NfseError::Signing("signature template is malformed".into()))?;
        signed.insert_str(slot, &value);
        Ok(signed)
    }

    /// RSA-SHA1 over the canonical `SignedInfo` of the signature starting at
    /// byte `at`, taken in the namespace context of its final position.
    fn signature_value(&self, signed: &str, at: usize) -> XmlResult {
        let doc = xml::parse(signed)?;
        let signed_info = doc
            .descendants()
            .find(|n| n.is_element() && n.range().start == at)
            .and_then(|signature| xml::find(signature, "SignedInfo"))
            .ok_or_else(|| NfseError::Signing("inserted signature not found".into()))?;

        let hashed = Sha1::digest(xml::canonicalize(signed_info).as_bytes());
        let value = self
            .certificate
            .private_key()
            .sign(Pkcs1v15Sign::new::<Sha1>(), &hashed)
            .map_err(|e| NfseError::Signing(e.to_string()))?;
        Ok(STANDARD.encode(value))
    }
}

impl Signer for CertificateSigner {
    fn sign(&self, input: &str, step: &SignStep) -> Result<String, NfseError> {
        let found = xml::find_all(xml::parse(input)?.root_element(), step.element).count();
        if found == 0 {
            return Err(NfseError::Signing(format!(
                "element {} not found",
                step.element
            )));
        }
        let count = match step.occurrences {
            Occurrences::Each => found,
            Occurrences::First => 1,
        };

        // Signatures never contain the target element, so occurrence
        // indices stay valid across insertions.
        let mut signed = input.to_string();
        for nth in 0..count {
            signed = self.sign_occurrence(&signed, step, nth)?;
        }
        Ok(signed)
    }
}

/// `<Signature>` with an empty `SignatureValue`, filled once `SignedInfo`
/// is canonicalized in place.
fn signature_template(reference: &str, digest: &str, certificate: &str) -> XmlResult {
    fn algorithm(w: &mut XmlWriter, name: &str, uri: &str) -> Result<(), NfseError> {
        w.start_element_with_attrs(name, &[("Algorithm", uri)])?;
        w.end_element(name)?;
        Ok(())
    }

    let uri = format!("#{reference}");
    let mut w = XmlWriter::new();
    w.start_element_with_attrs("Signature", &[("xmlns", DSIG_NAMESPACE)])?;
    w.start_element("SignedInfo")?;
    algorithm(&mut w, "CanonicalizationMethod", C14N_ALGORITHM)?;
    algorithm(&mut w, "SignatureMethod", SIGNATURE_ALGORITHM)?;
    w.start_element_with_attrs("Reference", &[("URI", uri.as_str())])?;
    w.start_element("Transforms")?;
    algorithm(&mut w, "Transform", ENVELOPED_TRANSFORM)?;
    algorithm(&mut w, "Transform", C14N_ALGORITHM)?;
    w.end_element("Transforms")?;
    algorithm(&mut w, "DigestMethod", DIGEST_ALGORITHM)?;
    w.text_element("DigestValue", digest)?;
    w.end_element("Reference")?;
    w.end_element("SignedInfo")?;
    w.start_element("SignatureValue")?;
    w.end_element("SignatureValue")?;
    w.start_element("KeyInfo")?;
    w.start_element("X509Data")?;
    w.text_element("X509Certificate", certificate)?;
    w.end_element("X509Data")?;
    w.end_element("KeyInfo")?;
    w.end_element("Signature")?;
    w.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_layout() {
        let sig = signature_template("rps1", "ZGln", "Y2VydA==").unwrap();
        assert_eq!(
            sig,
            "<Signature xmlns=\"http://www.w3.org/2000/09/xmldsig#\"><SignedInfo>\
             <CanonicalizationMethod Algorithm=\"http://www.w3.org/TR/2001/REC-xml-c14n-20010315\"></CanonicalizationMethod>\
             <SignatureMethod Algorithm=\"http://www.w3.org/2000/09/xmldsig#rsa-sha1\"></SignatureMethod>\
             <Reference URI=\"#rps1\"><Transforms>\
             <Transform Algorithm=\"http://www.w3.org/2000/09/xmldsig#enveloped-signature\"></Transform>\
             <Transform Algorithm=\"http://www.w3.org/TR/2001/REC-xml-c14n-20010315\"></Transform>\
             </Transforms><DigestMethod Algorithm=\"http://www.w3.org/2000/09/xmldsig#sha1\"></DigestMethod>\
             <DigestValue>ZGln</DigestValue></Reference></SignedInfo><SignatureValue></SignatureValue>\
             <KeyInfo><X509Data><X509Certificate>Y2VydA==</X509Certificate></X509Data></KeyInfo></Signature>"
        );
        assert_eq!(sig.matches(SIGNATURE_VALUE_SLOT).count(), 1);
    }
}
