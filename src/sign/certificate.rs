use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use std::path::Path;

use crate::core::NfseError;

/// Digital certificate (e-CNPJ / e-CPF A1) used for XML signing and for TLS
/// client authentication.
///
/// Loaded from a PEM bundle holding the RSA private key (PKCS#8 or PKCS#1,
/// unencrypted) and the X.509 certificate. A `.pfx` can be converted with
/// `openssl pkcs12 -in cert.pfx -nodes -out cert.pem`.
#[derive(Clone)]
pub struct Certificate {
    key: RsaPrivateKey,
    der: Vec<u8>,
    pem: Vec<u8>,
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("der_len", &self.der.len())
            .finish_non_exhaustive()
    }
}

impl Certificate {
    pub fn from_pem(bundle: &[u8]) -> Result<Self, NfseError> {
        let blocks =
            pem::parse_many(bundle).map_err(|e| NfseError::Certificate(e.to_string()))?;

        let mut key = None;
        let mut der = None;
        for block in &blocks {
            match block.tag() {
                "PRIVATE KEY" if key.is_none() => {
                    key = Some(
                        RsaPrivateKey::from_pkcs8_der(block.contents())
                            .map_err(|e| NfseError::Certificate(format!("private key: {e}")))?,
                    );
                }
                "RSA PRIVATE KEY" if key.is_none() => {
                    key = Some(
                        RsaPrivateKey::from_pkcs1_der(block.contents())
                            .map_err(|e| NfseError::Certificate(format!("private key: {e}")))?,
                    );
                }
                "ENCRYPTED PRIVATE KEY" => {
                    return Err(NfseError::Certificate(
                        "encrypted private keys are not supported".into(),
                    ));
                }
                // The leaf certificate comes first in openssl exports.
                "CERTIFICATE" if der.is_none() => der = Some(block.contents().to_vec()),
                _ => {}
            }
        }

        let key = key.ok_or_else(|| NfseError::Certificate("no private key in bundle".into()))?;
        let der = der.ok_or_else(|| NfseError::Certificate("no certificate in bundle".into()))?;
        Ok(Self {
            key,
            der,
            pem: bundle.to_vec(),
        })
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, NfseError> {
        let path = path.as_ref();
        let bundle = std::fs::read(path)
            .map_err(|e| NfseError::Certificate(format!("{}: {e}", path.display())))?;
        Self::from_pem(&bundle)
    }

    /// DER encoding of the X.509 certificate.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// The original PEM bundle, as handed to the TLS stack.
    pub fn pem(&self) -> &[u8] {
        &self.pem
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.key
    }
}
