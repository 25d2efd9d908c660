//! Municipality registry: web service endpoints per IBGE municipality code.
//!
//! The bundled table (`storage/urls_webservices.json`) is parsed once into an
//! immutable map on first use and never mutated afterwards.
//!
//! # Example
//!
//! ```
//! use nfse_publica::core::Environment;
//! use nfse_publica::registry;
//!
//! let endpoint = registry::lookup("4204202").unwrap();
//! assert!(endpoint.url(Environment::Homologation).unwrap().starts_with("https://"));
//! assert!(registry::lookup("0000000").is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::core::{Environment, NfseError};

const BUNDLED_TABLE: &str = include_str!("../../storage/urls_webservices.json");

/// Endpoint descriptor of one municipality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipalityEndpoint {
    /// Municipality name.
    #[serde(rename = "municipio", default)]
    pub name: String,
    /// Federative unit.
    #[serde(default)]
    pub uf: String,
    #[serde(rename = "homologacao", default)]
    pub homologation_url: String,
    #[serde(rename = "producao", default)]
    pub production_url: String,
    /// Namespace of the SOAP operation elements (`xmlns:e`).
    #[serde(rename = "soapns")]
    pub soap_namespace: String,
    /// Default namespace of the request messages.
    #[serde(rename = "msgns")]
    pub message_namespace: String,
    /// Layout version written in `LoteRps/@versao`.
    pub version: String,
}

impl MunicipalityEndpoint {
    /// URL for the given environment.
    ///
    /// # Errors
    ///
    /// `MissingEndpointForEnvironment` when the table has no URL for it.
    pub fn url(&self, environment: Environment) -> Result<&str, NfseError> {
        let url = match environment {
            Environment::Production => &self.production_url,
            Environment::Homologation => &self.homologation_url,
        };
        if url.trim().is_empty() {
            return Err(NfseError::MissingEndpointForEnvironment {
                municipality: self.name.clone(),
                environment,
            });
        }
        Ok(url)
    }
}

/// Immutable code -> endpoint map.
#[derive(Debug, Clone, Default)]
pub struct MunicipalityRegistry {
    endpoints: HashMap<String, MunicipalityEndpoint>,
}

impl MunicipalityRegistry {
    /// Parse a table in the bundled JSON layout.
    pub fn from_json(json: &str) -> Result<Self, NfseError> {
        let endpoints: HashMap<String, MunicipalityEndpoint> = serde_json::from_str(json)
            .map_err(|e| NfseError::Config(format!("municipality table: {e}")))?;
        Ok(Self { endpoints })
    }

    /// The table shipped with the crate, loaded on first call.
    pub fn bundled() -> Result<&'static Self, NfseError> {
        static BUNDLED: OnceLock<Result<MunicipalityRegistry, String>> = OnceLock::new();
        BUNDLED
            .get_or_init(|| Self::from_json(BUNDLED_TABLE).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| NfseError::Config(e.clone()))
    }

    pub fn lookup(&self, code: &str) -> Result<&MunicipalityEndpoint, NfseError> {
        self.endpoints
            .get(code)
            .ok_or_else(|| NfseError::UnknownMunicipality(code.to_string()))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Registered municipality codes, sorted.
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }
}

/// Look up a municipality in the bundled table.
pub fn lookup(code: &str) -> Result<&'static MunicipalityEndpoint, NfseError> {
    MunicipalityRegistry::bundled()?.lookup(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_table_parses() {
        let registry = MunicipalityRegistry::bundled().unwrap();
        assert!(!registry.is_empty());
        for code in registry.codes() {
            let endpoint = registry.lookup(code).unwrap();
            assert!(!endpoint.message_namespace.is_empty(), "{code}");
            assert!(!endpoint.soap_namespace.is_empty(), "{code}");
        }
    }

    #[test]
    fn missing_url_for_environment() {
        let registry = MunicipalityRegistry::from_json(
            r#"{"1":{"municipio":"X","homologacao":"https://h","producao":"","version":"3.00","msgns":"m","soapns":"s"}}"#,
        )
        .unwrap();
        let endpoint = registry.lookup("1").unwrap();
        assert_eq!(endpoint.url(Environment::Homologation).unwrap(), "https://h");
        assert!(matches!(
            endpoint.url(Environment::Production),
            Err(NfseError::MissingEndpointForEnvironment { .. })
        ));
    }

    #[test]
    fn malformed_table_is_a_config_error() {
        assert!(matches!(
            MunicipalityRegistry::from_json("[1,2]"),
            Err(NfseError::Config(_))
        ));
    }
}
