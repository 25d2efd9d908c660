use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::NfseError;

/// Service environment selected by `tpamb` (1 = production, 2 = homologation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Environment {
    Production,
    Homologation,
}

impl Environment {
    /// Numeric `tpamb` code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Production => 1,
            Self::Homologation => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Production),
            2 => Some(Self::Homologation),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Environment {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("tpamb must be 1 or 2, got {code}"))
    }
}

impl From<Environment> for u8 {
    fn from(env: Environment) -> Self {
        env.code()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Homologation => f.write_str("homologation"),
        }
    }
}

/// Taxpayer identifier of a party: exactly one of CNPJ (company) or CPF (person).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxId {
    Cnpj(String),
    Cpf(String),
}

impl TaxId {
    /// Element name used by the schema (`Cnpj` or `Cpf`).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Cnpj(_) => "Cnpj",
            Self::Cpf(_) => "Cpf",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Cnpj(v) | Self::Cpf(v) => v,
        }
    }
}

/// Issuer configuration, immutable for the lifetime of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Issuer CNPJ or CPF.
    pub tax_id: TaxId,
    /// Municipal registration (inscrição municipal).
    pub im: String,
    /// IBGE municipality code, selects the web service endpoint.
    pub cmun: String,
    /// Issuer legal name (razão social).
    pub razao: String,
    pub environment: Environment,
}

/// Wire shape of the configuration record.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    cnpj: Option<String>,
    #[serde(default)]
    cpf: Option<String>,
    im: String,
    cmun: String,
    #[serde(default)]
    razao: String,
    tpamb: Environment,
}

impl Config {
    pub fn new(
        tax_id: TaxId,
        im: impl Into<String>,
        cmun: impl Into<String>,
        razao: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            tax_id,
            im: im.into(),
            cmun: cmun.into(),
            razao: razao.into(),
            environment,
        }
    }

    /// Parse the JSON record `{cnpj|cpf, im, cmun, razao, tpamb}`.
    ///
    /// A non-empty `cnpj` takes precedence over `cpf`.
    pub fn from_json(json: &str) -> Result<Self, NfseError> {
        let raw: RawConfig =
            serde_json::from_str(json).map_err(|e| NfseError::Config(e.to_string()))?;
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let tax_id = match (non_empty(raw.cnpj), non_empty(raw.cpf)) {
            (Some(cnpj), _) => TaxId::Cnpj(cnpj),
            (None, Some(cpf)) => TaxId::Cpf(cpf),
            (None, None) => {
                return Err(NfseError::Config(
                    "either cnpj or cpf must be provided".into(),
                ));
            }
        };
        Ok(Self {
            tax_id,
            im: raw.im,
            cmun: raw.cmun,
            razao: raw.razao,
            environment: raw.tpamb,
        })
    }
}
