//! # nfse-publica
//!
//! Client library for the NFSe (Nota Fiscal de Serviço eletrônica) web
//! services of municipalities on the Publica platform.
//!
//! Builds RPS documents and the request messages for issuance, batch
//! submission, queries, cancellation and substitution; signs them with the
//! issuer's ICP-Brasil certificate (enveloped XML-DSig); validates them
//! against `schema_nfse_v03.xsd`; and exchanges them over SOAP 1.1.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use nfse_publica::core::*;
//! use nfse_publica::rps::to_rps_xml;
//! use rust_decimal_macros::dec;
//!
//! let config = Config::new(
//!     TaxId::Cnpj("99999999000191".into()),
//!     "1733160024",
//!     "4204202",
//!     "EMPRESA TEST LTDA",
//!     Environment::Homologation,
//! );
//! let issued = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap().and_hms_opt(9, 30, 0).unwrap();
//! let rps = RpsBuilder::new(15, "A1", issued)
//!     .service(
//!         ServiceBuilder::new("0107", "Suporte tecnico", "4204202", dec!(1500))
//!             .iss(dec!(30), dec!(2.00))
//!             .build(),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let xml = to_rps_xml(&config, &rps).unwrap();
//! assert!(xml.starts_with("<Rps><InfRps id=\"rps15_A1\">"));
//! assert!(xml.contains("<ValorServicos>1500.00</ValorServicos>"));
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`core`] | RPS types and builders, issuer configuration, errors |
//! | [`xml`] | Compact writer, tree parser, Canonical XML 1.0 |
//! | [`rps`] | RPS document rendering |
//! | [`registry`] | Web service endpoints per municipality |
//! | [`sign`] | Certificate loading and XML-DSig signing pipeline |
//! | [`schema`] | Request message schema validation |
//! | [`soap`] | SOAP envelope, transports, response unwrapping |
//! | [`tools`] | The client facade tying it all together |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `http` (default) | Blocking HTTPS transport with TLS client certificate (reqwest) |
//!
//! The library logs through [`tracing`] and never installs a subscriber.

pub mod core;
pub mod registry;
pub mod rps;
pub mod schema;
pub mod sign;
pub mod soap;
pub mod tools;
pub mod xml;

// Re-export core types at crate root for convenience
pub use crate::core::*;
pub use crate::tools::{CancellationCode, MAX_BATCH_SIZE, Tools};
