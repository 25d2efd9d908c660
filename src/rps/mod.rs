//! RPS document rendering.
//!
//! Turns a typed [`Rps`](crate::core::Rps) into the `<Rps>` fragment of the
//! Publica schema (`schema_nfse_v03.xsd`), in the element order the schema
//! mandates.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use nfse_publica::core::*;
//! use nfse_publica::rps;
//! use rust_decimal_macros::dec;
//!
//! let config = Config::from_json(
//!     r#"{"cpf":"12345678909","im":"1733160024","cmun":"4204202","razao":"Fulano","tpamb":2}"#,
//! ).unwrap();
//! let issued = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap().and_hms_opt(8, 0, 0).unwrap();
//! let invoice = RpsBuilder::new(3, "B", issued)
//!     .service(ServiceBuilder::new("0107", "Aula", "4204202", dec!(80)).build())
//!     .build()
//!     .unwrap();
//!
//! let xml = rps::to_rps_xml(&config, &invoice).unwrap();
//! assert!(xml.contains("<Prestador><CpfCnpj><Cpf>12345678909</Cpf></CpfCnpj>"));
//! ```

mod render;

pub use render::{to_prestador_xml, to_rps_xml};
