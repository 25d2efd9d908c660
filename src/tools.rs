//! Client facade for the Publica NFSe web services.
//!
//! [`Tools`] composes each request message, signs it, validates it against
//! the message schema, wraps it in a SOAP envelope, sends it and unwraps the
//! response document.
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use nfse_publica::core::*;
//! use nfse_publica::sign::Certificate;
//! use nfse_publica::tools::Tools;
//! use rust_decimal_macros::dec;
//!
//! let config = Config::from_json(
//!     r#"{"cnpj":"99999999000191","im":"1733160024","cmun":"4204202","razao":"EMPRESA","tpamb":2}"#,
//! ).unwrap();
//! let cert = Certificate::from_pem_file("certificate.pem").unwrap();
//! let mut tools = Tools::new(config, cert).unwrap();
//!
//! let issued = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(10, 0, 0).unwrap();
//! let rps = RpsBuilder::new(1, "A1", issued)
//!     .service(ServiceBuilder::new("0107", "Suporte tecnico", "4204202", dec!(100)).build())
//!     .build()
//!     .unwrap();
//! let response = tools.issue_invoice(&rps).unwrap();
//! println!("{response}");
//! ```

use std::collections::HashSet;

use tracing::{debug, info};

use crate::core::{Config, NfseError, Rps, RpsType};
use crate::registry::{self, MunicipalityEndpoint};
use crate::rps::{to_prestador_xml, to_rps_xml};
use crate::schema::{PublicaSchema, SCHEMA_FILE, SCHEMA_NAMESPACE, SchemaValidator};
use crate::sign::{Certificate, CertificateSigner, SignStep, SignaturePipeline, Signer};
use crate::soap::{SoapRequest, Transport, build_envelope, unwrap_response};
use crate::xml::XmlWriter;

/// Maximum number of RPS in one `RecepcionarLoteRps` batch.
pub const MAX_BATCH_SIZE: usize = 50;

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Reason for cancelling an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationCode {
    /// Error in issuance. The only code that carries a reason text.
    IssuanceError,
    /// Service not provided.
    ServiceNotProvided,
    /// Issued in duplicate.
    Duplicate,
}

impl CancellationCode {
    pub fn code(&self) -> u8 {
        match self {
            Self::IssuanceError => 1,
            Self::ServiceNotProvided => 2,
            Self::Duplicate => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::IssuanceError),
            2 => Some(Self::ServiceNotProvided),
            4 => Some(Self::Duplicate),
            _ => None,
        }
    }
}

/// Publica NFSe client bound to one issuer and municipality.
pub struct Tools {
    config: Config,
    endpoint: MunicipalityEndpoint,
    prestador: String,
    signer: Box<dyn Signer>,
    validator: Box<dyn SchemaValidator>,
    transport: Option<Box<dyn Transport>>,
    certificate: Option<Certificate>,
    last_request: Option<SoapRequest>,
}

impl Tools {
    /// Client that signs with `certificate` and, unless another transport is
    /// loaded, uses it for TLS client authentication.
    ///
    /// # Errors
    ///
    /// `UnknownMunicipality` when `config.cmun` is not in the registry.
    pub fn new(config: Config, certificate: Certificate) -> Result<Self, NfseError> {
        let signer = CertificateSigner::new(certificate.clone());
        let mut tools = Self::with_signer(config, signer)?;
        tools.certificate = Some(certificate);
        Ok(tools)
    }

    /// Client with a custom signer. A transport must be loaded before the
    /// first operation.
    pub fn with_signer(config: Config, signer: impl Signer + 'static) -> Result<Self, NfseError> {
        let endpoint = registry::lookup(&config.cmun)?.clone();
        let prestador = to_prestador_xml(&config)?;
        Ok(Self {
            config,
            endpoint,
            prestador,
            signer: Box::new(signer),
            validator: Box::new(PublicaSchema),
            transport: None,
            certificate: None,
            last_request: None,
        })
    }

    /// Replace the transport used for all further operations.
    pub fn load_transport(&mut self, transport: impl Transport + 'static) {
        self.transport = Some(Box::new(transport));
    }

    pub fn set_schema_validator(&mut self, validator: impl SchemaValidator + 'static) {
        self.validator = Box::new(validator);
    }

    /// The most recent SOAP request handed to the transport.
    pub fn last_request(&self) -> Option<&SoapRequest> {
        self.last_request.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn endpoint(&self) -> &MunicipalityEndpoint {
        &self.endpoint
    }

    /// Issuer block sent with the query operations.
    pub fn prestador(&self) -> &str {
        &self.prestador
    }

    /// Issue one invoice synchronously (`GerarNfse`).
    pub fn issue_invoice(&mut self, rps: &Rps) -> Result<String, NfseError> {
        let mut w = XmlWriter::new();
        w.start_element_with_attrs("GerarNfseEnvio", &[("xmlns", self.msgns())])?;
        w.raw(&to_rps_xml(&self.config, rps)?)?;
        w.end_element("GerarNfseEnvio")?;

        let pipeline = SignaturePipeline::new().then(SignStep::each("InfRps", "Rps"));
        self.execute("GerarNfse", &w.into_string()?, &pipeline)
    }

    /// Submit a batch of 1 to [`MAX_BATCH_SIZE`] RPS (`RecepcionarLoteRps`).
    ///
    /// The server answers with a protocol receipt; results are fetched with
    /// [`Tools::query_batch`].
    ///
    /// Every `InfRps` must have a distinct [`Rps::reference_id`]; a repeated
    /// number/series pair is rejected before anything is signed.
    ///
    /// `LoteRps` is signed through an `id="lote{batch_number}"` attribute.
    /// Not yet confirmed against the published `schema_nfse_v03.xsd`; if the
    /// server rejects the attribute, the batch signature must switch to an
    /// empty-URI reference instead.
    pub fn submit_batch(&mut self, batch: &[Rps], batch_number: u64) -> Result<String, NfseError> {
        if batch.is_empty() {
            return Err(NfseError::InvalidRequest("batch holds no RPS".into()));
        }
        if batch.len() > MAX_BATCH_SIZE {
            return Err(NfseError::BatchSizeExceeded {
                count: batch.len(),
                limit: MAX_BATCH_SIZE,
            });
        }

        let mut seen = HashSet::with_capacity(batch.len());
        if let Some(duplicate) = batch.iter().find(|rps| !seen.insert(rps.reference_id())) {
            return Err(NfseError::InvalidRequest(format!(
                "RPS {}/{} appears more than once in the batch",
                duplicate.identification.number, duplicate.identification.series
            )));
        }

        let schema_location = format!("{SCHEMA_NAMESPACE} {SCHEMA_FILE}");
        let lote_id = format!("lote{batch_number}");

        let mut w = XmlWriter::new();
        w.start_element_with_attrs(
            "EnviarLoteRpsEnvio",
            &[
                ("xmlns", self.msgns()),
                ("xmlns:xsi", XSI_NAMESPACE),
                ("xsi:schemaLocation", &schema_location),
            ],
        )?;
        w.start_element_with_attrs(
            "LoteRps",
            &[("id", &lote_id), ("versao", &self.endpoint.version)],
        )?;
        w.text_element("NumeroLote", &batch_number.to_string())?;
        w.text_element(self.config.tax_id.tag(), self.config.tax_id.value())?;
        w.text_element("InscricaoMunicipal", &self.config.im)?;
        w.text_element("QuantidadeRps", &batch.len().to_string())?;
        w.start_element("ListaRps")?;
        for rps in batch {
            w.raw(&to_rps_xml(&self.config, rps)?)?;
        }
        w.end_element("ListaRps")?;
        w.end_element("LoteRps")?;
        w.end_element("EnviarLoteRpsEnvio")?;

        let pipeline = SignaturePipeline::new()
            .then(SignStep::each("InfRps", "Rps"))
            .then(SignStep::single("LoteRps", "EnviarLoteRpsEnvio"));
        self.execute("RecepcionarLoteRps", &w.into_string()?, &pipeline)
    }

    /// Status and invoices of a submitted batch (`ConsultarLoteRps`).
    pub fn query_batch(&mut self, protocol: &str) -> Result<String, NfseError> {
        let mut w = XmlWriter::new();
        w.start_element_with_attrs("ConsultarLoteRpsEnvio", &[("xmlns", self.msgns())])?;
        w.raw(&self.prestador)?;
        w.text_element("Protocolo", protocol)?;
        w.end_element("ConsultarLoteRpsEnvio")?;

        let pipeline = prestador_pipeline("ConsultarLoteRpsEnvio");
        self.execute("ConsultarLoteRps", &w.into_string()?, &pipeline)
    }

    /// Invoices numbered `first..=last` (`ConsultarNfseFaixa`).
    pub fn query_by_range(&mut self, first: u64, last: u64) -> Result<String, NfseError> {
        let mut w = XmlWriter::new();
        w.start_element_with_attrs("ConsultarNfseFaixaEnvio", &[("xmlns", self.msgns())])?;
        w.raw(&self.prestador)?;
        w.start_element("Faixa")?;
        w.text_element("NumeroNfseInicial", &first.to_string())?;
        w.text_element("NumeroNfseFinal", &last.to_string())?;
        w.end_element("Faixa")?;
        w.end_element("ConsultarNfseFaixaEnvio")?;

        let pipeline = prestador_pipeline("ConsultarNfseFaixaEnvio");
        self.execute("ConsultarNfseFaixa", &w.into_string()?, &pipeline)
    }

    /// Invoice generated from an RPS (`ConsultarNfsePorRps`).
    pub fn query_by_rps_id(
        &mut self,
        number: u64,
        series: &str,
        rps_type: RpsType,
    ) -> Result<String, NfseError> {
        let mut w = XmlWriter::new();
        w.start_element_with_attrs("ConsultarNfseRpsEnvio", &[("xmlns", self.msgns())])?;
        w.start_element("IdentificacaoRps")?;
        w.text_element("Numero", &number.to_string())?;
        w.text_element("Serie", series)?;
        w.text_element("Tipo", &rps_type.code().to_string())?;
        w.end_element("IdentificacaoRps")?;
        w.raw(&self.prestador)?;
        w.end_element("ConsultarNfseRpsEnvio")?;

        let pipeline = prestador_pipeline("ConsultarNfseRpsEnvio");
        self.execute("ConsultarNfsePorRps", &w.into_string()?, &pipeline)
    }

    /// Cancel an invoice (`CancelarNfse`).
    ///
    /// `reason` is sent only with [`CancellationCode::IssuanceError`], which
    /// requires it.
    pub fn cancel_invoice(
        &mut self,
        number: u64,
        code: CancellationCode,
        reason: Option<&str>,
    ) -> Result<String, NfseError> {
        let reason = match code {
            CancellationCode::IssuanceError => Some(
                reason
                    .filter(|r| !r.trim().is_empty())
                    .ok_or_else(|| {
                        NfseError::InvalidRequest(
                            "a cancellation reason is required for issuance errors".into(),
                        )
                    })?,
            ),
            _ => None,
        };

        let mut w = XmlWriter::new();
        w.start_element_with_attrs("CancelarNfseEnvio", &[("xmlns", self.msgns())])?;
        let id = format!("cancel{number}");
        self.write_cancellation(&mut w, &id, &number.to_string(), code, reason)?;
        w.end_element("CancelarNfseEnvio")?;

        let pipeline =
            SignaturePipeline::new().then(SignStep::single("InfPedidoCancelamento", "Pedido"));
        self.execute("CancelarNfse", &w.into_string()?, &pipeline)
    }

    /// Cancel an invoice and issue `rps` in its place (`SubstituirNfse`).
    pub fn substitute_invoice(
        &mut self,
        number: u64,
        rps: &Rps,
        code: CancellationCode,
    ) -> Result<String, NfseError> {
        let mut w = XmlWriter::new();
        w.start_element_with_attrs("SubstituirNfseEnvio", &[("xmlns", self.msgns())])?;
        w.start_element_with_attrs("SubstituicaoNfse", &[("id", "subst")])?;
        self.write_cancellation(&mut w, "cancel", &format!("{number:015}"), code, None)?;
        w.raw(&to_rps_xml(&self.config, rps)?)?;
        w.end_element("SubstituicaoNfse")?;
        w.end_element("SubstituirNfseEnvio")?;

        let pipeline = SignaturePipeline::new()
            .then(SignStep::each("InfRps", "Rps"))
            .then(SignStep::single("InfPedidoCancelamento", "Pedido"))
            .then(SignStep::single("SubstituicaoNfse", "SubstituirNfseEnvio"));
        self.execute("SubstituirNfse", &w.into_string()?, &pipeline)
    }

    fn msgns(&self) -> &str {
        &self.endpoint.message_namespace
    }

    fn write_cancellation(
        &self,
        w: &mut XmlWriter,
        id: &str,
        number: &str,
        code: CancellationCode,
        reason: Option<&str>,
    ) -> Result<(), NfseError> {
        w.start_element("Pedido")?;
        w.start_element_with_attrs("InfPedidoCancelamento", &[("id", id)])?;
        w.start_element("IdentificacaoNfse")?;
        w.text_element("Numero", number)?;
        w.text_element(self.config.tax_id.tag(), self.config.tax_id.value())?;
        w.text_element("InscricaoMunicipal", &self.config.im)?;
        w.text_element("CodigoMunicipio", &self.config.cmun)?;
        w.end_element("IdentificacaoNfse")?;
        w.text_element("CodigoCancelamento", &code.code().to_string())?;
        w.opt_text_element("MotivoCancelamento", reason)?;
        w.end_element("InfPedidoCancelamento")?;
        w.end_element("Pedido")?;
        Ok(())
    }

    /// Sign, validate, send and unwrap.
    fn execute(
        &mut self,
        operation: &str,
        message: &str,
        pipeline: &SignaturePipeline,
    ) -> Result<String, NfseError> {
        debug!(operation, bytes = message.len(), "message composed");
        let signed = pipeline.apply(self.signer.as_ref(), message)?;
        debug!(
            operation,
            bytes = signed.len(),
            signatures = pipeline.steps().len(),
            "message signed"
        );

        self.validator.validate(&signed)?;

        let url = self.endpoint.url(self.config.environment)?.to_string();
        let envelope = build_envelope(&self.endpoint.soap_namespace, operation, &signed);
        let request = SoapRequest::new(operation, &url, envelope);
        self.last_request = Some(request.clone());

        info!(
            operation,
            municipality = %self.config.cmun,
            environment = %self.config.environment,
            "sending request"
        );
        let response = self.transport()?.send(&request)?;
        Ok(unwrap_response(&response))
    }

    fn transport(&mut self) -> Result<&dyn Transport, NfseError> {
        if self.transport.is_none() {
            self.transport = Some(self.default_transport()?);
        }
        self.transport
            .as_deref()
            .ok_or_else(|| NfseError::TransportFailure("no transport loaded".into()))
    }

    #[cfg(feature = "http")]
    fn default_transport(&self) -> Result<Box<dyn Transport>, NfseError> {
        let certificate = self.certificate.as_ref().ok_or_else(|| {
            NfseError::TransportFailure(
                "no transport loaded and no certificate for the HTTPS transport".into(),
            )
        })?;
        Ok(Box::new(crate::soap::HttpTransport::new(certificate)?))
    }

    #[cfg(not(feature = "http"))]
    fn default_transport(&self) -> Result<Box<dyn Transport>, NfseError> {
        Err(NfseError::TransportFailure(
            "no transport loaded; enable the `http` feature or call load_transport".into(),
        ))
    }
}

fn prestador_pipeline(parent: &'static str) -> SignaturePipeline {
    SignaturePipeline::new().then(SignStep::single("Prestador", parent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_codes() {
        for code in [
            CancellationCode::IssuanceError,
            CancellationCode::ServiceNotProvided,
            CancellationCode::Duplicate,
        ] {
            assert_eq!(CancellationCode::from_code(code.code()), Some(code));
        }
        assert_eq!(CancellationCode::from_code(3), None);
    }
}
