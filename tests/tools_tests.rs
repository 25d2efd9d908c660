use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use nfse_publica::core::*;
use nfse_publica::schema::SchemaValidator;
use nfse_publica::sign::{Certificate, CertificateSigner, SignStep, Signer};
use nfse_publica::soap::FakeTransport;
use nfse_publica::tools::{CancellationCode, MAX_BATCH_SIZE, Tools};
use nfse_publica::xml::{self, Node};
use rust_decimal_macros::dec;

const BUNDLE: &[u8] = include_bytes!("fixtures/certificate.pem");
const CHAPECO_HOMOLOGATION: &str = "https://nfse-teste.publica.inf.br/chapeco_nfse_integracao/Services";

fn certificate() -> Certificate {
    Certificate::from_pem(BUNDLE).unwrap()
}

fn config() -> Config {
    Config::new(
        TaxId::Cnpj("99999999000191".into()),
        "1733160024",
        "4204202",
        "EMPRESA TEST LTDA",
        Environment::Homologation,
    )
}

fn rps(number: u64) -> Rps {
    rps_in_series(number, "A1")
}

fn rps_in_series(number: u64, series: &str) -> Rps {
    let issued = NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    RpsBuilder::new(number, series, issued)
        .service(
            ServiceBuilder::new("0107", "Suporte tecnico", "4204202", dec!(250))
                .iss(dec!(5), dec!(2))
                .build(),
        )
        .tomador(
            TomadorBuilder::new()
                .tax_id(TaxId::Cpf("12345678909".into()))
                .name("Fulano de Tal")
                .build(),
        )
        .build()
        .unwrap()
}

fn client() -> (Tools, FakeTransport) {
    let fake = FakeTransport::new();
    let mut tools = Tools::new(config(), certificate()).unwrap();
    tools.load_transport(fake.clone());
    (tools, fake)
}

/// The request document carried inside the last envelope.
fn sent_message(fake: &FakeTransport) -> String {
    let request = fake.last_request().expect("a request was sent");
    let envelope = xml::parse(&request.envelope).unwrap();
    xml::text_content(xml::find(envelope.root_element(), "XML").unwrap())
}

fn references(message: Node<'_, '_>) -> Vec<String> {
    xml::find_all(message, "Reference")
        .map(|r| r.attribute("URI").unwrap().to_string())
        .collect()
}

fn child_names(el: Node<'_, '_>) -> Vec<String> {
    xml::child_elements(el)
        .map(|e| e.tag_name().name().to_string())
        .collect()
}

fn text(el: Node<'_, '_>, name: &str) -> String {
    xml::text_content(xml::find(el, name).unwrap_or_else(|| panic!("{name} missing")))
}

/// Delegates to the certificate signer and records the signing order.
struct RecordingSigner {
    inner: CertificateSigner,
    steps: Arc<Mutex<Vec<&'static str>>>,
}

impl Signer for RecordingSigner {
    fn sign(&self, xml: &str, step: &SignStep) -> Result<String, NfseError> {
        self.steps.lock().unwrap().push(step.element);
        self.inner.sign(xml, step)
    }
}

struct AcceptAll;

impl SchemaValidator for AcceptAll {
    fn validate(&self, _xml: &str) -> Result<(), NfseError> {
        Ok(())
    }
}

// --- Construction ---

#[test]
fn unknown_municipality_fails_at_construction() {
    let mut cfg = config();
    cfg.cmun = "3550308".into();
    assert!(matches!(
        Tools::new(cfg, certificate()),
        Err(NfseError::UnknownMunicipality(code)) if code == "3550308"
    ));
}

#[test]
fn prestador_block() {
    let (tools, _) = client();
    assert_eq!(
        tools.prestador(),
        "<Prestador id=\"prestador\"><CpfCnpj><Cnpj>99999999000191</Cnpj></CpfCnpj>\
         <InscricaoMunicipal>1733160024</InscricaoMunicipal></Prestador>"
    );
    assert_eq!(tools.endpoint().name, "Chapecó");
}

// --- GerarNfse ---

#[test]
fn issue_invoice_request() {
    let (mut tools, fake) = client();
    tools.issue_invoice(&rps(1)).unwrap();

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].operation, "GerarNfse");
    assert_eq!(requests[0].action, "GerarNfse");
    assert_eq!(requests[0].url, CHAPECO_HOMOLOGATION);
    assert_eq!(tools.last_request(), Some(&requests[0]));

    let sent = sent_message(&fake);
    let doc = xml::parse(&sent).unwrap();
    let message = doc.root_element();
    assert_eq!(message.tag_name().name(), "GerarNfseEnvio");
    assert_eq!(message.tag_name().namespace(), Some("http://www.publica.inf.br"));
    assert_eq!(child_names(xml::find(message, "Rps").unwrap()), ["InfRps", "Signature"]);
    assert_eq!(references(message), ["#rps1_A1"]);
}

#[test]
fn response_is_unwrapped() {
    let fake = FakeTransport::new().respond_with(
        "<S:Envelope xmlns:S=\"http://schemas.xmlsoap.org/soap/envelope/\"><S:Body>\
         <ns2:GerarNfseResponse xmlns:ns2=\"http://service.nfse.integracao.ws.publica/\">\
         <return>&lt;?xml version=\"1.0\" encoding=\"ISO-8859-1\"?&gt;&lt;GerarNfseResposta&gt;\
         &lt;Numero&gt;15&lt;/Numero&gt;&lt;/GerarNfseResposta&gt;</return>\
         </ns2:GerarNfseResponse></S:Body></S:Envelope>",
    );
    let mut tools = Tools::new(config(), certificate()).unwrap();
    tools.load_transport(fake);
    assert_eq!(
        tools.issue_invoice(&rps(1)).unwrap(),
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><GerarNfseResposta><Numero>15</Numero></GerarNfseResposta>"
    );
}

#[test]
fn schema_violation_is_not_sent() {
    let (mut tools, fake) = client();
    let mut bad = rps(1);
    bad.service.service_list_item = "0107-XYZ".into();

    match tools.issue_invoice(&bad) {
        Err(NfseError::SchemaValidationFailed(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].field.ends_with("ItemListaServico"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(fake.requests().is_empty());
    assert!(tools.last_request().is_none());
}

#[test]
fn custom_validator_replaces_schema() {
    let (mut tools, fake) = client();
    tools.set_schema_validator(AcceptAll);
    let mut bad = rps(1);
    bad.service.service_list_item = "0107-XYZ".into();
    tools.issue_invoice(&bad).unwrap();
    assert_eq!(fake.requests().len(), 1);
}

#[test]
fn missing_production_endpoint() {
    let mut cfg = config();
    cfg.cmun = "4204608".into();
    cfg.environment = Environment::Production;
    let fake = FakeTransport::new();
    let mut tools = Tools::new(cfg, certificate()).unwrap();
    tools.load_transport(fake.clone());

    assert!(matches!(
        tools.issue_invoice(&rps(1)),
        Err(NfseError::MissingEndpointForEnvironment { .. })
    ));
    assert!(fake.requests().is_empty());
}

#[test]
fn custom_signer_needs_a_transport() {
    let mut tools = Tools::with_signer(config(), CertificateSigner::new(certificate())).unwrap();
    assert!(matches!(
        tools.issue_invoice(&rps(1)),
        Err(NfseError::TransportFailure(_))
    ));
}

// --- RecepcionarLoteRps ---

#[test]
fn batch_request() {
    let (mut tools, fake) = client();
    tools.submit_batch(&[rps(1), rps(2)], 7).unwrap();
    assert_eq!(fake.last_request().unwrap().operation, "RecepcionarLoteRps");

    let sent = sent_message(&fake);
    let doc = xml::parse(&sent).unwrap();
    let message = doc.root_element();
    assert_eq!(message.tag_name().name(), "EnviarLoteRpsEnvio");
    assert_eq!(
        message.attribute(("http://www.w3.org/2001/XMLSchema-instance", "schemaLocation")),
        Some("http://www.publica.inf.br schema_nfse_v03.xsd")
    );
    assert_eq!(child_names(message), ["LoteRps", "Signature"]);

    let lote = xml::find(message, "LoteRps").unwrap();
    assert_eq!(lote.attribute("id"), Some("lote7"));
    assert_eq!(lote.attribute("versao"), Some("3.00"));
    assert_eq!(
        child_names(lote),
        ["NumeroLote", "Cnpj", "InscricaoMunicipal", "QuantidadeRps", "ListaRps"]
    );
    assert_eq!(text(lote, "QuantidadeRps"), "2");
    assert_eq!(references(message), ["#rps1_A1", "#rps2_A1", "#lote7"]);
}

#[test]
fn batch_of_fifty_is_accepted() {
    let (mut tools, fake) = client();
    let batch: Vec<Rps> = (1..=MAX_BATCH_SIZE as u64).map(rps).collect();
    tools.submit_batch(&batch, 1).unwrap();
    let sent = sent_message(&fake);
    let doc = xml::parse(&sent).unwrap();
    assert_eq!(references(doc.root_element()).len(), MAX_BATCH_SIZE + 1);
}

#[test]
fn batch_of_fifty_one_is_rejected_before_sending() {
    let (mut tools, fake) = client();
    let batch: Vec<Rps> = (1..=51).map(rps).collect();
    assert!(matches!(
        tools.submit_batch(&batch, 1),
        Err(NfseError::BatchSizeExceeded { count: 51, limit: 50 })
    ));
    assert!(fake.requests().is_empty());
}

#[test]
fn empty_batch_is_rejected() {
    let (mut tools, fake) = client();
    assert!(matches!(
        tools.submit_batch(&[], 1),
        Err(NfseError::InvalidRequest(_))
    ));
    assert!(fake.requests().is_empty());
}

#[test]
fn batch_with_repeated_rps_is_rejected() {
    let (mut tools, fake) = client();
    match tools.submit_batch(&[rps(1), rps(2), rps(1)], 3) {
        Err(NfseError::InvalidRequest(msg)) => assert!(msg.contains("RPS 1/A1"), "{msg}"),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(fake.requests().is_empty());
}

#[test]
fn batch_ids_stay_distinct_across_number_series_splits() {
    let (mut tools, fake) = client();
    tools
        .submit_batch(&[rps_in_series(1, "23"), rps_in_series(12, "3")], 4)
        .unwrap();

    let sent = sent_message(&fake);
    let doc = xml::parse(&sent).unwrap();
    let ids: Vec<_> = xml::find_all(doc.root_element(), "InfRps")
        .map(|inf| inf.attribute("id").unwrap())
        .collect();
    assert_eq!(ids, ["rps1_23", "rps12_3"]);
    assert_eq!(
        references(doc.root_element()),
        ["#rps1_23", "#rps12_3", "#lote4"]
    );
}

// --- Queries ---

#[test]
fn query_batch_request() {
    let (mut tools, fake) = client();
    tools.query_batch("PROT-123").unwrap();
    assert_eq!(fake.last_request().unwrap().operation, "ConsultarLoteRps");

    let sent = sent_message(&fake);
    let doc = xml::parse(&sent).unwrap();
    let message = doc.root_element();
    assert_eq!(child_names(message), ["Prestador", "Signature", "Protocolo"]);
    assert_eq!(text(message, "Protocolo"), "PROT-123");
    assert_eq!(references(message), ["#prestador"]);
}

#[test]
fn query_by_range_request() {
    let (mut tools, fake) = client();
    tools.query_by_range(10, 20).unwrap();
    assert_eq!(fake.last_request().unwrap().operation, "ConsultarNfseFaixa");

    let sent = sent_message(&fake);
    let doc = xml::parse(&sent).unwrap();
    let message = doc.root_element();
    assert_eq!(child_names(message), ["Prestador", "Signature", "Faixa"]);
    assert_eq!(text(message, "NumeroNfseInicial"), "10");
    assert_eq!(text(message, "NumeroNfseFinal"), "20");
}

#[test]
fn query_by_rps_id_request() {
    let (mut tools, fake) = client();
    tools.query_by_rps_id(15, "A1", RpsType::Rps).unwrap();
    assert_eq!(fake.last_request().unwrap().operation, "ConsultarNfsePorRps");

    let sent = sent_message(&fake);
    let doc = xml::parse(&sent).unwrap();
    let message = doc.root_element();
    assert_eq!(message.tag_name().name(), "ConsultarNfseRpsEnvio");
    assert_eq!(
        child_names(message),
        ["IdentificacaoRps", "Prestador", "Signature"]
    );
    assert_eq!(text(message, "Serie"), "A1");
}

// --- CancelarNfse ---

#[test]
fn cancel_with_reason() {
    let (mut tools, fake) = client();
    tools
        .cancel_invoice(123, CancellationCode::IssuanceError, Some("Valor incorreto"))
        .unwrap();
    assert_eq!(fake.last_request().unwrap().operation, "CancelarNfse");

    let sent = sent_message(&fake);
    let doc = xml::parse(&sent).unwrap();
    let message = doc.root_element();
    let pedido = xml::find(message, "Pedido").unwrap();
    assert_eq!(child_names(pedido), ["InfPedidoCancelamento", "Signature"]);
    let inf = xml::find(message, "InfPedidoCancelamento").unwrap();
    assert_eq!(inf.attribute("id"), Some("cancel123"));
    assert_eq!(text(inf, "Numero"), "123");
    assert_eq!(text(inf, "CodigoCancelamento"), "1");
    assert_eq!(
        text(inf, "MotivoCancelamento"),
        "Valor incorreto"
    );
    assert_eq!(references(message), ["#cancel123"]);
}

#[test]
fn cancel_reason_only_for_issuance_errors() {
    let (mut tools, fake) = client();
    tools
        .cancel_invoice(9, CancellationCode::Duplicate, Some("ignored"))
        .unwrap();
    let sent = sent_message(&fake);
    let doc = xml::parse(&sent).unwrap();
    let message = doc.root_element();
    assert_eq!(text(message, "CodigoCancelamento"), "4");
    assert!(xml::find(message, "MotivoCancelamento").is_none());
}

#[test]
fn cancel_without_required_reason() {
    let (mut tools, fake) = client();
    assert!(matches!(
        tools.cancel_invoice(9, CancellationCode::IssuanceError, None),
        Err(NfseError::InvalidRequest(_))
    ));
    assert!(fake.requests().is_empty());
}

// --- SubstituirNfse ---

#[test]
fn substitution_signs_three_elements_in_order() {
    let steps = Arc::new(Mutex::new(Vec::new()));
    let signer = RecordingSigner {
        inner: CertificateSigner::new(certificate()),
        steps: Arc::clone(&steps),
    };
    let fake = FakeTransport::new();
    let mut tools = Tools::with_signer(config(), signer).unwrap();
    tools.load_transport(fake.clone());

    tools
        .substitute_invoice(123, &rps(5), CancellationCode::ServiceNotProvided)
        .unwrap();
    assert_eq!(fake.last_request().unwrap().operation, "SubstituirNfse");
    assert_eq!(
        *steps.lock().unwrap(),
        ["InfRps", "InfPedidoCancelamento", "SubstituicaoNfse"]
    );

    let sent = sent_message(&fake);
    let doc = xml::parse(&sent).unwrap();
    let message = doc.root_element();
    assert_eq!(child_names(message), ["SubstituicaoNfse", "Signature"]);
    let substitution = xml::find(message, "SubstituicaoNfse").unwrap();
    assert_eq!(child_names(substitution), ["Pedido", "Rps"]);
    assert_eq!(
        text(message, "Numero"),
        "000000000000123"
    );
    assert_eq!(text(message, "CodigoCancelamento"), "2");

    let mut refs = references(message);
    refs.sort();
    assert_eq!(refs, ["#cancel", "#rps5_A1", "#subst"]);
}

// --- Transport failures ---

#[test]
fn transport_failure_reaches_the_caller() {
    let fake = FakeTransport::new().fail_with("SOAP fault: Certificado revogado");
    let mut tools = Tools::new(config(), certificate()).unwrap();
    tools.load_transport(fake.clone());

    match tools.cancel_invoice(9, CancellationCode::Duplicate, None) {
        Err(NfseError::TransportFailure(msg)) => {
            assert_eq!(msg, "SOAP fault: Certificado revogado");
        }
        other => panic!("unexpected: {other:?}"),
    }

    let last = tools.last_request().expect("request kept after a failed send");
    assert_eq!(last.operation, "CancelarNfse");
    assert_eq!(fake.requests(), [last.clone()]);
}
