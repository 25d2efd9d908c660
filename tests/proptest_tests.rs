//! Property-based tests for rendering, schema conformance and the SOAP layer.

use chrono::NaiveDate;
use nfse_publica::core::*;
use nfse_publica::rps::to_rps_xml;
use nfse_publica::schema::validate_message;
use nfse_publica::soap::{build_envelope, unwrap_response};
use nfse_publica::xml;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn config() -> Config {
    Config::new(
        TaxId::Cnpj("99999999000191".into()),
        "1733160024",
        "4204202",
        "EMPRESA TEST LTDA",
        Environment::Homologation,
    )
}

fn gerar(rps: &Rps) -> String {
    format!(
        "<GerarNfseEnvio xmlns=\"http://www.publica.inf.br\">{}</GerarNfseEnvio>",
        to_rps_xml(&config(), rps).unwrap()
    )
}

// ── Proptest Strategies ─────────────────────────────────────────────────────

/// Amount between 0.01 and 9,999,999.99.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Rate with up to four decimal places, below 100.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000i64, 0u32..=4).prop_map(|(n, scale)| Decimal::new(n % 10i64.pow(2 + scale), scale))
}

fn arb_text(max: usize) -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("[a-zA-Z0-9][a-zA-Z0-9 &<>çãé]{{0,{}}}", max - 1)).unwrap()
}

prop_compose! {
    fn arb_rps()(
        number in 1u64..1_000_000_000,
        series in "[A-Z0-9]{1,5}",
        rps_type in prop_oneof![Just(RpsType::Rps), Just(RpsType::Conjugated), Just(RpsType::Coupon)],
        day in 1u32..=28,
        hour in 0u32..24,
        value in arb_amount(),
        iss in proptest::option::of((arb_amount(), arb_rate())),
        withheld in any::<bool>(),
        simples in any::<bool>(),
        description in arb_text(200),
        recipient in proptest::option::of(arb_text(115)),
        cancelled in any::<bool>(),
    ) -> Rps {
        let issued = NaiveDate::from_ymd_opt(2024, 2, day).unwrap().and_hms_opt(hour, 0, 0).unwrap();
        let mut service = ServiceBuilder::new("0107", description, "4204202", value).iss_withheld(withheld);
        if let Some((iss_value, rate)) = iss {
            service = service.iss(iss_value, rate);
        }
        let mut tomador = TomadorBuilder::new();
        if let Some(name) = recipient {
            tomador = tomador.name(name).tax_id(TaxId::Cpf("12345678909".into()));
        }
        RpsBuilder::new(number, series, issued)
            .rps_type(rps_type)
            .simples_nacional(simples)
            .status(if cancelled { RpsStatus::Cancelled } else { RpsStatus::Normal })
            .service(service.build())
            .tomador(tomador.build())
            .build()
            .unwrap()
    }
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn rendered_rps_conforms_to_schema(rps in arb_rps()) {
        let errors = validate_message(&gerar(&rps));
        prop_assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn rendering_is_deterministic(rps in arb_rps()) {
        prop_assert_eq!(gerar(&rps), gerar(&rps));
    }

    #[test]
    fn reference_id_matches_rendered_attribute(rps in arb_rps()) {
        let xml = to_rps_xml(&config(), &rps).unwrap();
        let expected = format!("<InfRps id=\"{}\">", rps.reference_id());
        prop_assert!(xml.contains(&expected));
    }

    #[test]
    fn envelope_preserves_message(message in "[a-zA-Z0-9 <>&/=\"']{0,64}") {
        let envelope = build_envelope("urn:e", "GerarNfse", &message);
        let doc = xml::parse(&envelope).unwrap();
        prop_assert_eq!(xml::text_content(xml::find(doc.root_element(), "XML").unwrap()), message);
    }

    #[test]
    fn text_without_markup_is_returned_verbatim(raw in "[^<]{0,64}") {
        prop_assert_eq!(unwrap_response(&raw), raw);
    }
}
