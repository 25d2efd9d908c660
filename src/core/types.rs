use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::config::TaxId;

/// RPS — provisional service receipt submitted to request an NFSe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rps {
    /// Number, series and type of the receipt.
    pub identification: RpsIdentification,
    /// Issue date and time (DataEmissao).
    pub issue_date: NaiveDateTime,
    /// Natureza da operação (municipal code list, e.g. 1 = taxation in the municipality).
    pub operation_nature: u8,
    /// Regime especial de tributação.
    pub special_tax_regime: Option<u8>,
    /// Optante pelo Simples Nacional.
    pub simples_nacional: bool,
    /// Incentivador cultural.
    pub cultural_incentive: bool,
    pub status: RpsStatus,
    /// Competence date of the service.
    pub competence: Option<NaiveDate>,
    pub service: Service,
    /// Service recipient. Always rendered, possibly empty.
    pub tomador: Tomador,
    pub intermediary: Option<Intermediary>,
    pub construction: Option<CivilConstruction>,
}

impl Rps {
    /// Value of the `id` attribute of `InfRps`, the XML-DSig reference target.
    ///
    /// `rps{number}_{series}`, where every series character outside
    /// `[A-Za-z0-9]` is written as `-{hex code point}-`. Distinct
    /// number/series pairs never share an id, and the result is a valid
    /// `xs:ID`.
    pub fn reference_id(&self) -> String {
        let mut id = format!("rps{}_", self.identification.number);
        for c in self.identification.series.chars() {
            if c.is_ascii_alphanumeric() {
                id.push(c);
            } else {
                id.push_str(&format!("-{:x}-", u32::from(c)));
            }
        }
        id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpsIdentification {
    pub number: u64,
    pub series: String,
    pub rps_type: RpsType,
}

/// Tipo do RPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpsType {
    /// 1 — RPS.
    Rps,
    /// 2 — Nota fiscal conjugada (mista).
    Conjugated,
    /// 3 — Cupom.
    Coupon,
}

impl RpsType {
    pub fn code(&self) -> u8 {
        match self {
            Self::Rps => 1,
            Self::Conjugated => 2,
            Self::Coupon => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Rps),
            2 => Some(Self::Conjugated),
            3 => Some(Self::Coupon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpsStatus {
    /// 1 — Normal.
    Normal,
    /// 2 — Cancelado.
    Cancelled,
}

impl RpsStatus {
    pub fn code(&self) -> u8 {
        match self {
            Self::Normal => 1,
            Self::Cancelled => 2,
        }
    }
}

/// Description of the rendered service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub values: ServiceValues,
    /// Item of the federal service list (LC 116/2003), e.g. "11.01".
    pub service_list_item: String,
    pub cnae: Option<String>,
    /// Código de tributação do município.
    pub municipal_tax_code: Option<String>,
    /// Discriminação — free description of the service.
    pub description: String,
    pub complementary_info: Option<String>,
    /// IBGE code of the municipality where the service was rendered.
    pub municipality_code: String,
}

/// Values block. Only the service value and the ISS withholding flag are mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceValues {
    pub service_value: Decimal,
    pub deductions: Option<Decimal>,
    pub pis: Option<Decimal>,
    pub cofins: Option<Decimal>,
    pub inss: Option<Decimal>,
    pub ir: Option<Decimal>,
    pub csll: Option<Decimal>,
    /// ISS withheld by the recipient (IssRetido 1 = yes, 2 = no).
    pub iss_withheld: bool,
    pub iss: Option<Decimal>,
    pub iss_withheld_value: Option<Decimal>,
    pub other_withholdings: Option<Decimal>,
    pub calculation_base: Option<Decimal>,
    /// Tax rate, rendered as entered.
    pub rate: Option<Decimal>,
    pub net_value: Option<Decimal>,
    pub unconditional_discount: Option<Decimal>,
    pub conditional_discount: Option<Decimal>,
}

impl ServiceValues {
    pub fn new(service_value: Decimal, iss_withheld: bool) -> Self {
        Self {
            service_value,
            deductions: None,
            pis: None,
            cofins: None,
            inss: None,
            ir: None,
            csll: None,
            iss_withheld,
            iss: None,
            iss_withheld_value: None,
            other_withholdings: None,
            calculation_base: None,
            rate: None,
            net_value: None,
            unconditional_discount: None,
            conditional_discount: None,
        }
    }
}

/// Service recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tomador {
    pub tax_id: Option<TaxId>,
    pub municipal_registration: Option<String>,
    pub name: Option<String>,
    pub address: Option<Address>,
    pub contact: Option<Contact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub municipality_code: String,
    /// Federative unit (state), e.g. "SC".
    pub uf: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Service intermediary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intermediary {
    pub name: String,
    pub tax_id: TaxId,
    pub municipal_registration: Option<String>,
}

/// Civil construction block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CivilConstruction {
    pub work_code: Option<String>,
    /// Anotação de Responsabilidade Técnica.
    pub art: String,
}
