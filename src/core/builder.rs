use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use super::config::TaxId;
use super::error::NfseError;
use super::types::*;

/// Builder for constructing RPS documents.
///
/// ```
/// use nfse_publica::core::*;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let issued = NaiveDate::from_ymd_opt(2018, 10, 31).unwrap().and_hms_opt(21, 0, 0).unwrap();
/// let rps = RpsBuilder::new(1, "A1", issued)
///     .service(ServiceBuilder::new("11.01", "Teste de RPS", "3106200", dec!(100.00)).build())
///     .tomador(TomadorBuilder::new()
///         .tax_id(TaxId::Cnpj("99999999000191".into()))
///         .name("Fulano de Tal")
///         .build())
///     .build()
///     .unwrap();
/// assert_eq!(rps.reference_id(), "rps1_A1");
/// ```
pub struct RpsBuilder {
    number: u64,
    series: String,
    rps_type: RpsType,
    issue_date: NaiveDateTime,
    operation_nature: u8,
    special_tax_regime: Option<u8>,
    simples_nacional: bool,
    cultural_incentive: bool,
    status: RpsStatus,
    competence: Option<NaiveDate>,
    service: Option<Service>,
    tomador: Tomador,
    intermediary: Option<Intermediary>,
    construction: Option<CivilConstruction>,
}

impl RpsBuilder {
    pub fn new(number: u64, series: impl Into<String>, issue_date: NaiveDateTime) -> Self {
        Self {
            number,
            series: series.into(),
            rps_type: RpsType::Rps,
            issue_date,
            operation_nature: 1,
            special_tax_regime: None,
            simples_nacional: false,
            cultural_incentive: false,
            status: RpsStatus::Normal,
            competence: None,
            service: None,
            tomador: Tomador::default(),
            intermediary: None,
            construction: None,
        }
    }

    pub fn rps_type(mut self, rps_type: RpsType) -> Self {
        self.rps_type = rps_type;
        self
    }

    pub fn operation_nature(mut self, code: u8) -> Self {
        self.operation_nature = code;
        self
    }

    pub fn special_tax_regime(mut self, code: u8) -> Self {
        self.special_tax_regime = Some(code);
        self
    }

    pub fn simples_nacional(mut self, optant: bool) -> Self {
        self.simples_nacional = optant;
        self
    }

    pub fn cultural_incentive(mut self, incentive: bool) -> Self {
        self.cultural_incentive = incentive;
        self
    }

    pub fn status(mut self, status: RpsStatus) -> Self {
        self.status = status;
        self
    }

    pub fn competence(mut self, date: NaiveDate) -> Self {
        self.competence = Some(date);
        self
    }

    pub fn service(mut self, service: Service) -> Self {
        self.service = Some(service);
        self
    }

    pub fn tomador(mut self, tomador: Tomador) -> Self {
        self.tomador = tomador;
        self
    }

    pub fn intermediary(
        mut self,
        name: impl Into<String>,
        tax_id: TaxId,
        municipal_registration: Option<String>,
    ) -> Self {
        self.intermediary = Some(Intermediary {
            name: name.into(),
            tax_id,
            municipal_registration,
        });
        self
    }

    pub fn construction(mut self, work_code: Option<String>, art: impl Into<String>) -> Self {
        self.construction = Some(CivilConstruction {
            work_code,
            art: art.into(),
        });
        self
    }

    pub fn build(self) -> Result<Rps, NfseError> {
        let service = self
            .service
            .ok_or_else(|| NfseError::InvalidRequest("service is required".into()))?;

        if self.series.trim().is_empty() {
            return Err(NfseError::InvalidRequest("RPS series is required".into()));
        }

        Ok(Rps {
            identification: RpsIdentification {
                number: self.number,
                series: self.series,
                rps_type: self.rps_type,
            },
            issue_date: self.issue_date,
            operation_nature: self.operation_nature,
            special_tax_regime: self.special_tax_regime,
            simples_nacional: self.simples_nacional,
            cultural_incentive: self.cultural_incentive,
            status: self.status,
            competence: self.competence,
            service,
            tomador: self.tomador,
            intermediary: self.intermediary,
            construction: self.construction,
        })
    }
}

/// Builder for the service block.
pub struct ServiceBuilder {
    values: ServiceValues,
    service_list_item: String,
    cnae: Option<String>,
    municipal_tax_code: Option<String>,
    description: String,
    complementary_info: Option<String>,
    municipality_code: String,
}

impl ServiceBuilder {
    pub fn new(
        service_list_item: impl Into<String>,
        description: impl Into<String>,
        municipality_code: impl Into<String>,
        service_value: Decimal,
    ) -> Self {
        Self {
            values: ServiceValues::new(service_value, false),
            service_list_item: service_list_item.into(),
            cnae: None,
            municipal_tax_code: None,
            description: description.into(),
            complementary_info: None,
            municipality_code: municipality_code.into(),
        }
    }

    /// Replace the whole values block.
    pub fn values(mut self, values: ServiceValues) -> Self {
        self.values = values;
        self
    }

    pub fn iss_withheld(mut self, withheld: bool) -> Self {
        self.values.iss_withheld = withheld;
        self
    }

    pub fn iss(mut self, value: Decimal, rate: Decimal) -> Self {
        self.values.iss = Some(value);
        self.values.rate = Some(rate);
        self
    }

    pub fn deductions(mut self, value: Decimal) -> Self {
        self.values.deductions = Some(value);
        self
    }

    pub fn cnae(mut self, cnae: impl Into<String>) -> Self {
        self.cnae = Some(cnae.into());
        self
    }

    pub fn municipal_tax_code(mut self, code: impl Into<String>) -> Self {
        self.municipal_tax_code = Some(code.into());
        self
    }

    pub fn complementary_info(mut self, info: impl Into<String>) -> Self {
        self.complementary_info = Some(info.into());
        self
    }

    pub fn build(self) -> Service {
        Service {
            values: self.values,
            service_list_item: self.service_list_item,
            cnae: self.cnae,
            municipal_tax_code: self.municipal_tax_code,
            description: self.description,
            complementary_info: self.complementary_info,
            municipality_code: self.municipality_code,
        }
    }
}

/// Builder for the service recipient.
#[derive(Default)]
pub struct TomadorBuilder {
    tomador: Tomador,
}

impl TomadorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tax_id(mut self, tax_id: TaxId) -> Self {
        self.tomador.tax_id = Some(tax_id);
        self
    }

    pub fn municipal_registration(mut self, im: impl Into<String>) -> Self {
        self.tomador.municipal_registration = Some(im.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.tomador.name = Some(name.into());
        self
    }

    pub fn address(mut self, address: Address) -> Self {
        self.tomador.address = Some(address);
        self
    }

    pub fn contact(mut self, phone: Option<String>, email: Option<String>) -> Self {
        self.tomador.contact = Some(Contact { phone, email });
        self
    }

    pub fn build(self) -> Tomador {
        self.tomador
    }
}

/// Builder for Address.
pub struct AddressBuilder {
    street: String,
    number: String,
    complement: Option<String>,
    district: String,
    municipality_code: String,
    uf: String,
    postal_code: String,
}

impl AddressBuilder {
    pub fn new(
        street: impl Into<String>,
        number: impl Into<String>,
        district: impl Into<String>,
        municipality_code: impl Into<String>,
        uf: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            number: number.into(),
            complement: None,
            district: district.into(),
            municipality_code: municipality_code.into(),
            uf: uf.into(),
            postal_code: postal_code.into(),
        }
    }

    pub fn complement(mut self, complement: impl Into<String>) -> Self {
        self.complement = Some(complement.into());
        self
    }

    pub fn build(self) -> Address {
        Address {
            street: self.street,
            number: self.number,
            complement: self.complement,
            district: self.district,
            municipality_code: self.municipality_code,
            uf: self.uf,
            postal_code: self.postal_code,
        }
    }
}
