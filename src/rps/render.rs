use crate::core::*;
use crate::xml::{XmlResult, XmlWriter};

/// Render an RPS as the `<Rps>` fragment of the Publica schema.
///
/// Pure and deterministic: the same configuration and RPS always produce
/// the same bytes. Nothing is validated here; the composed message is checked
/// against the schema before it is sent.
pub fn to_rps_xml(config: &Config, rps: &Rps) -> XmlResult {
    let mut w = XmlWriter::new();
    let reference = rps.reference_id();

    w.start_element("Rps")?;
    w.start_element_with_attrs("InfRps", &[("id", reference.as_str())])?;

    let ident = &rps.identification;
    w.start_element("IdentificacaoRps")?;
    w.text_element("Numero", &ident.number.to_string())?;
    w.text_element("Serie", &ident.series)?;
    w.text_element("Tipo", &ident.rps_type.code().to_string())?;
    w.end_element("IdentificacaoRps")?;

    w.text_element(
        "DataEmissao",
        &rps.issue_date.format("%Y-%m-%dT%H:%M:%S").to_string(),
    )?;
    w.text_element("NaturezaOperacao", &rps.operation_nature.to_string())?;
    if let Some(regime) = rps.special_tax_regime {
        w.text_element("RegimeEspecialTributacao", &regime.to_string())?;
    }
    w.text_element("OptanteSimplesNacional", yes_no(rps.simples_nacional))?;
    w.text_element("IncentivadorCultural", yes_no(rps.cultural_incentive))?;
    w.text_element("Status", &rps.status.code().to_string())?;
    if let Some(competence) = &rps.competence {
        w.text_element("Competencia", &competence.format("%Y-%m-%d").to_string())?;
    }

    write_service(&mut w, &rps.service)?;

    w.start_element("Prestador")?;
    write_cpf_cnpj(&mut w, &config.tax_id)?;
    w.text_element("InscricaoMunicipal", &config.im)?;
    w.end_element("Prestador")?;

    write_tomador(&mut w, &rps.tomador)?;

    if let Some(intermediary) = &rps.intermediary {
        w.start_element("IntermediarioServico")?;
        w.text_element("RazaoSocial", &intermediary.name)?;
        write_cpf_cnpj(&mut w, &intermediary.tax_id)?;
        w.opt_text_element(
            "InscricaoMunicipal",
            intermediary.municipal_registration.as_deref(),
        )?;
        w.end_element("IntermediarioServico")?;
    }

    if let Some(construction) = &rps.construction {
        w.start_element("ConstrucaoCivil")?;
        w.opt_text_element("CodigoObra", construction.work_code.as_deref())?;
        w.text_element("Art", &construction.art)?;
        w.end_element("ConstrucaoCivil")?;
    }

    w.end_element("InfRps")?;
    w.end_element("Rps")?;
    w.into_string()
}

/// Render the issuer block used by the query messages (`<Prestador id="prestador">`).
pub fn to_prestador_xml(config: &Config) -> XmlResult {
    let mut w = XmlWriter::new();
    w.start_element_with_attrs("Prestador", &[("id", "prestador")])?;
    write_cpf_cnpj(&mut w, &config.tax_id)?;
    w.text_element("InscricaoMunicipal", &config.im)?;
    w.end_element("Prestador")?;
    w.into_string()
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "1" } else { "2" }
}

fn write_cpf_cnpj(w: &mut XmlWriter, tax_id: &TaxId) -> Result<(), NfseError> {
    w.start_element("CpfCnpj")?;
    w.text_element(tax_id.tag(), tax_id.value())?;
    w.end_element("CpfCnpj")?;
    Ok(())
}

fn write_service(w: &mut XmlWriter, service: &Service) -> Result<(), NfseError> {
    let v = &service.values;
    w.start_element("Servico")?;

    w.start_element("Valores")?;
    w.amount_element("ValorServicos", v.service_value)?;
    w.opt_amount_element("ValorDeducoes", v.deductions)?;
    w.opt_amount_element("ValorPis", v.pis)?;
    w.opt_amount_element("ValorCofins", v.cofins)?;
    w.opt_amount_element("ValorInss", v.inss)?;
    w.opt_amount_element("ValorIr", v.ir)?;
    w.opt_amount_element("ValorCsll", v.csll)?;
    w.text_element("IssRetido", yes_no(v.iss_withheld))?;
    w.opt_amount_element("ValorIss", v.iss)?;
    w.opt_amount_element("ValorIssRetido", v.iss_withheld_value)?;
    w.opt_amount_element("OutrasRetencoes", v.other_withholdings)?;
    w.opt_amount_element("BaseCalculo", v.calculation_base)?;
    // Rates keep the scale they were entered with.
    if let Some(rate) = v.rate {
        w.text_element("Aliquota", &rate.to_string())?;
    }
    w.opt_amount_element("ValorLiquidoNfse", v.net_value)?;
    w.opt_amount_element("DescontoIncondicionado", v.unconditional_discount)?;
    w.opt_amount_element("DescontoCondicionado", v.conditional_discount)?;
    w.end_element("Valores")?;

    w.text_element("ItemListaServico", &service.service_list_item)?;
    w.opt_text_element("CodigoCnae", service.cnae.as_deref())?;
    w.opt_text_element(
        "CodigoTributacaoMunicipio",
        service.municipal_tax_code.as_deref(),
    )?;
    w.text_element("Discriminacao", &service.description)?;
    w.opt_text_element(
        "InformacoesComplementares",
        service.complementary_info.as_deref(),
    )?;
    w.text_element("CodigoMunicipio", &service.municipality_code)?;

    w.end_element("Servico")?;
    Ok(())
}

fn write_tomador(w: &mut XmlWriter, tomador: &Tomador) -> Result<(), NfseError> {
    w.start_element("Tomador")?;

    if tomador.tax_id.is_some() || tomador.municipal_registration.is_some() {
        w.start_element("IdentificacaoTomador")?;
        if let Some(tax_id) = &tomador.tax_id {
            write_cpf_cnpj(w, tax_id)?;
        }
        w.opt_text_element(
            "InscricaoMunicipal",
            tomador.municipal_registration.as_deref(),
        )?;
        w.end_element("IdentificacaoTomador")?;
    }

    w.opt_text_element("RazaoSocial", tomador.name.as_deref())?;

    if let Some(addr) = &tomador.address {
        w.start_element("Endereco")?;
        w.text_element("Endereco", &addr.street)?;
        w.text_element("Numero", &addr.number)?;
        w.opt_text_element("Complemento", addr.complement.as_deref())?;
        w.text_element("Bairro", &addr.district)?;
        w.text_element("CodigoMunicipio", &addr.municipality_code)?;
        w.text_element("Uf", &addr.uf)?;
        w.text_element("Cep", &addr.postal_code)?;
        w.end_element("Endereco")?;
    }

    if let Some(contact) = tomador
        .contact
        .as_ref()
        .filter(|c| c.phone.is_some() || c.email.is_some())
    {
        w.start_element("Contato")?;
        w.opt_text_element("Telefone", contact.phone.as_deref())?;
        w.opt_text_element("Email", contact.email.as_deref())?;
        w.end_element("Contato")?;
    }

    w.end_element("Tomador")?;
    Ok(())
}
