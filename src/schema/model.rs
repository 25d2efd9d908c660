//! Content model of `schema_nfse_v03.xsd` for the request messages.

/// Lexical constraint of a leaf element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleType {
    /// Free text, length counted in characters.
    Text { min: usize, max: usize },
    /// ASCII digits only.
    Digits { min: usize, max: usize },
    /// Up to 15 integer digits and 2 fraction digits.
    Amount,
    /// Up to 5 integer digits and 4 fraction digits.
    Rate,
    /// One of a closed list of codes.
    Codes(&'static [&'static str]),
    /// `YYYY-MM-DDTHH:MM:SS`.
    DateTime,
    /// `YYYY-MM-DD`.
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Content {
    Sequence(&'static [Particle]),
    Simple(SimpleType),
    /// Not inspected (XML-DSig `Signature`).
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Element(&'static str, Content),
    /// Exactly one of the alternatives.
    Choice(&'static [Particle]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Particle {
    pub term: Term,
    pub min: usize,
    pub max: usize,
}

macro_rules! el {
    ($name:literal, $content:expr) => {
        Particle {
            term: Term::Element($name, $content),
            min: 1,
            max: 1,
        }
    };
}

macro_rules! opt {
    ($name:literal, $content:expr) => {
        Particle {
            term: Term::Element($name, $content),
            min: 0,
            max: 1,
        }
    };
}

macro_rules! many {
    ($name:literal, $content:expr, $min:literal, $max:literal) => {
        Particle {
            term: Term::Element($name, $content),
            min: $min,
            max: $max,
        }
    };
}

macro_rules! choice {
    ($($alt:expr),+ $(,)?) => {
        Particle {
            term: Term::Choice(&[$($alt),+]),
            min: 1,
            max: 1,
        }
    };
}

const fn text(min: usize, max: usize) -> Content {
    Content::Simple(SimpleType::Text { min, max })
}

const fn digits(min: usize, max: usize) -> Content {
    Content::Simple(SimpleType::Digits { min, max })
}

const AMOUNT: Content = Content::Simple(SimpleType::Amount);
const YES_NO: Content = Content::Simple(SimpleType::Codes(&["1", "2"]));
const CNPJ: Content = digits(14, 14);
const CPF: Content = digits(11, 11);
const MUNICIPALITY: Content = digits(7, 7);
const IM: Content = text(1, 15);
const NFSE_NUMBER: Content = digits(1, 15);

const SIGNATURE: Particle = opt!("Signature", Content::Any);

const CPF_CNPJ: Content = Content::Sequence(&[choice!(el!("Cnpj", CNPJ), el!("Cpf", CPF))]);

const IDENTIFICACAO_RPS: Content = Content::Sequence(&[
    el!("Numero", NFSE_NUMBER),
    el!("Serie", text(1, 5)),
    el!("Tipo", Content::Simple(SimpleType::Codes(&["1", "2", "3"]))),
]);

const VALORES: Content = Content::Sequence(&[
    el!("ValorServicos", AMOUNT),
    opt!("ValorDeducoes", AMOUNT),
    opt!("ValorPis", AMOUNT),
    opt!("ValorCofins", AMOUNT),
    opt!("ValorInss", AMOUNT),
    opt!("ValorIr", AMOUNT),
    opt!("ValorCsll", AMOUNT),
    el!("IssRetido", YES_NO),
    opt!("ValorIss", AMOUNT),
    opt!("ValorIssRetido", AMOUNT),
    opt!("OutrasRetencoes", AMOUNT),
    opt!("BaseCalculo", AMOUNT),
    opt!("Aliquota", Content::Simple(SimpleType::Rate)),
    opt!("ValorLiquidoNfse", AMOUNT),
    opt!("DescontoIncondicionado", AMOUNT),
    opt!("DescontoCondicionado", AMOUNT),
]);

const SERVICO: Content = Content::Sequence(&[
    el!("Valores", VALORES),
    el!("ItemListaServico", text(1, 5)),
    opt!("CodigoCnae", digits(1, 7)),
    opt!("CodigoTributacaoMunicipio", text(1, 20)),
    el!("Discriminacao", text(1, 2000)),
    opt!("InformacoesComplementares", text(1, 2000)),
    el!("CodigoMunicipio", MUNICIPALITY),
]);

/// Issuer identity, with or without the `id` attribute used by queries.
const PRESTADOR: Content = Content::Sequence(&[el!("CpfCnpj", CPF_CNPJ), el!("InscricaoMunicipal", IM)]);

const ENDERECO: Content = Content::Sequence(&[
    el!("Endereco", text(1, 125)),
    el!("Numero", text(1, 10)),
    opt!("Complemento", text(1, 60)),
    el!("Bairro", text(1, 60)),
    el!("CodigoMunicipio", MUNICIPALITY),
    el!("Uf", text(2, 2)),
    el!("Cep", digits(8, 8)),
]);

const TOMADOR: Content = Content::Sequence(&[
    opt!(
        "IdentificacaoTomador",
        Content::Sequence(&[opt!("CpfCnpj", CPF_CNPJ), opt!("InscricaoMunicipal", IM)])
    ),
    opt!("RazaoSocial", text(1, 115)),
    opt!("Endereco", ENDERECO),
    opt!(
        "Contato",
        Content::Sequence(&[opt!("Telefone", text(1, 11)), opt!("Email", text(1, 80))])
    ),
]);

const INTERMEDIARIO: Content = Content::Sequence(&[
    el!("RazaoSocial", text(1, 115)),
    el!("CpfCnpj", CPF_CNPJ),
    opt!("InscricaoMunicipal", IM),
]);

const CONSTRUCAO_CIVIL: Content =
    Content::Sequence(&[opt!("CodigoObra", text(1, 15)), el!("Art", text(1, 15))]);

const INF_RPS: Content = Content::Sequence(&[
    el!("IdentificacaoRps", IDENTIFICACAO_RPS),
    el!("DataEmissao", Content::Simple(SimpleType::DateTime)),
    el!("NaturezaOperacao", digits(1, 2)),
    opt!("RegimeEspecialTributacao", digits(1, 2)),
    el!("OptanteSimplesNacional", YES_NO),
    el!("IncentivadorCultural", YES_NO),
    el!("Status", YES_NO),
    opt!("Competencia", Content::Simple(SimpleType::Date)),
    el!("Servico", SERVICO),
    el!("Prestador", PRESTADOR),
    el!("Tomador", TOMADOR),
    opt!("IntermediarioServico", INTERMEDIARIO),
    opt!("ConstrucaoCivil", CONSTRUCAO_CIVIL),
]);

const RPS: Content = Content::Sequence(&[el!("InfRps", INF_RPS), SIGNATURE]);

const LOTE_RPS: Content = Content::Sequence(&[
    el!("NumeroLote", NFSE_NUMBER),
    choice!(el!("Cnpj", CNPJ), el!("Cpf", CPF)),
    el!("InscricaoMunicipal", IM),
    el!("QuantidadeRps", digits(1, 4)),
    el!("ListaRps", Content::Sequence(&[many!("Rps", RPS, 1, 50)])),
]);

const INF_PEDIDO_CANCELAMENTO: Content = Content::Sequence(&[
    el!(
        "IdentificacaoNfse",
        Content::Sequence(&[
            el!("Numero", NFSE_NUMBER),
            choice!(el!("Cnpj", CNPJ), el!("Cpf", CPF)),
            el!("InscricaoMunicipal", IM),
            el!("CodigoMunicipio", MUNICIPALITY),
        ])
    ),
    el!(
        "CodigoCancelamento",
        Content::Simple(SimpleType::Codes(&["1", "2", "4"]))
    ),
    opt!("MotivoCancelamento", text(1, 255)),
]);

const PEDIDO: Content = Content::Sequence(&[
    el!("InfPedidoCancelamento", INF_PEDIDO_CANCELAMENTO),
    SIGNATURE,
]);

/// Request message roots and their content.
pub const MESSAGES: &[(&str, Content)] = &[
    ("GerarNfseEnvio", Content::Sequence(&[el!("Rps", RPS)])),
    (
        "EnviarLoteRpsEnvio",
        Content::Sequence(&[el!("LoteRps", LOTE_RPS), SIGNATURE]),
    ),
    (
        "ConsultarLoteRpsEnvio",
        Content::Sequence(&[
            el!("Prestador", PRESTADOR),
            SIGNATURE,
            el!("Protocolo", text(1, 50)),
        ]),
    ),
    (
        "ConsultarNfseFaixaEnvio",
        Content::Sequence(&[
            el!("Prestador", PRESTADOR),
            SIGNATURE,
            el!(
                "Faixa",
                Content::Sequence(&[
                    el!("NumeroNfseInicial", NFSE_NUMBER),
                    el!("NumeroNfseFinal", NFSE_NUMBER),
                ])
            ),
        ]),
    ),
    (
        "ConsultarNfseRpsEnvio",
        Content::Sequence(&[
            el!("IdentificacaoRps", IDENTIFICACAO_RPS),
            el!("Prestador", PRESTADOR),
            SIGNATURE,
        ]),
    ),
    ("CancelarNfseEnvio", Content::Sequence(&[el!("Pedido", PEDIDO)])),
    (
        "SubstituirNfseEnvio",
        Content::Sequence(&[
            el!(
                "SubstituicaoNfse",
                Content::Sequence(&[el!("Pedido", PEDIDO), el!("Rps", RPS)])
            ),
            SIGNATURE,
        ]),
    ),
];
