//! Element ids of the SEFAZ-SP CF-e query portal.
//!
//! Some ids carry the portal's own misspellings (`Emintente`); they must be
//! kept as rendered.

// Query form
pub const KEY_INPUT: &str = "conteudo_txtChaveAcesso";
pub const SUBMIT: &str = "conteudo_btnConsultar";

// Issuer
pub const ISSUER_STATE_REGISTRATION: &str = "conteudo_lblIeEmitente";
pub const ISSUER_MUNICIPAL_REGISTRATION: &str = "conteudo_lblImEmintente";
pub const ISSUER_EXTRACT_NUMBER: &str = "conteudo_lblNumeroCfe";
pub const ISSUER_SAT_NUMBER: &str = "conteudo_lblRazaoSocial";
pub const ISSUER_NAME: &str = "conteudo_lblNomeEmitente";
pub const ISSUER_CNPJ: &str = "conteudo_lblCnpjEmitente";
pub const ISSUER_ADDRESS: &str = "conteudo_lblEnderecoEmintente";
pub const ISSUER_NEIGHBORHOOD: &str = "conteudo_lblBairroEmitente";
pub const ISSUER_POSTAL_CODE: &str = "conteudo_lblCepEmitente";
pub const ISSUER_REGION: &str = "conteudo_lblMunicipioEmitente";

// Buyer
pub const BUYER_TAX_ID: &str = "conteudo_lblCpfConsumidor";
pub const BUYER_NAME: &str = "conteudo_lblRazaoSocial";

// Summary
pub const SUMMARY_TOTAL: &str = "conteudo_lblTotal";
pub const SUMMARY_PAYMENT_METHOD: &str = "conteudo_DivMeiosPagamento";
pub const SUMMARY_CHANGE: &str = "CupomDetalhe2";
pub const SUMMARY_TAXES: &str = "conteudo_lblTotal12741";
pub const SUMMARY_ISSUED_AT: &str = "conteudo_lblDataEmissao";
pub const SUMMARY_QR_CODE: &str = "conteudo_lblIdCfe";

// Details view
pub const DETAILS_BUTTON: &str = "conteudo_btnDetalhes";
pub const DETAILS_LABEL: &str = "Detalhes";

// Delivery tab
pub const DELIVERY_TAB: &str = "conteudo_tabEmissao";
pub const DELIVERY_ADDRESS: &str = "conteudo_lblDadosLocalEntregaEndereco";
pub const DELIVERY_NEIGHBORHOOD: &str = "conteudo_lblDadosLocalEntregaBairro";
pub const DELIVERY_MUNICIPALITY: &str = "conteudo_lblDadosLocalEntregaMunicipio";
pub const DELIVERY_REGION: &str = "conteudo_lblDadosLocalEntregaUF";
pub const DELIVERY_DOCUMENT_NUMBER: &str = "conteudo_lblCfeNumero";
pub const DELIVERY_ACCESS_KEY: &str = "conteudo_lblChaveAcesso";

// Products tab
pub const PRODUCTS_TAB: &str = "conteudo_tabProdutoServico";
pub const PRODUCTS_TABLE: &str = "conteudo_grvProdutosServicos";

const ROW_PREFIX: &str = "conteudo_grvProdutosServicos_lblProdutoServico";

/// Per-row fields with their own element id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Ncm,
    Description,
    Quantity,
    NetValue,
}

impl RowField {
    fn suffix(self) -> &'static str {
        match self {
            Self::Ncm => "Ncm",
            Self::Description => "Desc",
            Self::Quantity => "Qtd",
            Self::NetValue => "IcmsValorLiquidoItem",
        }
    }

    /// Element id of this field in data row `index` (0-based).
    pub fn id(self, index: usize) -> String {
        format!("{}{}_{}", ROW_PREFIX, self.suffix(), index)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ncm => "NCM",
            Self::Description => "description",
            Self::Quantity => "quantity",
            Self::NetValue => "net value",
        }
    }
}

/// Barcode cell text meaning "no barcode".
pub const BARCODE_NOT_INFORMED: &str = "Não Informado";
