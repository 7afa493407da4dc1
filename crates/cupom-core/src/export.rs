//! Flat tabular export of receipt records.
//!
//! A record fans out to one row per line item, each repeating the issuer,
//! buyer, summary and delivery columns. A record without items still yields a
//! single row. Absent values are written as [`SENTINEL`].

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::ExportError;
use crate::models::config::ExportConfig;
use crate::models::receipt::{LineItem, ReceiptRecord};
use crate::rules::amounts::format_brl_amount;

/// Placeholder written for every absent value.
pub const SENTINEL: &str = "N/A";

/// Column names, in output order.
pub const HEADER: [&str; 30] = [
    "Emitente_Nome",
    "Emitente_CNPJ",
    "Emitente_IE",
    "Emitente_IM",
    "Emitente_Endereco",
    "Emitente_Bairro",
    "Emitente_CEP",
    "Emitente_UF",
    "Emitente_Extrato_Numero",
    "Emitente_SAT_Numero",
    "Consumidor_Nome",
    "Consumidor_CPF_CNPJ",
    "Cupom_Total",
    "Cupom_Data_Hora",
    "Cupom_Forma_Pagamento",
    "Cupom_Troco",
    "Cupom_Tributos",
    "Cupom_QR_Code",
    "Entrega_Endereco",
    "Entrega_Bairro",
    "Entrega_Municipio",
    "Entrega_UF",
    "Entrega_Numero_CFe",
    "Entrega_Chave_Acesso",
    "Produto_Descricao",
    "Produto_NCM",
    "Produto_Quantidade",
    "Produto_Valor_Liquido",
    "Produto_Valor_Total",
    "Produto_Cod_GTIN",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn cell(value: Option<&String>) -> String {
    value.cloned().unwrap_or_else(|| SENTINEL.to_string())
}

/// Columns shared by every row of a record.
fn header_cells(record: &ReceiptRecord) -> Vec<String> {
    let issuer = record.issuer();
    let summary = record.summary();
    let buyer = record.buyer();
    let delivery = record.delivery();

    vec![
        cell(issuer.name.as_ref()),
        cell(issuer.cnpj.as_ref()),
        cell(issuer.state_registration.as_ref()),
        cell(issuer.municipal_registration.as_ref()),
        cell(issuer.address.as_ref()),
        cell(issuer.neighborhood.as_ref()),
        cell(issuer.postal_code.as_ref()),
        cell(issuer.region.as_ref()),
        cell(issuer.extract_number.as_ref()),
        cell(issuer.sat_number.as_ref()),
        cell(buyer.and_then(|b| b.name.as_ref())),
        cell(buyer.and_then(|b| b.tax_id.as_ref())),
        cell(summary.total.as_ref()),
        cell(summary.issued_at.as_ref()),
        cell(summary.payment_method.as_ref()),
        cell(summary.change.as_ref()),
        cell(summary.taxes.as_ref()),
        cell(summary.qr_code.as_ref()),
        cell(delivery.and_then(|d| d.address.as_ref())),
        cell(delivery.and_then(|d| d.neighborhood.as_ref())),
        cell(delivery.and_then(|d| d.municipality.as_ref())),
        cell(delivery.and_then(|d| d.region.as_ref())),
        cell(delivery.and_then(|d| d.document_number.as_ref())),
        cell(delivery.and_then(|d| d.access_key.as_ref())),
    ]
}

fn item_cells(item: Option<&LineItem>) -> Vec<String> {
    let Some(item) = item else {
        return vec![SENTINEL.to_string(); 6];
    };

    vec![
        cell(item.description.as_ref()),
        item.ncm.clone(),
        item.quantity
            .map(|q| q.to_string().replace('.', ","))
            .unwrap_or_else(|| SENTINEL.to_string()),
        format_brl_amount(item.net_value),
        format_brl_amount(item.total_value),
        cell(item.barcode.as_ref()),
    ]
}

/// Data rows of a record, without the header.
pub fn rows(record: &ReceiptRecord) -> Vec<Vec<String>> {
    let shared = header_cells(record);

    if record.items().is_empty() {
        let mut row = shared;
        row.extend(item_cells(None));
        return vec![row];
    }

    record
        .items()
        .iter()
        .map(|item| {
            let mut row = shared.clone();
            row.extend(item_cells(Some(item)));
            row
        })
        .collect()
}

fn delimiter_byte(delimiter: char) -> Result<u8, ExportError> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(ExportError::Delimiter(delimiter))
}

/// Write header and rows to `writer`.
pub fn write_csv<W: Write>(
    writer: W,
    record: &ReceiptRecord,
    delimiter: char,
) -> Result<(), ExportError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .from_writer(writer);

    wtr.write_record(HEADER)?;
    for row in rows(record) {
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Header and rows as a CSV string.
pub fn to_csv_string(record: &ReceiptRecord, delimiter: char) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, record, delimiter)?;
    String::from_utf8(buffer)
        .map_err(|e| ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Writes records to CSV files in the configured output directory.
#[derive(Debug, Clone, Default)]
pub struct CsvExporter {
    config: ExportConfig,
}

impl CsvExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// `cupom_<issuer CNPJ digits>_<timestamp>.csv`, or `sem_cnpj` without a CNPJ.
    pub fn default_file_name(record: &ReceiptRecord, now: DateTime<Local>) -> String {
        let cnpj: String = record
            .issuer()
            .cnpj
            .as_deref()
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let cnpj = if cnpj.is_empty() { "sem_cnpj".to_string() } else { cnpj };

        format!("cupom_{}_{}.csv", cnpj, now.format("%Y%m%d_%H%M%S"))
    }

    /// Write `record` and return the file path.
    pub fn export(
        &self,
        record: &ReceiptRecord,
        file_name: Option<&str>,
    ) -> Result<PathBuf, ExportError> {
        let file_name = match file_name {
            Some(name) if name.ends_with(".csv") => name.to_string(),
            Some(name) => format!("{}.csv", name),
            None => Self::default_file_name(record, Local::now()),
        };

        fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join(file_name);

        let mut file = File::create(&path)?;
        if self.config.write_bom {
            file.write_all(UTF8_BOM)?;
        }
        write_csv(file, record, self.config.delimiter)?;

        info!("Wrote {} rows to {}", rows(record).len(), path.display());
        Ok(path)
    }
}
