//! Field extraction from the rendered result pages.
//!
//! Every reader here absorbs missing elements: a field that cannot be read is
//! `None` (or its fallback, for line-item fields) and extraction carries on.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::driver::{Locator, PortalDriver};
use super::selectors::*;
use crate::models::config::{
    BuyerFields, DeliveryFields, IssuerFields, ItemColumns, ItemFields, SummaryFields,
};
use crate::models::receipt::{
    Buyer, DeliveryLocation, Issuer, LineItem, RawLineItem, ReceiptSummary,
};

const FALLBACK_NCM: &str = "00000000";
const FALLBACK_QUANTITY: &str = "1,0000";
const FALLBACK_NET_VALUE: &str = "0,00";

/// Text of the element with `id`, `None` when absent or blank.
pub async fn read_text<D: PortalDriver>(driver: &D, id: &str) -> Option<String> {
    let element = match driver.find(&Locator::id(id)).await {
        Ok(Some(element)) => element,
        Ok(None) => {
            debug!("Element {} not present", id);
            return None;
        }
        Err(e) => {
            warn!("Failed to look up {}: {}", id, e);
            return None;
        }
    };

    match driver.text(&element).await {
        Ok(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        Err(e) => {
            warn!("Failed to read {}: {}", id, e);
            None
        }
    }
}

async fn field<D: PortalDriver>(driver: &D, enabled: bool, id: &str) -> Option<String> {
    if enabled {
        read_text(driver, id).await
    } else {
        None
    }
}

pub async fn read_issuer<D: PortalDriver>(driver: &D, fields: &IssuerFields) -> Issuer {
    Issuer {
        state_registration: field(driver, fields.state_registration, ISSUER_STATE_REGISTRATION)
            .await,
        municipal_registration: field(
            driver,
            fields.municipal_registration,
            ISSUER_MUNICIPAL_REGISTRATION,
        )
        .await,
        extract_number: field(driver, fields.extract_number, ISSUER_EXTRACT_NUMBER).await,
        sat_number: field(driver, fields.sat_number, ISSUER_SAT_NUMBER).await,
        name: field(driver, fields.name, ISSUER_NAME).await,
        cnpj: field(driver, fields.cnpj, ISSUER_CNPJ).await,
        address: field(driver, fields.address, ISSUER_ADDRESS).await,
        neighborhood: field(driver, fields.neighborhood, ISSUER_NEIGHBORHOOD).await,
        postal_code: field(driver, fields.postal_code, ISSUER_POSTAL_CODE).await,
        region: field(driver, fields.region, ISSUER_REGION).await,
    }
}

/// `None` when the entity is disabled or nothing was found.
pub async fn read_buyer<D: PortalDriver>(driver: &D, fields: &BuyerFields) -> Option<Buyer> {
    if !fields.active {
        return None;
    }

    let buyer = Buyer {
        tax_id: field(driver, fields.tax_id, BUYER_TAX_ID).await,
        name: field(driver, fields.name, BUYER_NAME).await,
    };

    if buyer.is_present() {
        Some(buyer)
    } else {
        debug!("No buyer on this receipt");
        None
    }
}

pub async fn read_summary<D: PortalDriver>(driver: &D, fields: &SummaryFields) -> ReceiptSummary {
    ReceiptSummary {
        total: field(driver, fields.total, SUMMARY_TOTAL).await,
        payment_method: field(driver, fields.payment_method, SUMMARY_PAYMENT_METHOD).await,
        change: field(driver, fields.change, SUMMARY_CHANGE).await,
        taxes: field(driver, fields.taxes, SUMMARY_TAXES).await,
        issued_at: field(driver, fields.issued_at, SUMMARY_ISSUED_AT).await,
        qr_code: field(driver, fields.qr_code, SUMMARY_QR_CODE).await,
    }
}

/// Read the delivery tab, already activated by the caller.
pub async fn read_delivery<D: PortalDriver>(
    driver: &D,
    fields: &DeliveryFields,
) -> Option<DeliveryLocation> {
    let delivery = DeliveryLocation {
        address: field(driver, fields.address, DELIVERY_ADDRESS).await,
        neighborhood: field(driver, fields.neighborhood, DELIVERY_NEIGHBORHOOD).await,
        municipality: field(driver, fields.municipality, DELIVERY_MUNICIPALITY).await,
        region: field(driver, fields.region, DELIVERY_REGION).await,
        document_number: field(driver, fields.document_number, DELIVERY_DOCUMENT_NUMBER).await,
        access_key: field(driver, fields.access_key, DELIVERY_ACCESS_KEY).await,
    };

    if delivery.is_present() {
        Some(delivery)
    } else {
        debug!("Delivery tab holds no address");
        None
    }
}

/// Read the products table, already visible. Invalid rows are dropped.
pub async fn read_items<D: PortalDriver>(
    driver: &D,
    fields: &ItemFields,
    columns: &ItemColumns,
    timeout: Duration,
) -> Vec<LineItem> {
    let table = match driver.wait_for(&Locator::id(PRODUCTS_TABLE), timeout).await {
        Ok(Some(table)) => table,
        Ok(None) => {
            warn!("Products table not found, no line items extracted");
            return Vec::new();
        }
        Err(e) => {
            warn!("Failed to look up products table: {}", e);
            return Vec::new();
        }
    };

    let rows = match driver.rows(&table).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Failed to read products table: {}", e);
            return Vec::new();
        }
    };

    let data_rows = rows.len().saturating_sub(1);
    let mut items = Vec::with_capacity(data_rows);

    for (index, cells) in rows.iter().skip(1).enumerate() {
        let raw = read_row(driver, fields, columns, index, cells).await;
        match LineItem::from_raw(raw) {
            Ok(item) => items.push(item),
            Err(issues) => {
                let issues: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
                warn!("Dropping line item {}: {}", index + 1, issues.join("; "));
            }
        }
    }

    info!("Extracted {} of {} line items", items.len(), data_rows);
    items
}

async fn row_field<D: PortalDriver>(
    driver: &D,
    enabled: bool,
    field: RowField,
    index: usize,
    fallback: String,
) -> String {
    if !enabled {
        return fallback;
    }

    match read_text(driver, &field.id(index)).await {
        Some(text) => text,
        None => {
            warn!(
                "Line item {}: {} not found, using {:?}",
                index + 1,
                field.name(),
                fallback
            );
            fallback
        }
    }
}

async fn read_row<D: PortalDriver>(
    driver: &D,
    fields: &ItemFields,
    columns: &ItemColumns,
    index: usize,
    cells: &[String],
) -> RawLineItem {
    let ncm = row_field(driver, fields.ncm, RowField::Ncm, index, FALLBACK_NCM.into()).await;
    let description = row_field(
        driver,
        fields.description,
        RowField::Description,
        index,
        format!("Produto {}", index + 1),
    )
    .await;
    let quantity = row_field(
        driver,
        fields.quantity,
        RowField::Quantity,
        index,
        FALLBACK_QUANTITY.into(),
    )
    .await;
    let net_value = row_field(
        driver,
        fields.net_value,
        RowField::NetValue,
        index,
        FALLBACK_NET_VALUE.into(),
    )
    .await;

    let cell = |column: usize| {
        cells
            .get(column)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    };

    let barcode = cell(columns.barcode_column).filter(|c| c != BARCODE_NOT_INFORMED);

    let product_code = match cell(columns.product_code_column) {
        Some(code) => code,
        None => {
            debug!("Line item {}: no product code cell, using NCM", index + 1);
            ncm.clone()
        }
    };

    RawLineItem {
        ncm,
        total_value: net_value.clone(),
        net_value,
        product_code,
        barcode,
        description: Some(description),
        quantity: Some(quantity),
    }
}
