//! In-memory portal used by the session and orchestrator tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::driver::{BrowserLauncher, DriverResult, Locator, PortalDriver};
use super::selectors::*;
use super::signal::Interrupt;
use crate::error::DriverError;
use crate::models::config::BrowserConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct FakeElement {
    pub id: String,
    pub text: String,
    pub value: Option<String>,
}

impl FakeElement {
    pub fn new(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            value: None,
        }
    }

    pub fn input(id: &str, value: &str) -> Self {
        Self {
            id: id.to_string(),
            text: String::new(),
            value: Some(value.to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakePortal {
    pub elements: HashMap<String, FakeElement>,
    pub css: HashMap<String, Vec<FakeElement>>,
    pub tables: HashMap<String, Vec<Vec<String>>>,
    pub navigate_error: Option<String>,
    pub interrupt_on_click: Option<(String, Interrupt)>,
    /// Id lookups that still miss before the element shows up.
    pub pending_lookups: HashMap<String, usize>,

    pub visited: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub clicks: Vec<String>,
    pub closes: usize,
    pub launches: usize,
}

impl FakePortal {
    /// A complete receipt page for "Loja Teste" with one line item.
    pub fn receipt() -> Self {
        let mut portal = Self::default();

        portal.add(KEY_INPUT, "");
        portal.add(SUBMIT, "Consultar");

        portal.add(ISSUER_NAME, "Loja Teste");
        portal.add(ISSUER_CNPJ, "12.345.678/0001-90");
        portal.add(ISSUER_STATE_REGISTRATION, "123456789");
        portal.add(ISSUER_ADDRESS, "Rua das Flores, 100");
        portal.add(ISSUER_POSTAL_CODE, "01001-000");
        portal.add(ISSUER_REGION, "SAO PAULO - SP");
        portal.add(ISSUER_EXTRACT_NUMBER, "000123");

        portal.add(BUYER_TAX_ID, "123.456.789-00");

        portal.add(SUMMARY_TOTAL, "100,00");
        portal.add(SUMMARY_PAYMENT_METHOD, "Dinheiro");
        portal.add(SUMMARY_ISSUED_AT, "01/01/2024 - 10:00:00");

        portal.add(DETAILS_BUTTON, "Detalhes");

        portal.add(DELIVERY_TAB, "Emissão");
        portal.add(DELIVERY_ADDRESS, "Av. Paulista, 1000");
        portal.add(DELIVERY_MUNICIPALITY, "São Paulo");
        portal.add(DELIVERY_REGION, "SP");

        portal.add(PRODUCTS_TAB, "Produtos e Serviços");
        portal.add(PRODUCTS_TABLE, "");
        portal.tables.insert(
            PRODUCTS_TABLE.to_string(),
            vec![header_row(), cells_row("7891234567895", "208329")],
        );
        portal.add_row(0, "39174090", "EMENDA MANG FILTRO 1/4", "1,0000", "10,50");

        portal
    }

    pub fn add(&mut self, id: &str, text: &str) {
        self.elements
            .insert(id.to_string(), FakeElement::new(id, text));
    }

    pub fn remove(&mut self, id: &str) {
        self.elements.remove(id);
    }

    /// Make `id` render late: the first `lookups` lookups miss it.
    pub fn render_late(&mut self, id: &str, lookups: usize) {
        self.pending_lookups.insert(id.to_string(), lookups);
    }

    pub fn add_row(&mut self, index: usize, ncm: &str, desc: &str, qty: &str, net: &str) {
        self.add(&RowField::Ncm.id(index), ncm);
        self.add(&RowField::Description.id(index), desc);
        self.add(&RowField::Quantity.id(index), qty);
        self.add(&RowField::NetValue.id(index), net);
    }

    pub fn into_shared(self) -> Arc<Mutex<FakePortal>> {
        Arc::new(Mutex::new(self))
    }
}

pub fn header_row() -> Vec<String> {
    ["Código", "Descrição", "Qtd", "Un", "Valor", "Código Interno"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn cells_row(barcode: &str, code: &str) -> Vec<String> {
    vec![
        barcode.to_string(),
        "EMENDA".to_string(),
        "1,0000".to_string(),
        "UN".to_string(),
        "10,50".to_string(),
        code.to_string(),
    ]
}

pub struct FakeDriver {
    portal: Arc<Mutex<FakePortal>>,
}

#[async_trait]
impl PortalDriver for FakeDriver {
    type Element = FakeElement;

    async fn navigate(&self, url: &str, _timeout: Duration) -> DriverResult<()> {
        let mut portal = self.portal.lock().unwrap();
        if let Some(reason) = &portal.navigate_error {
            return Err(DriverError::Navigation(reason.clone()));
        }
        portal.visited.push(url.to_string());
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> DriverResult<Option<FakeElement>> {
        Ok(self.find_all(locator).await?.into_iter().next())
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<FakeElement>> {
        let mut portal = self.portal.lock().unwrap();
        Ok(match locator {
            Locator::Id(id) => {
                if let Some(pending) = portal.pending_lookups.get_mut(id).filter(|n| **n > 0) {
                    *pending -= 1;
                    return Ok(Vec::new());
                }
                portal.elements.get(id).cloned().into_iter().collect()
            }
            Locator::Css(selector) => portal.css.get(selector).cloned().unwrap_or_default(),
        })
    }

    async fn text(&self, element: &FakeElement) -> DriverResult<String> {
        Ok(element.text.trim().to_string())
    }

    async fn attribute(&self, element: &FakeElement, name: &str) -> DriverResult<Option<String>> {
        Ok(match name {
            "value" => element.value.clone(),
            "id" => Some(element.id.clone()),
            _ => None,
        })
    }

    async fn clear_and_type(&self, element: &FakeElement, text: &str) -> DriverResult<()> {
        let mut portal = self.portal.lock().unwrap();
        portal.typed.push((element.id.clone(), text.to_string()));
        Ok(())
    }

    async fn click(&self, element: &FakeElement) -> DriverResult<()> {
        let mut portal = self.portal.lock().unwrap();
        portal.clicks.push(element.id.clone());
        if let Some((id, interrupt)) = &portal.interrupt_on_click {
            if *id == element.id {
                interrupt.raise();
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&self, _element: &FakeElement) -> DriverResult<()> {
        Ok(())
    }

    async fn rows(&self, table: &FakeElement) -> DriverResult<Vec<Vec<String>>> {
        let portal = self.portal.lock().unwrap();
        Ok(portal.tables.get(&table.id).cloned().unwrap_or_default())
    }

    async fn close(&self) -> DriverResult<()> {
        self.portal.lock().unwrap().closes += 1;
        Ok(())
    }
}

pub struct FakeLauncher {
    pub portal: Arc<Mutex<FakePortal>>,
    pub fail: bool,
}

impl FakeLauncher {
    pub fn new(portal: FakePortal) -> Self {
        Self {
            portal: portal.into_shared(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            portal: FakePortal::default().into_shared(),
            fail: true,
        }
    }

    pub fn closes(&self) -> usize {
        self.portal.lock().unwrap().closes
    }

    pub fn clicks(&self) -> Vec<String> {
        self.portal.lock().unwrap().clicks.clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    type Driver = FakeDriver;

    async fn launch(&self, _config: &BrowserConfig) -> DriverResult<FakeDriver> {
        if self.fail {
            return Err(DriverError::Launch("no browser installed".to_string()));
        }
        self.portal.lock().unwrap().launches += 1;
        Ok(FakeDriver {
            portal: Arc::clone(&self.portal),
        })
    }
}
