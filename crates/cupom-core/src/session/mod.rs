//! Interactive extraction session against the CF-e query portal.
//!
//! A session drives one browser through a fixed sequence of screens, waits for
//! the operator to solve the portal's challenge, and reads the receipt into a
//! [`ReceiptRecord`]. The browser is closed exactly once on every exit path.

mod driver;
mod extract;
mod lookup;
pub(crate) mod selectors;
mod signal;

#[cfg(feature = "browser")]
mod chromium;

#[cfg(test)]
pub(crate) mod fake;

pub use driver::{BrowserLauncher, DriverResult, Locator, POLL_INTERVAL, PortalDriver};
pub use lookup::{Strategy, details_strategies, first_match};
pub use signal::{ChallengeSignal, Interrupt, OperatorSignal};

#[cfg(feature = "browser")]
pub use chromium::{ChromiumDriver, ChromiumLauncher};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{DriverError, SessionError};
use crate::models::config::CupomConfig;
use crate::models::receipt::{AccessKey, DeliveryLocation, ReceiptRecord};

/// Result type for sessions.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Position of a session in the portal protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    Initializing,
    PortalLoaded,
    KeyEntered,
    AwaitingManualChallenge,
    Queried,
    SummaryScreenRead,
    DetailsOpened,
    DeliveryTabRead,
    ProductsTabOpened,
    ProductsExtracted,
    Completed,
}

impl SessionState {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Initializing => "starting browser",
            Self::PortalLoaded => "portal loaded",
            Self::KeyEntered => "access key entered",
            Self::AwaitingManualChallenge => "waiting for the operator",
            Self::Queried => "query submitted",
            Self::SummaryScreenRead => "summary read",
            Self::DetailsOpened => "details opened",
            Self::DeliveryTabRead => "delivery tab read",
            Self::ProductsTabOpened => "products tab opened",
            Self::ProductsExtracted => "line items read",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One extraction of one receipt.
pub struct ReceiptExtractionSession<L, C> {
    config: Arc<CupomConfig>,
    launcher: Arc<L>,
    challenge: Arc<C>,
    interrupt: Interrupt,
    state: Arc<watch::Sender<SessionState>>,
}

impl<L, C> ReceiptExtractionSession<L, C>
where
    L: BrowserLauncher,
    C: ChallengeSignal,
{
    pub fn new(config: Arc<CupomConfig>, launcher: Arc<L>, challenge: Arc<C>) -> Self {
        let (state, _rx) = watch::channel(SessionState::Initializing);
        Self {
            config,
            launcher,
            challenge,
            interrupt: Interrupt::new(),
            state: Arc::new(state),
        }
    }

    /// Share an interrupt with the caller.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Publish state changes on an existing channel.
    pub fn with_state_sender(mut self, state: Arc<watch::Sender<SessionState>>) -> Self {
        self.state = state;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Run the full protocol for `key`.
    pub async fn run(&self, key: &AccessKey) -> Result<ReceiptRecord> {
        self.state.send_replace(SessionState::Initializing);
        if self.interrupt.is_raised() {
            return Err(SessionError::Interrupted {
                state: SessionState::Initializing,
            });
        }

        info!("Starting extraction for {}", key.abbreviated());
        let driver = self
            .launcher
            .launch(&self.config.browser)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        let outcome = tokio::select! {
            biased;
            _ = self.interrupt.raised() => Err(SessionError::Interrupted { state: self.state() }),
            result = self.drive(&driver, key) => result,
        };

        if let Err(e) = driver.close().await {
            warn!("Failed to close browser: {}", e);
        }

        match &outcome {
            Ok(record) => info!("Extraction completed with {} items", record.items().len()),
            Err(e) => warn!("Extraction failed during {}: {}", self.state(), e),
        }
        outcome
    }

    /// Record a completed step. Fails if an interrupt is pending.
    fn advance(&self, state: SessionState) -> Result<()> {
        debug!("Session state: {}", state);
        self.state.send_replace(state);
        if self.interrupt.is_raised() {
            return Err(SessionError::Interrupted { state });
        }
        Ok(())
    }

    async fn drive<D: PortalDriver>(&self, driver: &D, key: &AccessKey) -> Result<ReceiptRecord> {
        let portal = &self.config.portal;
        let fields = &self.config.fields;

        // Portal
        driver
            .navigate(&portal.url, portal.page_load_timeout())
            .await
            .map_err(|e| SessionError::PortalUnreachable {
                url: portal.url.clone(),
                reason: e.to_string(),
            })?;
        self.advance(SessionState::PortalLoaded)?;

        // Key
        let input = driver
            .wait_for(&Locator::id(selectors::KEY_INPUT), portal.timeout())
            .await?
            .ok_or_else(|| SessionError::FieldNotFound(selectors::KEY_INPUT.to_string()))?;
        driver.clear_and_type(&input, key.as_str()).await?;
        self.advance(SessionState::KeyEntered)?;

        // Challenge
        self.advance(SessionState::AwaitingManualChallenge)?;
        info!("Waiting for the operator to solve the challenge");
        self.challenge
            .wait_for_confirmation(key)
            .await
            .map_err(SessionError::ChallengeAborted)?;
        settle(portal.challenge_settle_ms).await;

        // Query
        let submit = driver
            .wait_for(&Locator::id(selectors::SUBMIT), portal.timeout())
            .await?
            .ok_or(SessionError::SubmitNotFound)?;
        driver.click(&submit).await.map_err(|e| match e {
            DriverError::Timeout(msg) => SessionError::QueryTimeout(msg),
            other => SessionError::Driver(other),
        })?;
        settle(portal.query_settle_ms).await;
        self.advance(SessionState::Queried)?;

        // Summary screen
        let issuer = extract::read_issuer(driver, &fields.issuer).await;
        let buyer = extract::read_buyer(driver, &fields.buyer).await;
        let summary = extract::read_summary(driver, &fields.summary).await;
        self.advance(SessionState::SummaryScreenRead)?;

        // Details
        let details = first_match(driver, &details_strategies(), portal.timeout())
            .await?
            .ok_or(SessionError::DetailsControlNotFound)?;
        driver.scroll_into_view(&details).await?;
        driver.click(&details).await?;
        settle(portal.details_settle_ms).await;
        self.advance(SessionState::DetailsOpened)?;

        // Delivery
        let delivery = if fields.delivery.active {
            self.read_delivery_tab(driver).await?
        } else {
            debug!("Delivery extraction disabled");
            None
        };
        self.advance(SessionState::DeliveryTabRead)?;

        // Products
        let items = if fields.items.active {
            let tab = driver
                .wait_for(&Locator::id(selectors::PRODUCTS_TAB), portal.timeout())
                .await?
                .ok_or(SessionError::ProductsTabNotFound)?;
            driver.click(&tab).await?;
            settle(portal.tab_settle_ms).await;
            self.advance(SessionState::ProductsTabOpened)?;

            let items = extract::read_items(
                driver,
                &fields.items,
                &self.config.items,
                portal.timeout(),
            )
            .await;
            self.advance(SessionState::ProductsExtracted)?;
            items
        } else {
            debug!("Line item extraction disabled");
            Vec::new()
        };

        let record = ReceiptRecord::new(issuer, summary, items)
            .with_buyer(buyer)
            .with_delivery(delivery);
        self.advance(SessionState::Completed)?;
        Ok(record)
    }

    async fn read_delivery_tab<D: PortalDriver>(
        &self,
        driver: &D,
    ) -> Result<Option<DeliveryLocation>> {
        let portal = &self.config.portal;
        let Some(tab) = driver
            .wait_for(&Locator::id(selectors::DELIVERY_TAB), portal.short_timeout())
            .await?
        else {
            info!("No delivery tab on this receipt");
            return Ok(None);
        };

        driver.click(&tab).await?;
        settle(portal.tab_settle_ms).await;
        Ok(extract::read_delivery(driver, &self.config.fields.delivery).await)
    }
}

async fn settle(millis: u64) {
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeElement, FakeLauncher, FakePortal, cells_row, header_row};
    use super::selectors::*;
    use super::*;
    use crate::models::config::PortalConfig;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const KEY: &str = "12345678901234567890123456789012345678901234";

    fn key() -> AccessKey {
        AccessKey::parse(KEY).unwrap()
    }

    fn config() -> CupomConfig {
        CupomConfig {
            portal: PortalConfig::immediate(),
            ..Default::default()
        }
    }

    fn confirmed() -> Arc<OperatorSignal> {
        let signal = OperatorSignal::new();
        signal.confirm();
        Arc::new(signal)
    }

    fn session(
        config: CupomConfig,
        launcher: &Arc<FakeLauncher>,
    ) -> ReceiptExtractionSession<FakeLauncher, OperatorSignal> {
        ReceiptExtractionSession::new(Arc::new(config), Arc::clone(launcher), confirmed())
    }

    #[tokio::test]
    async fn test_full_extraction() {
        let launcher = Arc::new(FakeLauncher::new(FakePortal::receipt()));
        let session = session(config(), &launcher);

        let record = session.run(&key()).await.unwrap();

        assert_eq!(record.issuer().name.as_deref(), Some("Loja Teste"));
        assert_eq!(record.summary().total.as_deref(), Some("100,00"));
        assert_eq!(record.buyer().unwrap().tax_id.as_deref(), Some("123.456.789-00"));
        assert_eq!(
            record.delivery().unwrap().municipality.as_deref(),
            Some("São Paulo")
        );

        let item = &record.items()[0];
        assert_eq!(record.items().len(), 1);
        assert_eq!(item.ncm, "39174090");
        assert_eq!(item.net_value, Decimal::from_str("10.50").unwrap());
        assert_eq!(item.total_value, item.net_value);
        assert_eq!(item.product_code, "208329");
        assert_eq!(item.barcode.as_deref(), Some("7891234567895"));

        let portal = launcher.portal.lock().unwrap();
        assert_eq!(portal.typed, vec![(KEY_INPUT.to_string(), KEY.to_string())]);
        assert_eq!(
            portal.clicks,
            vec![SUBMIT, DETAILS_BUTTON, DELIVERY_TAB, PRODUCTS_TAB]
        );
        assert_eq!(portal.closes, 1);
        drop(portal);

        assert_eq!(session.state(), SessionState::Completed);
    }

    #[tokio::test]
    async fn test_missing_fields_are_absent() {
        let mut portal = FakePortal::receipt();
        portal.remove(ISSUER_CNPJ);
        portal.remove(BUYER_TAX_ID);
        let launcher = Arc::new(FakeLauncher::new(portal));

        let record = session(config(), &launcher).run(&key()).await.unwrap();

        assert_eq!(record.issuer().cnpj, None);
        assert_eq!(record.issuer().name.as_deref(), Some("Loja Teste"));
        assert!(record.buyer().is_none());
    }

    #[tokio::test]
    async fn test_details_found_by_value_selector() {
        let mut portal = FakePortal::receipt();
        portal.remove(DETAILS_BUTTON);
        portal.css.insert(
            "input[value='Detalhes']".to_string(),
            vec![FakeElement::input("btnAlt", "Detalhes")],
        );
        let launcher = Arc::new(FakeLauncher::new(portal));

        session(config(), &launcher).run(&key()).await.unwrap();
        assert!(launcher.clicks().contains(&"btnAlt".to_string()));
    }

    #[tokio::test]
    async fn test_details_found_by_scanning_submits() {
        let mut portal = FakePortal::receipt();
        portal.remove(DETAILS_BUTTON);
        portal.css.insert(
            "input[type='submit']".to_string(),
            vec![
                FakeElement::input("btnVoltar", "Voltar"),
                FakeElement::input("btnScan", "Detalhes"),
            ],
        );
        let launcher = Arc::new(FakeLauncher::new(portal));

        session(config(), &launcher).run(&key()).await.unwrap();
        let clicks = launcher.clicks();
        assert!(clicks.contains(&"btnScan".to_string()));
        assert!(!clicks.contains(&"btnVoltar".to_string()));
    }

    #[tokio::test]
    async fn test_details_missing_is_fatal() {
        let mut portal = FakePortal::receipt();
        portal.remove(DETAILS_BUTTON);
        let launcher = Arc::new(FakeLauncher::new(portal));

        let err = session(config(), &launcher).run(&key()).await.unwrap_err();
        assert!(matches!(err, SessionError::DetailsControlNotFound));
        assert_eq!(launcher.closes(), 1);
    }

    fn patient_config() -> CupomConfig {
        let mut config = config();
        config.portal.timeout_secs = 10;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_details_rendered_late_is_awaited() {
        let mut portal = FakePortal::receipt();
        portal.render_late(DETAILS_BUTTON, 4);
        let launcher = Arc::new(FakeLauncher::new(portal));

        session(patient_config(), &launcher).run(&key()).await.unwrap();
        assert!(launcher.clicks().contains(&DETAILS_BUTTON.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_products_table_rendered_late_is_awaited() {
        let mut portal = FakePortal::receipt();
        portal.render_late(PRODUCTS_TABLE, 4);
        let launcher = Arc::new(FakeLauncher::new(portal));

        let record = session(patient_config(), &launcher).run(&key()).await.unwrap();
        assert_eq!(record.items().len(), 1);
        assert_eq!(record.items()[0].ncm, "39174090");
    }

    #[tokio::test(start_paused = true)]
    async fn test_details_never_rendered_fails_after_timeout() {
        let mut portal = FakePortal::receipt();
        portal.remove(DETAILS_BUTTON);
        let launcher = Arc::new(FakeLauncher::new(portal));

        let started = tokio::time::Instant::now();
        let err = session(patient_config(), &launcher).run(&key()).await.unwrap_err();

        assert!(matches!(err, SessionError::DetailsControlNotFound));
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_delivery_tab_absent_is_not_an_error() {
        let mut portal = FakePortal::receipt();
        portal.remove(DELIVERY_TAB);
        let launcher = Arc::new(FakeLauncher::new(portal));

        let record = session(config(), &launcher).run(&key()).await.unwrap();
        assert!(record.delivery().is_none());
        assert_eq!(record.items().len(), 1);
    }

    #[tokio::test]
    async fn test_products_tab_missing_is_fatal() {
        let mut portal = FakePortal::receipt();
        portal.remove(PRODUCTS_TAB);
        let launcher = Arc::new(FakeLauncher::new(portal));

        let session = session(config(), &launcher);
        let err = session.run(&key()).await.unwrap_err();
        assert!(matches!(err, SessionError::ProductsTabNotFound));
        assert_eq!(session.state(), SessionState::DeliveryTabRead);
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn test_invalid_rows_are_dropped() {
        let mut portal = FakePortal::receipt();
        portal.tables.insert(
            PRODUCTS_TABLE.to_string(),
            vec![
                header_row(),
                cells_row("Não Informado", ""),
                cells_row("7891234567895", "1"),
                cells_row("7891234567895", "2"),
            ],
        );
        portal.add_row(0, "12345678", "SEM CODIGO", "2,000", "5,00");
        portal.add_row(1, "123", "NCM CURTO", "1,0000", "3,00");
        portal.add_row(2, "87654321", "NEGATIVO", "1,0000", "-1,00");
        let launcher = Arc::new(FakeLauncher::new(portal));

        let record = session(config(), &launcher).run(&key()).await.unwrap();

        assert_eq!(record.items().len(), 1);
        let item = &record.items()[0];
        assert_eq!(item.description.as_deref(), Some("SEM CODIGO"));
        assert_eq!(item.barcode, None);
        // Without a product code cell the NCM stands in
        assert_eq!(item.product_code, "12345678");
    }

    #[tokio::test]
    async fn test_missing_row_fields_use_fallbacks() {
        let mut portal = FakePortal::receipt();
        portal.remove(&RowField::Description.id(0));
        portal.remove(&RowField::Quantity.id(0));
        let launcher = Arc::new(FakeLauncher::new(portal));

        let record = session(config(), &launcher).run(&key()).await.unwrap();

        let item = &record.items()[0];
        assert_eq!(item.description.as_deref(), Some("Produto 1"));
        assert_eq!(item.quantity, Some(Decimal::from_str("1.0000").unwrap()));
    }

    #[tokio::test]
    async fn test_disabled_entities_skip_navigation() {
        let mut config = config();
        config.fields.delivery.active = false;
        config.fields.items.active = false;
        config.fields.buyer.active = false;
        let launcher = Arc::new(FakeLauncher::new(FakePortal::receipt()));

        let record = session(config, &launcher).run(&key()).await.unwrap();

        assert!(record.items().is_empty());
        assert!(record.buyer().is_none());
        assert!(record.delivery().is_none());
        assert_eq!(launcher.clicks(), vec![SUBMIT, DETAILS_BUTTON]);
    }

    #[tokio::test]
    async fn test_disabled_field_is_not_read() {
        let mut config = config();
        config.fields.issuer.name = false;
        let launcher = Arc::new(FakeLauncher::new(FakePortal::receipt()));

        let record = session(config, &launcher).run(&key()).await.unwrap();
        assert_eq!(record.issuer().name, None);
        assert!(record.issuer().cnpj.is_some());
    }

    #[tokio::test]
    async fn test_interrupt_after_details_closes_once() {
        let interrupt = Interrupt::new();
        let mut portal = FakePortal::receipt();
        portal.interrupt_on_click = Some((DETAILS_BUTTON.to_string(), interrupt.clone()));
        let launcher = Arc::new(FakeLauncher::new(portal));

        let session = session(config(), &launcher).with_interrupt(interrupt);
        let err = session.run(&key()).await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Interrupted {
                state: SessionState::DetailsOpened
            }
        ));
        assert!(!launcher.clicks().contains(&PRODUCTS_TAB.to_string()));
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn test_interrupt_while_awaiting_operator() {
        let launcher = Arc::new(FakeLauncher::new(FakePortal::receipt()));
        let interrupt = Interrupt::new();
        let session = ReceiptExtractionSession::new(
            Arc::new(config()),
            Arc::clone(&launcher),
            Arc::new(OperatorSignal::new()),
        )
        .with_interrupt(interrupt.clone());

        let key = key();
        let raise = async {
            tokio::task::yield_now().await;
            interrupt.raise();
        };
        let (result, _) = tokio::join!(session.run(&key), raise);

        assert!(matches!(
            result,
            Err(SessionError::Interrupted {
                state: SessionState::AwaitingManualChallenge
            })
        ));
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn test_challenge_abandoned() {
        let launcher = Arc::new(FakeLauncher::new(FakePortal::receipt()));
        let signal = OperatorSignal::new();
        signal.abandon();
        let session =
            ReceiptExtractionSession::new(Arc::new(config()), Arc::clone(&launcher), Arc::new(signal));

        let err = session.run(&key()).await.unwrap_err();
        assert!(matches!(err, SessionError::ChallengeAborted(_)));
        assert_eq!(launcher.clicks(), Vec::<String>::new());
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn test_portal_unreachable() {
        let mut portal = FakePortal::receipt();
        portal.navigate_error = Some("net::ERR_NAME_NOT_RESOLVED".to_string());
        let launcher = Arc::new(FakeLauncher::new(portal));

        let err = session(config(), &launcher).run(&key()).await.unwrap_err();
        assert!(matches!(err, SessionError::PortalUnreachable { .. }));
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn test_key_input_missing() {
        let mut portal = FakePortal::receipt();
        portal.remove(KEY_INPUT);
        let launcher = Arc::new(FakeLauncher::new(portal));

        let err = session(config(), &launcher).run(&key()).await.unwrap_err();
        assert!(matches!(err, SessionError::FieldNotFound(id) if id == KEY_INPUT));
    }

    #[tokio::test]
    async fn test_submit_missing() {
        let mut portal = FakePortal::receipt();
        portal.remove(SUBMIT);
        let launcher = Arc::new(FakeLauncher::new(portal));

        let err = session(config(), &launcher).run(&key()).await.unwrap_err();
        assert!(matches!(err, SessionError::SubmitNotFound));
    }

    #[tokio::test]
    async fn test_launch_failure() {
        let launcher = Arc::new(FakeLauncher::failing());
        let err = session(config(), &launcher).run(&key()).await.unwrap_err();
        assert!(matches!(err, SessionError::Launch(_)));
    }

    #[tokio::test]
    async fn test_state_channel_reports_progress() {
        let launcher = Arc::new(FakeLauncher::new(FakePortal::receipt()));
        let session = session(config(), &launcher);
        let rx = session.subscribe();

        session.run(&key()).await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::Completed);
    }
}
