//! Single and batch extraction: resolve the key, run a session, save the record.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{ExportError, KeyError, SessionError};
use crate::export::CsvExporter;
use crate::key::{AccessKeyResolver, BarcodeDecoder, QrImageDecoder};
use crate::models::config::CupomConfig;
use crate::models::receipt::{AccessKey, ReceiptRecord};
use crate::session::{
    BrowserLauncher, ChallengeSignal, Interrupt, ReceiptExtractionSession, SessionState,
};

/// Width of the entry shown in batch listings.
const ENTRY_DISPLAY_LEN: usize = 20;

/// What happened to one entry.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The input did not yield a valid access key.
    KeyRejected { entry: String, error: KeyError },

    /// The portal session failed.
    ExtractionFailed { key: AccessKey, error: SessionError },

    /// The record was extracted but writing it failed.
    SaveFailed {
        key: AccessKey,
        record: ReceiptRecord,
        error: ExportError,
    },

    /// Extracted, and saved to `path` when saving was requested.
    Completed {
        key: AccessKey,
        record: ReceiptRecord,
        path: Option<PathBuf>,
    },
}

impl ProcessOutcome {
    /// The receipt was extracted, whether or not saving it worked.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::SaveFailed { .. } | Self::Completed { .. })
    }

    /// Extraction succeeded but the CSV could not be written.
    pub fn save_failed(&self) -> bool {
        matches!(self, Self::SaveFailed { .. })
    }

    /// The extracted record, if extraction got that far.
    pub fn record(&self) -> Option<&ReceiptRecord> {
        match self {
            Self::SaveFailed { record, .. } | Self::Completed { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&AccessKey> {
        match self {
            Self::KeyRejected { .. } => None,
            Self::ExtractionFailed { key, .. }
            | Self::SaveFailed { key, .. }
            | Self::Completed { key, .. } => Some(key),
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Completed { path, .. } => path.as_ref(),
            _ => None,
        }
    }

    /// Human-readable summary.
    pub fn message(&self) -> String {
        match self {
            Self::KeyRejected { error, .. } => format!("Could not validate key: {}", error),
            Self::ExtractionFailed { error, .. } => format!("Could not extract receipt: {}", error),
            Self::SaveFailed { error, .. } => {
                format!("Receipt extracted but could not be saved: {}", error)
            }
            Self::Completed {
                record,
                path: Some(path),
                ..
            } => format!(
                "Receipt extracted with {} items, saved to {}",
                record.items().len(),
                path.display()
            ),
            Self::Completed { record, .. } => {
                format!("Receipt extracted with {} items", record.items().len())
            }
        }
    }

    fn interrupted(&self) -> bool {
        matches!(
            self,
            Self::ExtractionFailed {
                error: SessionError::Interrupted { .. },
                ..
            }
        )
    }
}

/// One line of a batch report.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    /// Key (or raw entry) shortened for display.
    pub key: String,
    pub success: bool,
    pub message: String,
    /// Where the CSV went; `None` when saving was off or failed.
    pub path: Option<PathBuf>,
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The batch stopped early on an interrupt.
    pub interrupted: bool,
    pub entries: Vec<BatchEntry>,
}

fn abbreviate(entry: &str) -> String {
    if entry.chars().count() > ENTRY_DISPLAY_LEN {
        let head: String = entry.chars().take(ENTRY_DISPLAY_LEN).collect();
        format!("{}...", head)
    } else {
        entry.to_string()
    }
}

/// Sequences resolver, session and exporter.
pub struct ExtractionOrchestrator<L, C, D = QrImageDecoder> {
    config: Arc<CupomConfig>,
    resolver: AccessKeyResolver<D>,
    launcher: Arc<L>,
    challenge: Arc<C>,
    exporter: CsvExporter,
    interrupt: Interrupt,
    state: Arc<watch::Sender<SessionState>>,
}

impl<L, C> ExtractionOrchestrator<L, C, QrImageDecoder>
where
    L: BrowserLauncher,
    C: ChallengeSignal,
{
    pub fn new(config: CupomConfig, launcher: L, challenge: C) -> Self {
        Self::with_resolver(config, launcher, challenge, AccessKeyResolver::new())
    }
}

impl<L, C, D> ExtractionOrchestrator<L, C, D>
where
    L: BrowserLauncher,
    C: ChallengeSignal,
    D: BarcodeDecoder,
{
    pub fn with_resolver(
        config: CupomConfig,
        launcher: L,
        challenge: C,
        resolver: AccessKeyResolver<D>,
    ) -> Self {
        let (state, _rx) = watch::channel(SessionState::Initializing);
        Self {
            exporter: CsvExporter::new(config.export.clone()),
            config: Arc::new(config),
            resolver,
            launcher: Arc::new(launcher),
            challenge: Arc::new(challenge),
            interrupt: Interrupt::new(),
            state: Arc::new(state),
        }
    }

    /// Share an interrupt raised elsewhere (for example by a Ctrl-C handler).
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Handle for stopping the running session from another task.
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// State of the current (or last) session.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &CupomConfig {
        &self.config
    }

    /// Resolve an entry without touching the portal.
    pub fn validate(&self, entry: &str) -> Result<AccessKey, KeyError> {
        self.resolver.dispatch(entry)
    }

    /// Extract one receipt and optionally save it as CSV.
    pub async fn process(&self, entry: &str, save: bool, file_name: Option<&str>) -> ProcessOutcome {
        let key = match self.resolver.dispatch(entry) {
            Ok(key) => key,
            Err(error) => {
                warn!("Rejected entry {}: {}", abbreviate(entry.trim()), error);
                return ProcessOutcome::KeyRejected {
                    entry: entry.to_string(),
                    error,
                };
            }
        };

        let session = ReceiptExtractionSession::new(
            Arc::clone(&self.config),
            Arc::clone(&self.launcher),
            Arc::clone(&self.challenge),
        )
        .with_interrupt(self.interrupt.clone())
        .with_state_sender(Arc::clone(&self.state));

        let record = match session.run(&key).await {
            Ok(record) => record,
            Err(error) => return ProcessOutcome::ExtractionFailed { key, error },
        };

        if !save {
            return ProcessOutcome::Completed {
                key,
                record,
                path: None,
            };
        }

        match self.exporter.export(&record, file_name) {
            Ok(path) => ProcessOutcome::Completed {
                key,
                record,
                path: Some(path),
            },
            Err(error) => ProcessOutcome::SaveFailed { key, record, error },
        }
    }

    /// Process entries one after another. A failure never stops the batch;
    /// an interrupt stops it after the current entry.
    pub async fn process_batch<S: AsRef<str>>(&self, entries: &[S], save: bool) -> BatchReport {
        let mut report = BatchReport::default();

        for (i, entry) in entries.iter().enumerate() {
            let entry = entry.as_ref();
            info!("Batch entry {}/{}", i + 1, entries.len());

            let outcome = self.process(entry, save, None).await;
            let key = outcome
                .key()
                .map(AccessKey::abbreviated)
                .unwrap_or_else(|| abbreviate(entry.trim()));

            report.total += 1;
            if outcome.is_success() {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            report.entries.push(BatchEntry {
                key,
                success: outcome.is_success(),
                message: outcome.message(),
                path: outcome.path().cloned(),
            });

            if outcome.interrupted() || self.interrupt.is_raised() {
                warn!("Batch interrupted after {} of {} entries", i + 1, entries.len());
                report.interrupted = true;
                break;
            }
        }

        info!(
            "Batch finished: {} total, {} succeeded, {} failed",
            report.total, report.succeeded, report.failed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{ExportConfig, PortalConfig};
    use crate::session::fake::{FakeLauncher, FakePortal};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    const KEY: &str = "12345678901234567890123456789012345678901234";

    struct AlwaysConfirm;

    #[async_trait]
    impl ChallengeSignal for AlwaysConfirm {
        async fn wait_for_confirmation(&self, _key: &AccessKey) -> Result<(), String> {
            Ok(())
        }
    }

    fn config(output_dir: PathBuf) -> CupomConfig {
        CupomConfig {
            portal: PortalConfig::immediate(),
            export: ExportConfig {
                output_dir,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn orchestrator(
        portal: FakePortal,
        output_dir: PathBuf,
    ) -> ExtractionOrchestrator<FakeLauncher, AlwaysConfirm> {
        ExtractionOrchestrator::new(config(output_dir), FakeLauncher::new(portal), AlwaysConfirm)
    }

    #[tokio::test]
    async fn test_end_to_end_single_key() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(FakePortal::receipt(), dir.path().to_path_buf());

        let outcome = orchestrator.process(KEY, true, None).await;
        assert!(outcome.is_success(), "{}", outcome.message());

        let path = outcome.path().unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("Loja Teste"));
        assert!(lines[1].contains("39174090"));
        assert!(lines[1].contains("10,50"));
    }

    #[tokio::test]
    async fn test_invalid_key_never_launches() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(FakePortal::receipt(), dir.path().to_path_buf());

        let outcome = orchestrator.process("123456789", true, None).await;

        assert!(matches!(
            outcome,
            ProcessOutcome::KeyRejected {
                error: KeyError::InvalidLength { found: 9 },
                ..
            }
        ));
        assert!(outcome.message().starts_with("Could not validate key"));
        assert_eq!(orchestrator.launcher.portal.lock().unwrap().launches, 0);
    }

    #[tokio::test]
    async fn test_save_failure_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let orchestrator = orchestrator(FakePortal::receipt(), blocker);

        let outcome = orchestrator.process(KEY, true, None).await;

        assert!(matches!(outcome, ProcessOutcome::SaveFailed { .. }));
        assert!(outcome.is_success());
        assert!(outcome.save_failed());
        assert!(outcome.path().is_none());
        assert_eq!(
            outcome.record().unwrap().issuer().name.as_deref(),
            Some("Loja Teste")
        );
        assert!(outcome.message().starts_with("Receipt extracted but could not be saved"));
    }

    #[tokio::test]
    async fn test_batch_counts_unsaved_receipt_as_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let orchestrator = orchestrator(FakePortal::receipt(), blocker);

        let report = orchestrator.process_batch(&[KEY], true).await;

        assert_eq!(report.total, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);
        assert!(report.entries[0].success);
        assert!(report.entries[0].path.is_none());
        assert!(
            report.entries[0]
                .message
                .starts_with("Receipt extracted but could not be saved")
        );
    }

    #[tokio::test]
    async fn test_extraction_failure_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut portal = FakePortal::receipt();
        portal.remove(crate::session::selectors::PRODUCTS_TAB);
        let orchestrator = orchestrator(portal, dir.path().to_path_buf());

        let outcome = orchestrator.process(KEY, false, None).await;
        assert!(outcome.message().starts_with("Could not extract receipt"));
    }

    #[tokio::test]
    async fn test_batch_continues_after_failures() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(FakePortal::receipt(), dir.path().to_path_buf());

        let report = orchestrator
            .process_batch(&[KEY, "123", KEY], false)
            .await;

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.interrupted);
        assert_eq!(report.entries[0].key, "12345678901234567890...");
        assert_eq!(report.entries[1].key, "123");
        assert!(!report.entries[1].success);

        let portal = orchestrator.launcher.portal.lock().unwrap();
        assert_eq!(portal.launches, 2);
        assert_eq!(portal.closes, 2);
    }

    #[tokio::test]
    async fn test_batch_stops_on_interrupt() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(FakePortal::receipt(), dir.path().to_path_buf());
        orchestrator.launcher.portal.lock().unwrap().interrupt_on_click = Some((
            crate::session::selectors::DETAILS_BUTTON.to_string(),
            orchestrator.interrupt(),
        ));

        let report = orchestrator.process_batch(&[KEY, KEY, KEY], false).await;

        assert!(report.interrupted);
        assert_eq!(report.total, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(orchestrator.launcher.portal.lock().unwrap().closes, 1);
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate("short"), "short");
        assert_eq!(abbreviate(&"9".repeat(25)), format!("{}...", "9".repeat(20)));
    }
}
