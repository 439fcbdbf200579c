use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;

use crate::blockchain::{ContractBinding, EventNormalizer, EventSource};
use crate::config::{AppConfig, ListenerConfig, RelayFailurePolicy};
use crate::error::{BindingError, RelayerError};
use crate::listener::cursor::{BlockCursor, ScanRange};
use crate::listener::shutdown::Shutdown;
use crate::listener::status::{ListenerState, ListenerStatus};
use crate::logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::CanonicalTransferRecord;
use crate::relay::{Relay, RelayOutcome};
use crate::state::StateStore;

/// Timing and policy knobs for the listener loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSettings {
    pub start_block_offset: u64,
    pub failure_policy: RelayFailurePolicy,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub error_backoff: Duration,
    pub max_pending: usize,
    pub max_requeue_cycles: u32,
}

impl ListenerSettings {
    pub fn new(listener: &ListenerConfig, failure_policy: RelayFailurePolicy) -> Self {
        Self {
            start_block_offset: listener.start_block_offset,
            failure_policy,
            poll_interval: Duration::from_secs(listener.poll_interval_seconds),
            reconnect_delay: Duration::from_secs(listener.reconnect_delay_seconds),
            error_backoff: Duration::from_secs(listener.error_backoff_seconds),
            max_pending: listener.max_pending,
            max_requeue_cycles: listener.max_requeue_cycles,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.listener, config.relayer.failure_policy)
    }
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self::new(&ListenerConfig::default(), RelayFailurePolicy::default())
    }
}

/// What one call to [`BridgeListener::poll_once`] did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// `None` when the cycle was idle
    pub range: Option<ScanRange>,
    pub latest_block: u64,
    pub events: usize,
    pub relayed: u32,
    pub skipped: u32,
    pub failed: u32,
    pub requeued: u32,
    pub invalid: u32,
    /// Pending records delivered at the start of the cycle
    pub recovered: u32,
    /// Pending records given up on during the cycle
    pub dropped: u32,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.range.is_none()
    }
}

/// A failed record waiting for the next cycle
struct PendingRecord {
    record: CanonicalTransferRecord,
    /// Cycles in which the retry has already failed
    retries: u32,
}

enum Disposition {
    Relayed,
    Skipped,
    Failed,
    Requeued,
}

/// Drives the poll -> deduplicate -> relay pipeline for one contract
pub struct BridgeListener<S, R, D> {
    source: S,
    relay: R,
    store: D,
    normalizer: EventNormalizer,
    contract: ContractBinding,
    settings: ListenerSettings,
    cursor: Option<BlockCursor>,
    pending: VecDeque<PendingRecord>,
    status: ListenerStatus,
    status_tx: watch::Sender<ListenerStatus>,
    shutdown: Shutdown,
}

impl<S, R, D> BridgeListener<S, R, D>
where
    S: EventSource,
    R: Relay,
    D: StateStore,
{
    /// Validate the schema and bind the contract address. No network access.
    pub fn new(
        source: S,
        relay: R,
        store: D,
        normalizer: EventNormalizer,
        contract_address: &str,
        settings: ListenerSettings,
    ) -> Result<Self, RelayerError> {
        normalizer.check_schema()?;
        let contract = ContractBinding::bind(contract_address, normalizer.schema())?;

        let status = ListenerStatus::new(&contract.address);
        let (status_tx, _) = watch::channel(status.clone());

        Ok(Self {
            source,
            relay,
            store,
            normalizer,
            contract,
            settings,
            cursor: None,
            pending: VecDeque::new(),
            status,
            status_tx,
            shutdown: Shutdown::new(),
        })
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListenerStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> &ListenerStatus {
        &self.status
    }

    pub fn contract(&self) -> &ContractBinding {
        &self.contract
    }

    pub fn cursor(&self) -> Option<BlockCursor> {
        self.cursor
    }

    pub fn pending(&self) -> impl Iterator<Item = &CanonicalTransferRecord> {
        self.pending.iter().map(|p| &p.record)
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    /// Check connectivity and place the cursor. Errors here are fatal.
    pub async fn initialize(&mut self) -> Result<(), RelayerError> {
        LogContext::new("listener", "initialize")
            .with_metadata("contract", json!(self.contract.address))
            .with_metadata("event", json!(self.contract.event_name))
            .with_metadata("topic0", json!(self.contract.topic0))
            .info(&format!(
                "Watching {} for {} events",
                self.contract.address, self.contract.event_name
            ));

        if !self.source.is_connected().await {
            let endpoint = self.source.endpoint().to_string();
            self.source
                .reconnect()
                .await
                .map_err(|e| BindingError::NotConnected(format!("{}: {}", endpoint, e)))?;
            if !self.source.is_connected().await {
                return Err(BindingError::NotConnected(endpoint).into());
            }
        }

        let latest = self.source.latest_block().await?;
        self.status.last_seen_height = Some(latest);
        self.status.processed_count = self.store.processed_count()?;
        let cursor = self.start_cursor(latest)?;

        LogContext::new("listener", "initialize")
            .with_block_number(cursor.next_from_block())
            .with_metadata("latest_block", json!(latest))
            .with_metadata("durable_state", json!(self.store.is_durable()))
            .info(&format!("Listener initialized. Starting scan from block {}", cursor.next_from_block()));

        self.set_state(ListenerState::ConnectedIdle);
        Ok(())
    }

    /// Run cycles until shutdown. Only initialization errors are returned.
    pub async fn run(&mut self) -> Result<(), RelayerError> {
        if self.cursor.is_none() {
            self.initialize().await?;
        }

        while !self.shutdown.is_triggered() {
            if !self.source.is_connected().await {
                self.set_state(ListenerState::Disconnected);
                LogContext::new("listener", "reconnect")
                    .with_metadata("endpoint", json!(self.source.endpoint()))
                    .warn("Connection to the blockchain node lost. Reconnecting...");

                if let Err(e) = self.source.reconnect().await {
                    ErrorLogger::log_error(&e.into(), Some(LogContext::new("listener", "reconnect")));
                }
                if !self.shutdown.sleep(self.settings.reconnect_delay).await {
                    break;
                }
                continue;
            }

            match self.poll_once().await {
                Ok(_) => {
                    if !self.shutdown.sleep(self.settings.poll_interval).await {
                        break;
                    }
                }
                Err(e) => {
                    ErrorLogger::log_error(&e, Some(LogContext::new("listener", "poll_cycle")));
                    self.status.last_error = Some(e.to_string());
                    self.set_state(ListenerState::ErrorBackoff);

                    LogContext::new("listener", "error_backoff")
                        .with_metadata("backoff_seconds", json!(self.settings.error_backoff.as_secs()))
                        .warn(&format!(
                            "Cycle failed, backing off for {}s",
                            self.settings.error_backoff.as_secs()
                        ));
                    if !self.shutdown.sleep(self.settings.error_backoff).await {
                        break;
                    }
                }
            }
        }

        LogContext::new("listener", "shutdown")
            .with_metadata("next_from_block", json!(self.cursor.map(|c| c.next_from_block())))
            .info("Listener stopped");
        Ok(())
    }

    /// One scanning cycle. On error the cursor is left where it was.
    pub async fn poll_once(&mut self) -> Result<CycleReport, RelayerError> {
        let monitor = PerformanceMonitor::new("scan_cycle");
        self.set_state(ListenerState::Scanning);

        let latest = self.source.latest_block().await?;
        self.status.last_seen_height = Some(latest);

        let cursor = match self.cursor {
            Some(cursor) => cursor,
            None => self.start_cursor(latest)?,
        };

        let mut report = CycleReport {
            latest_block: latest,
            ..CycleReport::default()
        };
        let dropped_before = self.status.requeue_dropped;

        if !self.pending.is_empty() {
            report.recovered = self.retry_pending().await?;
        }

        let range = match cursor.next_range(latest) {
            Some(range) => range,
            None => {
                LogContext::new("listener", "scan")
                    .with_metadata("latest_block", json!(latest))
                    .with_metadata("next_from_block", json!(cursor.next_from_block()))
                    .info(&format!(
                        "No new blocks to scan. Current: {}, Next: {}",
                        latest,
                        cursor.next_from_block()
                    ));
                report.dropped = (self.status.requeue_dropped - dropped_before) as u32;
                self.finish_cycle();
                return Ok(report);
            }
        };
        report.range = Some(range);

        LogContext::new("listener", "scan")
            .with_block_range(range.from, range.to)
            .info(&format!("Scanning blocks from {} to {}", range.from, range.to));

        let mut logs = self.source.fetch_logs(&self.contract, range.from, range.to).await?;
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        report.events = logs.len();

        for log in &logs {
            let record = match self.normalizer.normalize(log) {
                Ok(record) => record,
                Err(e) => {
                    report.invalid += 1;
                    self.status.normalization_failures += 1;
                    let context = LogContext::new("listener", "normalize")
                        .with_block_number(log.block_number)
                        .with_transaction_hash(&log.transaction_hash)
                        .with_metadata("log_index", json!(log.log_index));
                    ErrorLogger::log_error(&e.into(), Some(context));
                    continue;
                }
            };

            match self.process_record(record).await? {
                Disposition::Relayed => report.relayed += 1,
                Disposition::Skipped => report.skipped += 1,
                Disposition::Failed => report.failed += 1,
                Disposition::Requeued => report.requeued += 1,
            }
        }

        let next = cursor.after(range);
        self.store.save_cursor(next.next_from_block())?;
        self.cursor = Some(next);
        report.dropped = (self.status.requeue_dropped - dropped_before) as u32;

        MetricsLogger::log_cycle(
            range.from,
            range.to,
            report.events,
            report.relayed,
            report.skipped,
            report.failed + report.requeued,
            report.invalid,
            monitor.elapsed_ms(),
        );

        self.finish_cycle();
        Ok(report)
    }

    fn start_cursor(&mut self, latest: u64) -> Result<BlockCursor, RelayerError> {
        let cursor = match self.store.load_cursor()? {
            Some(stored) => {
                LogContext::new("listener", "cursor")
                    .with_block_number(stored)
                    .info(&format!("Resuming from stored cursor at block {}", stored));
                BlockCursor::new(stored)
            }
            None => BlockCursor::initial(latest, self.settings.start_block_offset),
        };
        self.cursor = Some(cursor);
        Ok(cursor)
    }

    async fn process_record(&mut self, record: CanonicalTransferRecord) -> Result<Disposition, RelayerError> {
        let context = || {
            LogContext::new("listener", "event")
                .with_transaction_id(&record.transaction_id)
                .with_block_number(record.block_number)
        };

        if self.store.is_processed(&record.transaction_id)? {
            self.status.skipped_total += 1;
            context().info(&format!(
                "TxID {} has already been processed. Skipping.",
                record.transaction_id
            ));
            return Ok(Disposition::Skipped);
        }

        if self.pending.iter().any(|p| p.record.transaction_id == record.transaction_id) {
            self.status.skipped_total += 1;
            context().debug("Already queued for retry");
            return Ok(Disposition::Skipped);
        }

        context()
            .with_metadata("destination_chain_id", json!(record.destination_chain_id))
            .with_metadata("recipient", json!(record.recipient))
            .with_metadata("amount", json!(record.amount))
            .info(&format!("New {} event detected", self.contract.event_name));

        match self.relay.relay(&record).await {
            RelayOutcome::Delivered { attempts, status } => {
                self.store.mark_processed(&record)?;
                self.status.processed_count += 1;
                self.status.relayed_total += 1;
                context()
                    .with_metadata("attempts", json!(attempts))
                    .with_metadata("http_status", json!(status))
                    .info(&format!("Successfully relayed TxID {}", record.transaction_id));
                Ok(Disposition::Relayed)
            }
            RelayOutcome::Failed { attempts, last_error } => {
                self.status.failed_total += 1;
                let context = context()
                    .with_metadata("attempts", json!(attempts))
                    .with_metadata("error", json!(last_error))
                    .with_metadata("policy", json!(self.settings.failure_policy.to_string()));

                match self.settings.failure_policy {
                    RelayFailurePolicy::Drop => {
                        context.error(&format!(
                            "Failed to relay TxID {}. It will not be retried.",
                            record.transaction_id
                        ));
                        Ok(Disposition::Failed)
                    }
                    RelayFailurePolicy::Requeue => {
                        context.warn(&format!(
                            "Failed to relay TxID {}. Queued for the next cycle.",
                            record.transaction_id
                        ));
                        self.enqueue(PendingRecord { record, retries: 0 });
                        Ok(Disposition::Requeued)
                    }
                }
            }
        }
    }

    /// Queue a failed record, evicting the oldest ones past `max_pending`
    fn enqueue(&mut self, pending: PendingRecord) {
        self.pending.push_back(pending);

        while self.pending.len() > self.settings.max_pending {
            if let Some(evicted) = self.pending.pop_front() {
                self.abandon(&evicted, "requeue queue is full");
            }
        }
    }

    fn abandon(&mut self, pending: &PendingRecord, reason: &str) {
        self.status.requeue_dropped += 1;
        LogContext::new("listener", "requeue")
            .with_transaction_id(&pending.record.transaction_id)
            .with_block_number(pending.record.block_number)
            .with_metadata("retries", json!(pending.retries))
            .with_metadata("max_pending", json!(self.settings.max_pending))
            .error(&format!(
                "Dropping queued TxID {}: {}. It will not be retried.",
                pending.record.transaction_id, reason
            ));
    }

    /// Retry queued records in order; failures go back to the end of the queue
    /// until they have failed `max_requeue_cycles` times
    async fn retry_pending(&mut self) -> Result<u32, RelayerError> {
        let mut recovered = 0;

        for _ in 0..self.pending.len() {
            let mut pending = match self.pending.pop_front() {
                Some(pending) => pending,
                None => break,
            };

            match self.store.is_processed(&pending.record.transaction_id) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    self.pending.push_front(pending);
                    return Err(e.into());
                }
            }

            let record = &pending.record;
            match self.relay.relay(record).await {
                RelayOutcome::Delivered { attempts, .. } => {
                    if let Err(e) = self.store.mark_processed(record) {
                        self.pending.push_front(pending);
                        return Err(e.into());
                    }
                    recovered += 1;
                    self.status.processed_count += 1;
                    self.status.relayed_total += 1;
                    LogContext::new("listener", "requeue")
                        .with_transaction_id(&record.transaction_id)
                        .with_metadata("attempts", json!(attempts))
                        .info(&format!("Relayed queued TxID {}", record.transaction_id));
                }
                RelayOutcome::Failed { last_error, .. } => {
                    self.status.failed_total += 1;
                    pending.retries += 1;
                    LogContext::new("listener", "requeue")
                        .with_transaction_id(&pending.record.transaction_id)
                        .with_attempt(pending.retries, self.settings.max_requeue_cycles)
                        .with_metadata("error", json!(last_error))
                        .warn(&format!("Queued TxID {} failed again", pending.record.transaction_id));

                    if pending.retries >= self.settings.max_requeue_cycles {
                        self.abandon(&pending, "retry cycles exhausted");
                    } else {
                        self.pending.push_back(pending);
                    }
                }
            }
        }

        Ok(recovered)
    }

    fn finish_cycle(&mut self) {
        self.status.cycles += 1;
        self.status.last_cycle_at = Some(Utc::now());
        self.status.last_error = None;
        self.set_state(ListenerState::ConnectedIdle);
    }

    fn set_state(&mut self, state: ListenerState) {
        self.status.state = state;
        self.status.next_from_block = self.cursor.map(|c| c.next_from_block());
        self.status.pending_requeue = self.pending.len();
        self.status_tx.send_replace(self.status.clone());
    }
}
