use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn, Instrument};

use super::errors::WorkflowError;
use super::state_machine::Transition;
use crate::config::{LaundryConfig, NotificationMode};
use crate::notify::Notifier;
use crate::observability::{OperationTimer, WorkflowMetrics};
use crate::store::{ContactRecord, Partition, RecordStore, StoredRecord};
use crate::telemetry::{create_operation_span, generate_correlation_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowOptions {
    pub duplicate_check: bool,
    pub notification_mode: NotificationMode,
    /// Background sends in flight before further sends are awaited inline
    pub max_pending_notifications: usize,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            duplicate_check: true,
            notification_mode: NotificationMode::Background,
            max_pending_notifications: 256,
        }
    }
}

impl WorkflowOptions {
    pub fn from_config(config: &LaundryConfig) -> Self {
        Self {
            duplicate_check: config.workflow.duplicate_check,
            notification_mode: config.notifier.delivery,
            max_pending_notifications: config.notifier.max_pending,
        }
    }
}

/// All three partitions, grouped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub in_work: Vec<StoredRecord>,
    pub ready_for_delivery: Vec<StoredRecord>,
    pub history: Vec<StoredRecord>,
}

/// Validates and executes intake and the two forward transitions
#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    options: WorkflowOptions,
    metrics: Arc<WorkflowMetrics>,
    notifications: TaskTracker,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            store,
            notifier,
            options,
            metrics: Arc::new(WorkflowMetrics::new()),
            notifications: TaskTracker::new(),
        }
    }

    pub fn metrics(&self) -> &WorkflowMetrics {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Admit a new contact into the in-work partition
    pub async fn intake(&self, name: &str, phone: &str) -> Result<StoredRecord, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_operation_span("intake", None, &correlation_id);
        let timer = OperationTimer::new("intake");

        let result = self.intake_inner(name, phone).instrument(span).await;

        self.observe(&result);
        timer.finish(result.is_ok());
        result
    }

    async fn intake_inner(&self, name: &str, phone: &str) -> Result<StoredRecord, WorkflowError> {
        if self.options.duplicate_check {
            let existing = self
                .store
                .find_by_contact(Partition::InWork, name, phone)
                .await?;
            if !existing.is_empty() {
                self.metrics.record_duplicate();
                info!(existing_id = %existing[0].id, "Rejected duplicate intake");
                return Err(WorkflowError::DuplicateContact);
            }
        }

        let stored = self
            .store
            .insert(Partition::InWork, ContactRecord::new(name, phone))
            .await?;
        self.metrics.record_intake();
        info!(id = %stored.id, "Contact taken into work");
        Ok(stored)
    }

    /// InWork -> ReadyForDelivery
    pub async fn advance_to_ready(
        &self,
        id: &str,
        name: &str,
        phone: &str,
    ) -> Result<StoredRecord, WorkflowError> {
        self.execute(Transition::mark_ready(id, name, phone)).await
    }

    /// ReadyForDelivery -> History
    pub async fn advance_to_delivered(
        &self,
        id: &str,
        name: &str,
        phone: &str,
    ) -> Result<StoredRecord, WorkflowError> {
        self.execute(Transition::mark_delivered(id, name, phone)).await
    }

    /// Run a transition: move the record, then notify the contact
    pub async fn execute(&self, transition: Transition) -> Result<StoredRecord, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_operation_span(
            transition.operation(),
            Some(transition.id()),
            &correlation_id,
        );
        let timer = OperationTimer::new(transition.operation());

        let result = self.execute_inner(&transition).instrument(span).await;

        self.observe(&result);
        timer.finish(result.is_ok());
        result
    }

    async fn execute_inner(&self, transition: &Transition) -> Result<StoredRecord, WorkflowError> {
        debug_assert!(transition.is_forward());

        let record = transition.destination_record(Utc::now());
        let outcome = self
            .store
            .move_record(
                transition.source(),
                transition.id(),
                transition.destination(),
                record,
            )
            .await?;

        // Caller-supplied fields are kept as given; only flag disagreements.
        match &outcome.removed {
            None => warn!(
                source = %transition.source(),
                "Record not found in source partition, destination entry created anyway"
            ),
            Some(previous) if !previous.record.same_contact(&outcome.created.record) => warn!(
                stored_name = %previous.record.name,
                stored_phone = %previous.record.phone,
                "Caller-supplied contact differs from the record being moved"
            ),
            Some(_) => {}
        }

        match transition {
            Transition::MarkReady { .. } => self.metrics.record_marked_ready(),
            Transition::MarkDelivered { .. } => self.metrics.record_delivered(),
        }
        info!(
            from = %transition.source(),
            to = %transition.destination(),
            new_id = %outcome.created.id,
            "Record advanced"
        );

        self.notify(transition.phone(), transition.notification())
            .await?;
        Ok(outcome.created)
    }

    async fn notify(&self, phone: &str, body: &'static str) -> Result<(), WorkflowError> {
        match self.options.notification_mode {
            NotificationMode::Inline => self.notify_inline(phone, body).await,
            NotificationMode::Background => {
                if self.notifications.len() >= self.options.max_pending_notifications {
                    warn!(
                        pending = self.notifications.len(),
                        "Notification backlog full, sending inline"
                    );
                    // Backlog sends are best-effort like background ones.
                    let _ = self.notify_inline(phone, body).await;
                    return Ok(());
                }

                let notifier = Arc::clone(&self.notifier);
                let metrics = Arc::clone(&self.metrics);
                let phone = phone.to_string();
                self.notifications.spawn(
                    async move {
                        match notifier.send(&phone, body).await {
                            Ok(()) => {
                                metrics.record_notification(true);
                                debug!("Notification sent");
                            }
                            Err(e) => {
                                metrics.record_notification(false);
                                warn!(error = %e, "Background notification failed");
                            }
                        }
                    }
                    .in_current_span(),
                );
                Ok(())
            }
        }
    }

    async fn notify_inline(&self, phone: &str, body: &str) -> Result<(), WorkflowError> {
        let result = self.notifier.send(phone, body).await;
        self.metrics.record_notification(result.is_ok());
        if let Err(e) = &result {
            warn!(error = %e, "Notification failed after state change");
        }
        Ok(result?)
    }

    /// Background notifications still queued or in flight
    pub fn pending_notifications(&self) -> usize {
        self.notifications.len()
    }

    /// Wait for background notifications to finish. Returns `false` when
    /// `timeout` elapsed first; unfinished sends are then abandoned.
    pub async fn drain_notifications(&self, timeout: Duration) -> bool {
        self.notifications.close();
        let drained = tokio::time::timeout(timeout, self.notifications.wait())
            .await
            .is_ok();
        self.notifications.reopen();
        drained
    }

    /// Every record of one partition, annotated with its id
    pub async fn contacts(&self, partition: Partition) -> Result<Vec<StoredRecord>, WorkflowError> {
        let result = self.store.list(partition).await.map_err(WorkflowError::from);
        self.observe(&result);
        result
    }

    /// All partitions in one call
    pub async fn status(&self) -> Result<StatusSnapshot, WorkflowError> {
        Ok(StatusSnapshot {
            in_work: self.contacts(Partition::InWork).await?,
            ready_for_delivery: self.contacts(Partition::ReadyForDelivery).await?,
            history: self.contacts(Partition::History).await?,
        })
    }

    fn observe<T>(&self, result: &Result<T, WorkflowError>) {
        if let Err(WorkflowError::StoreFault(e)) = result {
            self.metrics.record_store_fault();
            warn!(error = %e, "Store fault");
        }
    }
}
