// laundry-flow - laundry item tracking through in-work, ready-for-delivery and history
// This exposes the core components for testing and integration

pub mod config;
pub mod notify;
pub mod observability;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use config::{config, LaundryConfig, NotificationMode};
pub use notify::{build_notifier, DisabledNotifier, Notifier, NotifyError, TwilioNotifier};
pub use observability::{OperationTimer, WorkflowMetrics};
pub use server::{build_app, serve, AppState, OperationResponse};
pub use store::{
    open_store, ContactRecord, DeliveryStatus, InMemoryStore, MoveOutcome, Partition, RecordStore,
    StoreError, StoredRecord,
};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflows::{StatusSnapshot, Transition, WorkflowEngine, WorkflowError, WorkflowOptions};
