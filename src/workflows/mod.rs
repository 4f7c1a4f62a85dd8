// Workflow orchestration modules
// Records only ever move forward: inWork -> readyForDelivery -> history

pub mod engine;
pub mod errors;
pub mod state_machine;

pub use engine::{StatusSnapshot, WorkflowEngine, WorkflowOptions};
pub use errors::{WorkflowError, DUPLICATE_CONTACT_MESSAGE};
pub use state_machine::Transition;
