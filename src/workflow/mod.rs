//! The approval workflow engine: permission checks, the status state machine,
//! department approval aggregation, edit tracking and notification fan-out.

pub mod audit;
pub mod engine;
pub mod notify;
pub mod permissions;

pub use engine::WorkflowEngine;
