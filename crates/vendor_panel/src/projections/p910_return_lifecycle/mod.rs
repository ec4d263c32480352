pub mod ledger;
pub mod projection_builder;
pub mod service;

pub use ledger::LifecycleLedger;
pub use service::ReconcileService;
