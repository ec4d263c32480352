pub mod errors;
pub mod executor;
pub mod session;
pub mod single_flight;


pub use errors::{DecisionError, InvalidTransition, ReceiveError, RefundError, ValidationError};
pub use executor::{
    classify_refund_response, BeginReceiveOptions, LifecycleOrchestrator, Resume, WorkflowHandle,
};
pub use session::ReceiveSession;
