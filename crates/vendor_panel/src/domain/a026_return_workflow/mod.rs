pub mod repository;

pub use repository::ReturnWorkflowRepository;
