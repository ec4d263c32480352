pub mod repository;

pub use repository::ReturnRequestRepository;
