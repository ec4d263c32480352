pub mod repository;

pub use repository::OrderRepository;
