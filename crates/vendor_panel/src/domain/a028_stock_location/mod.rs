pub mod repository;

pub use repository::StockLocationRepository;
