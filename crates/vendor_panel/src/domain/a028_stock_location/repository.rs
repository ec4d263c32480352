use crate::shared::api::{Gateway, GatewayError};
use contracts::domain::a028_stock_location::aggregate::{StockLocation, StockLocationListResponse};
use contracts::domain::common::AggregateRoot;
use std::sync::Arc;

pub struct StockLocationRepository {
    gateway: Arc<Gateway>,
}

impl StockLocationRepository {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn list(&self) -> Result<Vec<StockLocation>, GatewayError> {
        let path = self.gateway.path(&[StockLocation::collection_name()]);
        let response: StockLocationListResponse = self.gateway.get(&path, &[]).await?;
        Ok(response.stock_locations)
    }
}
