use crate::domain::common::{opaque_id, AggregateRoot, Origin};
use serde::{Deserialize, Serialize};

opaque_id!(
    /// ID склада, куда приходит возвращённый товар
    StockLocationId
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLocation {
    pub id: StockLocationId,
    #[serde(default)]
    pub name: String,
}

/// Ответ GET /stock-locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLocationListResponse {
    #[serde(default)]
    pub stock_locations: Vec<StockLocation>,
}

impl AggregateRoot for StockLocation {
    type Id = StockLocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn aggregate_index() -> &'static str {
        "a028"
    }

    fn collection_name() -> &'static str {
        "stock-locations"
    }

    fn element_name() -> &'static str {
        "Склад"
    }

    fn list_name() -> &'static str {
        "Склады"
    }

    fn origin() -> Origin {
        Origin::Commerce
    }
}
