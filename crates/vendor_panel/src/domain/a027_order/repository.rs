use crate::shared::api::{Gateway, GatewayError};
use contracts::domain::a027_order::aggregate::{OrderId, OrderResponse, OrderSummary};
use contracts::domain::common::{AggregateId, AggregateRoot};
use std::sync::Arc;

/// Поля заказа, нужные для сверки статуса возврата денег
const ORDER_FIELDS: &str = "payment_status,payment_collections.payments.refunds";

pub struct OrderRepository {
    gateway: Arc<Gateway>,
}

impl OrderRepository {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn get(&self, id: &OrderId) -> Result<OrderSummary, GatewayError> {
        let path = self
            .gateway
            .path(&[OrderSummary::collection_name(), id.as_str()]);
        let response: OrderResponse = self
            .gateway
            .get(&path, &[("fields", ORDER_FIELDS.to_string())])
            .await?;
        Ok(response.order)
    }
}
