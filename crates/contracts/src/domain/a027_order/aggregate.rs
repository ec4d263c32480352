use crate::domain::common::{opaque_id, AggregateRoot, Origin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

opaque_id!(
    /// ID заказа в ядре коммерции
    OrderId
);

opaque_id!(
    /// ID строки заказа (на неё ссылаются строки заявки и действия приёмки)
    OrderLineItemId
);

/// Статус оплаты заказа
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NotPaid,
    Awaiting,
    Captured,
    PartiallyCaptured,
    PartiallyRefunded,
    Refunded,
    Canceled,
    RequiresAction,
    /// Статус, которого мы не знаем (или заказ не загрузился)
    #[default]
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Статус сам по себе говорит о том, что возврат денег уже был
    pub fn indicates_refund(&self) -> bool {
        matches!(self, PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded)
    }
}

/// Зафиксированный возврат денег по платежу
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefund {
    pub id: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    #[serde(default)]
    pub refunds: Vec<PaymentRefund>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCollection {
    pub id: String,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

/// Заказ (только поля, нужные для сверки статуса возврата)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_collections: Vec<PaymentCollection>,
}

impl OrderSummary {
    /// Хотя бы по одному платежу зафиксирован возврат
    pub fn has_recorded_refund(&self) -> bool {
        self.payment_collections
            .iter()
            .flat_map(|collection| collection.payments.iter())
            .any(|payment| !payment.refunds.is_empty())
    }

    /// Сумма всех зафиксированных возвратов
    pub fn refunded_amount(&self) -> f64 {
        self.payment_collections
            .iter()
            .flat_map(|collection| collection.payments.iter())
            .flat_map(|payment| payment.refunds.iter())
            .filter_map(|refund| refund.amount)
            .sum()
    }
}

/// Ответ GET /orders/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order: OrderSummary,
}

impl AggregateRoot for OrderSummary {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn aggregate_index() -> &'static str {
        "a027"
    }

    fn collection_name() -> &'static str {
        "orders"
    }

    fn element_name() -> &'static str {
        "Заказ"
    }

    fn list_name() -> &'static str {
        "Заказы"
    }

    fn origin() -> Origin {
        Origin::Commerce
    }
}
