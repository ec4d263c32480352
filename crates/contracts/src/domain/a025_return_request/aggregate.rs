use crate::domain::a027_order::aggregate::{OrderId, OrderLineItemId};
use crate::domain::common::{opaque_id, AggregateRoot, Origin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

opaque_id!(
    /// ID заявки на возврат (слой продавца)
    ReturnRequestId
);

opaque_id!(
    /// ID покупателя
    CustomerId
);

/// Статус заявки на возврат
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnRequestStatus {
    Pending,
    Approved,
    Refunded,
    Escalated,
    Withdrawn,
}

impl ReturnRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnRequestStatus::Pending => "pending",
            ReturnRequestStatus::Approved => "approved",
            ReturnRequestStatus::Refunded => "refunded",
            ReturnRequestStatus::Escalated => "escalated",
            ReturnRequestStatus::Withdrawn => "withdrawn",
        }
    }

    /// Допустимые переходы со стороны продавца.
    /// escalated -> (решение администратора) сюда не входит.
    pub fn can_transition_to(&self, next: ReturnRequestStatus) -> bool {
        use ReturnRequestStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Withdrawn) | (Pending, Escalated) | (Approved, Refunded)
        )
    }
}

impl std::fmt::Display for ReturnRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Решение продавца по заявке
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnDecision {
    Approved,
    Withdrawn,
    Escalated,
}

impl ReturnDecision {
    pub fn target_status(&self) -> ReturnRequestStatus {
        match self {
            ReturnDecision::Approved => ReturnRequestStatus::Approved,
            ReturnDecision::Withdrawn => ReturnRequestStatus::Withdrawn,
            ReturnDecision::Escalated => ReturnRequestStatus::Escalated,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "approved" => Some(ReturnDecision::Approved),
            "withdrawn" => Some(ReturnDecision::Withdrawn),
            "escalated" => Some(ReturnDecision::Escalated),
            _ => None,
        }
    }
}

/// Строка заявки на возврат
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRequestLine {
    /// ID строки заявки
    pub id: String,
    /// Строка заказа, которую возвращают
    pub line_item_id: OrderLineItemId,
    /// Запрошенное количество
    pub quantity: i64,
    /// Причина возврата
    #[serde(default)]
    pub reason_id: Option<String>,
}

/// Заявка на возврат (агрегат слоя продавца)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub id: ReturnRequestId,
    pub order_id: OrderId,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub status: ReturnRequestStatus,

    // Решение продавца: заполняется только после решения
    #[serde(default)]
    pub vendor_reviewer_id: Option<String>,
    #[serde(default)]
    pub vendor_reviewer_note: Option<String>,
    #[serde(default)]
    pub vendor_review_date: Option<DateTime<Utc>>,

    // Решение администратора: только для escalated
    #[serde(default)]
    pub admin_reviewer_id: Option<String>,
    #[serde(default)]
    pub admin_reviewer_note: Option<String>,
    #[serde(default)]
    pub admin_review_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub line_items: Vec<ReturnRequestLine>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ReturnRequest {
    /// Продавец уже принял решение по заявке
    pub fn is_reviewed(&self) -> bool {
        self.vendor_review_date.is_some() || self.vendor_reviewer_id.is_some()
    }

    /// Запрошенное количество по строке заказа
    pub fn requested_quantity(&self, line_item_id: &OrderLineItemId) -> Option<i64> {
        self.line_items
            .iter()
            .filter(|line| &line.line_item_id == line_item_id)
            .map(|line| line.quantity)
            .reduce(|a, b| a + b)
    }

    /// Получить количество товаров в заявке
    pub fn total_items_count(&self) -> i64 {
        self.line_items.iter().map(|line| line.quantity).sum()
    }
}

/// Тело POST /return-request/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReturnRequest {
    pub status: ReturnRequestStatus,
    pub vendor_reviewer_note: String,
}

/// Ответ GET/POST /return-request/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRequestResponse {
    pub return_request: ReturnRequest,
}

impl AggregateRoot for ReturnRequest {
    type Id = ReturnRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn aggregate_index() -> &'static str {
        "a025"
    }

    fn collection_name() -> &'static str {
        "return-request"
    }

    fn element_name() -> &'static str {
        "Заявка на возврат"
    }

    fn list_name() -> &'static str {
        "Заявки на возврат"
    }

    fn origin() -> Origin {
        Origin::Vendor
    }
}
