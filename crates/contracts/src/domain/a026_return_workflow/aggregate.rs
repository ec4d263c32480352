use crate::domain::a027_order::aggregate::{OrderId, OrderLineItemId};
use crate::domain::a028_stock_location::aggregate::StockLocationId;
use crate::domain::common::{opaque_id, AggregateRoot, Origin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

opaque_id!(
    /// ID возврата в ядре коммерции
    ReturnWorkflowId
);

opaque_id!(
    /// ID действия приёмки (нужен для update/remove)
    ActionId
);

/// Статус возврата в ядре коммерции
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnWorkflowStatus {
    Requested,
    PartiallyReceived,
    Received,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl ReturnWorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnWorkflowStatus::Requested => "requested",
            ReturnWorkflowStatus::PartiallyReceived => "partially_received",
            ReturnWorkflowStatus::Received => "received",
            ReturnWorkflowStatus::Cancelled => "cancelled",
        }
    }

    /// Приёмка подтверждена (полностью или частично)
    pub fn is_receipt_confirmed(&self) -> bool {
        matches!(
            self,
            ReturnWorkflowStatus::Received | ReturnWorkflowStatus::PartiallyReceived
        )
    }
}

impl std::fmt::Display for ReturnWorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Вид действия по строке: принято или списано как брак
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "RECEIVE_RETURN_ITEM")]
    Receive,
    #[serde(rename = "RECEIVE_DAMAGED_RETURN_ITEM")]
    Dismiss,
}

impl ActionKind {
    /// Сегмент пути для мутаций действий этого вида
    pub fn items_path(&self) -> &'static str {
        match self {
            ActionKind::Receive => "receive/items",
            ActionKind::Dismiss => "dismiss-items",
        }
    }
}

/// Действие приёмки по строке возврата
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveAction {
    pub id: ActionId,
    #[serde(rename = "action")]
    pub kind: ActionKind,
    pub item_id: OrderLineItemId,
    pub quantity: i64,
}

/// Строка возврата
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnWorkflowItem {
    pub item_id: OrderLineItemId,
    /// Запрошенное количество (верхняя граница для приёмки)
    pub quantity: i64,
    #[serde(default)]
    pub received_quantity: i64,
    #[serde(default)]
    pub damaged_quantity: i64,
}

/// Возврат в ядре коммерции (исполнение приёмки)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnWorkflow {
    pub id: ReturnWorkflowId,
    pub order_id: OrderId,
    pub status: ReturnWorkflowStatus,
    #[serde(default)]
    pub location_id: Option<StockLocationId>,
    #[serde(default)]
    pub items: Vec<ReturnWorkflowItem>,
    /// Незафиксированные действия приёмки
    #[serde(default)]
    pub actions: Vec<ReceiveAction>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ReturnWorkflow {
    pub fn action_for(
        &self,
        kind: ActionKind,
        item_id: &OrderLineItemId,
    ) -> Option<&ReceiveAction> {
        self.actions
            .iter()
            .find(|action| action.kind == kind && &action.item_id == item_id)
    }

    pub fn requested_quantity(&self, item_id: &OrderLineItemId) -> Option<i64> {
        self.items
            .iter()
            .find(|item| &item.item_id == item_id)
            .map(|item| item.quantity)
    }

    pub fn has_receive_actions(&self) -> bool {
        self.actions
            .iter()
            .any(|action| action.kind == ActionKind::Receive && action.quantity > 0)
    }
}

/// Позиция для приёмки: строка заказа и количество
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveItemInput {
    pub id: OrderLineItemId,
    pub quantity: i64,
}

impl ReceiveItemInput {
    pub fn new(id: impl Into<String>, quantity: i64) -> Self {
        Self {
            id: OrderLineItemId(id.into()),
            quantity,
        }
    }
}

/// Тело POST /returns/{id}/receive
///
/// Позиции должны передаваться в том же вызове, который создаёт набор действий,
/// иначе возврат получится без позиций для приёмки.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeginReceiveRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ReceiveItemInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Тело POST /returns (создание возврата по заказу)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReturnWorkflowRequest {
    pub order_id: OrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<StockLocationId>,
    pub items: Vec<ReceiveItemInput>,
}

/// Тело POST .../items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddActionItemsRequest {
    pub items: Vec<ReceiveItemInput>,
}

/// Тело POST .../items/{actionId}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateActionRequest {
    pub quantity: i64,
}

/// Тело POST /returns/{id}/receive/confirm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmReceiveRequest {
    pub no_notification: bool,
}

/// Тело POST /returns/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignLocationRequest {
    pub location_id: StockLocationId,
}

/// Ответ на чтение и мутации возврата
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnWorkflowResponse {
    #[serde(rename = "return")]
    pub workflow: ReturnWorkflow,
}

/// Ответ GET /returns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnWorkflowListResponse {
    #[serde(default)]
    pub returns: Vec<ReturnWorkflow>,
    #[serde(default)]
    pub count: Option<i64>,
}

/// Фильтр списка возвратов.
/// Бэкенд не умеет фильтровать по таблице связей, поэтому фильтр применяется на клиенте.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReturnWorkflowFilter {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub status: Option<ReturnWorkflowStatus>,
}

impl ReturnWorkflowFilter {
    pub fn by_order(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            status: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() && self.status.is_none()
    }

    pub fn matches(&self, workflow: &ReturnWorkflow) -> bool {
        let order_ok = self
            .order_id
            .as_ref()
            .map_or(true, |order_id| &workflow.order_id == order_id);
        let status_ok = self.status.map_or(true, |status| workflow.status == status);
        order_ok && status_ok
    }
}

impl AggregateRoot for ReturnWorkflow {
    type Id = ReturnWorkflowId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn aggregate_index() -> &'static str {
        "a026"
    }

    fn collection_name() -> &'static str {
        "returns"
    }

    fn element_name() -> &'static str {
        "Возврат"
    }

    fn list_name() -> &'static str {
        "Возвраты"
    }

    fn origin() -> Origin {
        Origin::Commerce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow(order_id: &str, status: ReturnWorkflowStatus) -> ReturnWorkflow {
        ReturnWorkflow {
            id: ReturnWorkflowId::new("rw_1"),
            order_id: OrderId::new(order_id),
            status,
            location_id: None,
            items: vec![],
            actions: vec![],
            created_at: None,
        }
    }

    #[test]
    fn test_filter_matches_order_and_status() {
        let filter = ReturnWorkflowFilter {
            order_id: Some(OrderId::new("order_1")),
            status: Some(ReturnWorkflowStatus::Requested),
        };
        assert!(filter.matches(&workflow("order_1", ReturnWorkflowStatus::Requested)));
        assert!(!filter.matches(&workflow("order_2", ReturnWorkflowStatus::Requested)));
        assert!(!filter.matches(&workflow("order_1", ReturnWorkflowStatus::Received)));
        assert!(ReturnWorkflowFilter::default()
            .matches(&workflow("x", ReturnWorkflowStatus::Cancelled)));
    }

    #[test]
    fn test_begin_receive_body_skips_empty_fields() {
        let body = serde_json::to_value(BeginReceiveRequest {
            items: vec![ReceiveItemInput::new("li_1", 2)],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"items": [{"id": "li_1", "quantity": 2}]}));
    }

    #[test]
    fn test_actions_deserialize_with_wire_names() {
        let wf: ReturnWorkflow = serde_json::from_str(
            r#"{
                "id": "rw_1",
                "order_id": "order_1",
                "status": "canceled",
                "items": [{"item_id": "li_1", "quantity": 2}],
                "actions": [
                    {"id": "act_1", "action": "RECEIVE_RETURN_ITEM", "item_id": "li_1", "quantity": 2},
                    {"id": "act_2", "action": "RECEIVE_DAMAGED_RETURN_ITEM", "item_id": "li_1", "quantity": 0}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(wf.status, ReturnWorkflowStatus::Cancelled);
        let li = OrderLineItemId::new("li_1");
        assert_eq!(wf.action_for(ActionKind::Receive, &li).unwrap().id, ActionId::new("act_1"));
        assert_eq!(wf.action_for(ActionKind::Dismiss, &li).unwrap().quantity, 0);
        assert_eq!(wf.requested_quantity(&li), Some(2));
        assert!(wf.has_receive_actions());
    }
}
