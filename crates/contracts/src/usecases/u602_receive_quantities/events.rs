use crate::domain::a026_return_workflow::aggregate::ActionKind;
use crate::domain::a027_order::aggregate::OrderLineItemId;
use serde::{Deserialize, Serialize};

/// Почему ввод отклонён до обращения к бэкенду
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityRejection {
    Negative,
    AboveRequested,
    UnknownItem,
}

/// Итог правки количества (публикуется для UI)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditOutcome {
    /// Изменение зафиксировано на бэкенде
    #[serde(rename = "committed")]
    Committed {
        item_id: OrderLineItemId,
        kind: ActionKind,
        quantity: i64,
        generation: u64,
    },

    /// Ввод отклонён локально, показанное значение восстановлено
    #[serde(rename = "rejected")]
    Rejected {
        item_id: OrderLineItemId,
        kind: ActionKind,
        reason: QuantityRejection,
        restored: Option<i64>,
    },

    /// Бэкенд вернул ошибку, показанное значение откатано
    #[serde(rename = "rolled_back")]
    RolledBack {
        item_id: OrderLineItemId,
        kind: ActionKind,
        restored: Option<i64>,
        error: String,
    },

    /// Ответ устарел: после него уже было более новое изменение
    #[serde(rename = "superseded")]
    Superseded {
        item_id: OrderLineItemId,
        kind: ActionKind,
        generation: u64,
    },
}
