use crate::shared::api::GatewayError;
use contracts::domain::a025_return_request::aggregate::{ReturnRequestId, ReturnRequestStatus};
use contracts::domain::a026_return_workflow::aggregate::{
    ReceiveItemInput, ReturnWorkflowId, ReturnWorkflowStatus,
};
use contracts::domain::a027_order::aggregate::{OrderId, OrderLineItemId};
use thiserror::Error;

/// Переход статуса заявки, который продавец сделать не может.
/// Проверяется на клиенте, на бэкенд не отправляется.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Return request {request_id} cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub request_id: ReturnRequestId,
    pub from: ReturnRequestStatus,
    pub to: ReturnRequestStatus,
}

/// Ошибки ввода, обнаруженные до обращения к бэкенду
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Reviewer note must not be empty")]
    EmptyNote,

    #[error("No items to receive")]
    NoItems,

    #[error("Quantity for {item_id} must not be negative")]
    NegativeQuantity { item_id: OrderLineItemId },

    #[error("Quantity {quantity} for {item_id} exceeds the requested {requested}")]
    AboveRequested {
        item_id: OrderLineItemId,
        quantity: i64,
        requested: i64,
    },

    #[error("Item {item_id} is not part of the return")]
    UnknownItem { item_id: OrderLineItemId },
}

#[derive(Debug, Error)]
pub enum DecisionError {
    /// По заявке уже выполняется решение или начало приёмки
    #[error("Another operation is in progress for {key}")]
    Busy { key: String },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Error)]
pub enum ReceiveError {
    /// По этому возврату уже выполняется операция
    #[error("Another operation is in progress for {key}")]
    Busy { key: String },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("No return exists for order {order_id}")]
    NoWorkflow { order_id: OrderId },

    #[error("No stock location available for order {order_id}: create a stock location, then start receiving again")]
    NoLocationAvailable { order_id: OrderId },

    #[error("Return {workflow_id} has no received items to confirm")]
    NothingToConfirm { workflow_id: ReturnWorkflowId },

    #[error("Return {workflow_id} is already {status}")]
    WorkflowClosed {
        workflow_id: ReturnWorkflowId,
        status: ReturnWorkflowStatus,
    },

    /// `restore`: последние подтверждённые количества по затронутым строкам
    #[error("{error}")]
    Validation {
        error: ValidationError,
        restore: Vec<ReceiveItemInput>,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ReceiveError {
    /// Исход удалённого шага неизвестен: сессия истекла посреди вызова
    pub fn is_unknown_outcome(&self) -> bool {
        matches!(self, ReceiveError::Gateway(e) if e.is_unknown_outcome())
    }
}

impl From<ValidationError> for ReceiveError {
    fn from(error: ValidationError) -> Self {
        ReceiveError::Validation {
            error,
            restore: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RefundError {
    #[error("Another operation is in progress for {key}")]
    Busy { key: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
