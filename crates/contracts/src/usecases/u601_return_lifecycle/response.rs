use crate::domain::a026_return_workflow::aggregate::ReturnWorkflowId;
use serde::{Deserialize, Serialize};

/// Итог вызова возврата денег
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundOutcome {
    /// Возврат выполнен этим вызовом
    Refunded,
    /// Бэкенд сообщил, что возврат уже был выполнен ранее
    AlreadyRefunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub workflow_id: ReturnWorkflowId,
    pub outcome: RefundOutcome,
    #[serde(default)]
    pub message: Option<String>,
}

/// Следующий шаг, с которого можно продолжить обработку возврата
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "workflow_id", rename_all = "snake_case")]
pub enum ResumePoint {
    Decide,
    BeginReceive,
    MarkItems(ReturnWorkflowId),
    Confirm(ReturnWorkflowId),
    Refund(ReturnWorkflowId),
    /// Возврат денег завершён
    Done,
    /// Заявка отозвана или передана администратору
    Closed,
}
