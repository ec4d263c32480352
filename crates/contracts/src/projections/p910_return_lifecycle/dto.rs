use crate::domain::a025_return_request::aggregate::{ReturnRequestId, ReturnRequestStatus};
use crate::domain::a026_return_workflow::aggregate::{ReturnWorkflowId, ReturnWorkflowStatus};
use crate::domain::a027_order::aggregate::{OrderId, PaymentStatus};
use serde::{Deserialize, Serialize};

/// Сводная стадия возврата (P910)
///
/// Порядок вариантов задаёт порядок стадий: сравнение `<` означает "раньше".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleStage {
    PendingDecision,
    AwaitingReceipt,
    ReadyToRefund,
    RefundPending,
    RefundCompleted,
}

impl LifecycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::PendingDecision => "pending-decision",
            LifecycleStage::AwaitingReceipt => "awaiting-receipt",
            LifecycleStage::ReadyToRefund => "ready-to-refund",
            LifecycleStage::RefundPending => "refund-pending",
            LifecycleStage::RefundCompleted => "refund-completed",
        }
    }

    pub fn is_refund_completed(&self) -> bool {
        matches!(self, LifecycleStage::RefundCompleted)
    }
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Какой из источников сообщил о завершённом возврате денег
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSignal {
    ReturnRequestRefunded,
    WorkflowReceived,
    OrderPaymentStatus,
    PaymentRefundRecorded,
}

/// Входные сигналы, из которых была выведена стадия
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleSignals {
    pub request_status: Option<ReturnRequestStatus>,
    pub workflow_status: Option<ReturnWorkflowStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_refund_recorded: bool,
}

impl LifecycleSignals {
    /// Деньги уже вернули: заявка `refunded`, статус оплаты или запись о возврате.
    /// Статус приёмки `received` сюда не входит.
    pub fn refund_observed(&self) -> bool {
        self.request_status == Some(ReturnRequestStatus::Refunded)
            || self.payment_status.map_or(false, |status| status.indicates_refund())
            || self.payment_refund_recorded
    }
}

/// Сводное представление жизненного цикла возврата (не хранится, считается при чтении)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleView {
    pub return_request_id: ReturnRequestId,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub workflow_id: Option<ReturnWorkflowId>,
    pub stage: LifecycleStage,
    #[serde(default)]
    pub completion_signal: Option<CompletionSignal>,
    pub signals: LifecycleSignals,
    /// Часть источников не загрузилась
    #[serde(default)]
    pub degraded: bool,
    /// Стадия поднята до ранее наблюдавшейся
    #[serde(default)]
    pub clamped: bool,
}
