use contracts::domain::a025_return_request::aggregate::{ReturnRequest, ReturnRequestStatus};
use contracts::domain::a026_return_workflow::aggregate::{ReturnWorkflow, ReturnWorkflowStatus};
use contracts::domain::a027_order::aggregate::OrderSummary;
use contracts::projections::p910_return_lifecycle::dto::{
    CompletionSignal, LifecycleSignals, LifecycleStage,
};

/// Прочитанные источники. `None` означает, что источник недоступен или записи нет.
#[derive(Debug, Clone, Default)]
pub struct LifecycleSources {
    pub request: Option<ReturnRequest>,
    pub workflow: Option<ReturnWorkflow>,
    pub order: Option<OrderSummary>,
    /// Хотя бы одно чтение завершилось ошибкой
    pub degraded: bool,
}

impl LifecycleSources {
    pub fn signals(&self) -> LifecycleSignals {
        LifecycleSignals {
            request_status: self.request.as_ref().map(|request| request.status),
            workflow_status: self.workflow.as_ref().map(|workflow| workflow.status),
            payment_status: self.order.as_ref().map(|order| order.payment_status),
            payment_refund_recorded: self
                .order
                .as_ref()
                .map_or(false, OrderSummary::has_recorded_refund),
        }
    }
}

/// Стадия по сигналам; правила проверяются по порядку, первое сработавшее побеждает.
///
/// Любого одного признака завершённого возврата денег достаточно: занижение
/// стадии грозит повторным возвратом.
pub fn derive_stage(signals: &LifecycleSignals) -> (LifecycleStage, Option<CompletionSignal>) {
    if signals.request_status == Some(ReturnRequestStatus::Refunded) {
        return (LifecycleStage::RefundCompleted, Some(CompletionSignal::ReturnRequestRefunded));
    }
    if signals.workflow_status == Some(ReturnWorkflowStatus::Received) {
        return (LifecycleStage::RefundCompleted, Some(CompletionSignal::WorkflowReceived));
    }
    if signals.payment_status.map_or(false, |status| status.indicates_refund()) {
        return (LifecycleStage::RefundCompleted, Some(CompletionSignal::OrderPaymentStatus));
    }
    if signals.payment_refund_recorded {
        return (LifecycleStage::RefundCompleted, Some(CompletionSignal::PaymentRefundRecorded));
    }
    if signals
        .workflow_status
        .map_or(false, |status| status.is_receipt_confirmed())
    {
        return (LifecycleStage::RefundPending, None);
    }
    match signals.request_status {
        Some(ReturnRequestStatus::Pending) | None => (LifecycleStage::PendingDecision, None),
        Some(_) => (LifecycleStage::AwaitingReceipt, None),
    }
}

/// Стадия с учётом недоступных источников: без признака завершения
/// неполные данные дают pending-decision.
pub fn derive_from_sources(
    sources: &LifecycleSources,
) -> (LifecycleStage, Option<CompletionSignal>) {
    let (stage, signal) = derive_stage(&sources.signals());
    if sources.degraded && signal.is_none() {
        return (LifecycleStage::PendingDecision, None);
    }
    (stage, signal)
}
