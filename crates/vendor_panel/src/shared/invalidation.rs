use contracts::domain::a025_return_request::aggregate::ReturnRequestId;
use contracts::domain::a026_return_workflow::aggregate::ReturnWorkflowId;
use contracts::domain::a027_order::aggregate::OrderId;
use std::sync::{Mutex, PoisonError};

/// Кэшированное представление, которое надо перечитать после мутации
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvalidationTarget {
    ReturnRequest(ReturnRequestId),
    Order(OrderId),
    ReturnWorkflow(ReturnWorkflowId),
    ReturnWorkflowList(OrderId),
}

/// Получатель сигналов инвалидации (UI-кэш, подписки экранов)
pub trait InvalidationSink: Send + Sync {
    fn invalidate(&self, target: InvalidationTarget);
}

/// Только пишет в лог
pub struct TracingInvalidation;

impl InvalidationSink for TracingInvalidation {
    fn invalidate(&self, target: InvalidationTarget) {
        tracing::debug!("Invalidate {:?}", target);
    }
}

/// Запоминает все сигналы, удобно для проверки и для отладки экранов
#[derive(Default)]
pub struct RecordingInvalidation {
    targets: Mutex<Vec<InvalidationTarget>>,
}

impl RecordingInvalidation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> Vec<InvalidationTarget> {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, target: &InvalidationTarget) -> bool {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(target)
    }

    pub fn clear(&self) {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl InvalidationSink for RecordingInvalidation {
    fn invalidate(&self, target: InvalidationTarget) {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target);
    }
}
