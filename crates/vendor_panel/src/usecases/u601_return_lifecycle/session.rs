use super::errors::ReceiveError;
use super::executor::{LifecycleOrchestrator, WorkflowHandle};
use contracts::domain::a026_return_workflow::aggregate::{ReceiveItemInput, ReturnWorkflow};
use std::sync::Arc;

/// Открытая форма приёмки.
///
/// Если форму закрыли без подтверждения, приёмка отменяется ровно один раз:
/// явно через `abandon`, иначе при уничтожении сессии.
pub struct ReceiveSession {
    orchestrator: Arc<LifecycleOrchestrator>,
    handle: WorkflowHandle,
    armed: bool,
}

impl ReceiveSession {
    pub(crate) fn new(orchestrator: Arc<LifecycleOrchestrator>, handle: WorkflowHandle) -> Self {
        Self {
            orchestrator,
            handle,
            armed: true,
        }
    }

    pub fn handle(&self) -> &WorkflowHandle {
        &self.handle
    }

    /// Отменит ли сессия приёмку, если её бросить
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub async fn mark_items_received(
        &self,
        items: &[ReceiveItemInput],
    ) -> Result<ReturnWorkflow, ReceiveError> {
        self.orchestrator.mark_items_received(&self.handle, items).await
    }

    /// Подтвердить приёмку; после успеха сессия больше ничего не отменяет.
    ///
    /// Если исход подтверждения неизвестен или возврат уже закрыт, сессия тоже
    /// снимается с охраны: отмена могла бы задеть подтверждённую приёмку.
    pub async fn confirm(&mut self, notify_customer: bool) -> Result<ReturnWorkflow, ReceiveError> {
        match self
            .orchestrator
            .confirm_receive(&self.handle, notify_customer)
            .await
        {
            Ok(workflow) => {
                self.armed = false;
                Ok(workflow)
            }
            Err(e) => {
                if e.is_unknown_outcome() || matches!(e, ReceiveError::WorkflowClosed { .. }) {
                    self.armed = false;
                    tracing::warn!(
                        "Return {}: confirm failed ({}), not cancelling, left for manual reconciliation",
                        self.handle.workflow_id,
                        e
                    );
                }
                Err(e)
            }
        }
    }

    /// Форму закрыли без подтверждения
    pub async fn abandon(mut self) -> Result<(), ReceiveError> {
        if !std::mem::replace(&mut self.armed, false) {
            return Ok(());
        }
        self.orchestrator.abandon_receive(&self.handle).await
    }
}

impl Drop for ReceiveSession {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        let orchestrator = self.orchestrator.clone();
        let handle = self.handle.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::info!(
                    "Receive form for return {} dropped, cancelling",
                    handle.workflow_id
                );
                runtime.spawn(async move {
                    // ошибка уже записана в лог, повторять не будем
                    let _ = orchestrator.abandon_receive(&handle).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    "Receive form for return {} dropped outside a runtime, left for manual reconciliation",
                    handle.workflow_id
                );
            }
        }
    }
}
