use super::ledger::LifecycleLedger;
use super::projection_builder::{derive_from_sources, LifecycleSources};
use crate::domain::a025_return_request::ReturnRequestRepository;
use crate::domain::a026_return_workflow::ReturnWorkflowRepository;
use crate::domain::a027_order::OrderRepository;
use contracts::domain::a025_return_request::aggregate::ReturnRequestId;
use contracts::projections::p910_return_lifecycle::dto::LifecycleView;
use std::sync::Arc;

/// Сверка статуса возврата по трём источникам (P910).
///
/// Никогда не возвращает ошибку: недоступный источник считается неизвестным.
pub struct ReconcileService {
    requests: Arc<ReturnRequestRepository>,
    workflows: Arc<ReturnWorkflowRepository>,
    orders: Arc<OrderRepository>,
    ledger: LifecycleLedger,
}

impl ReconcileService {
    pub fn new(
        requests: Arc<ReturnRequestRepository>,
        workflows: Arc<ReturnWorkflowRepository>,
        orders: Arc<OrderRepository>,
    ) -> Self {
        Self {
            requests,
            workflows,
            orders,
            ledger: LifecycleLedger::new(),
        }
    }

    pub fn ledger(&self) -> &LifecycleLedger {
        &self.ledger
    }

    /// Прочитать заявку, затем заказ и связанный возврат
    pub async fn load_sources(&self, id: &ReturnRequestId) -> LifecycleSources {
        let request = match self.requests.get(id).await {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Reconcile {}: return request unavailable: {}", id, e);
                return LifecycleSources {
                    degraded: true,
                    ..Default::default()
                };
            }
        };

        let (order, workflow) = tokio::join!(
            self.orders.get(&request.order_id),
            self.workflows.find_for_order(&request.order_id)
        );

        let mut sources = LifecycleSources::default();
        match order {
            Ok(order) => sources.order = Some(order),
            Err(e) => {
                tracing::warn!("Reconcile {}: order {} unavailable: {}", id, request.order_id, e);
                sources.degraded = true;
            }
        }
        match workflow {
            Ok(workflow) => sources.workflow = workflow,
            Err(e) => {
                tracing::warn!(
                    "Reconcile {}: returns of order {} unavailable: {}",
                    id,
                    request.order_id,
                    e
                );
                sources.degraded = true;
            }
        }
        sources.request = Some(request);
        sources
    }

    /// Вывести представление из уже прочитанных источников и прогнать через журнал
    pub fn view_from(&self, id: &ReturnRequestId, sources: &LifecycleSources) -> LifecycleView {
        let (derived, completion_signal) = derive_from_sources(sources);
        let (stage, clamped) = self.ledger.observe(id, derived);
        if clamped {
            tracing::debug!("Reconcile {}: derived {} clamped to {}", id, derived, stage);
        }

        LifecycleView {
            return_request_id: id.clone(),
            order_id: sources.request.as_ref().map(|request| request.order_id.clone()),
            workflow_id: sources.workflow.as_ref().map(|workflow| workflow.id.clone()),
            stage,
            completion_signal,
            signals: sources.signals(),
            degraded: sources.degraded,
            clamped,
        }
    }

    pub async fn load_view(&self, id: &ReturnRequestId) -> LifecycleView {
        let sources = self.load_sources(id).await;
        let view = self.view_from(id, &sources);
        tracing::info!(
            "Return request {} stage: {}{}",
            id,
            view.stage,
            if view.degraded { " (degraded)" } else { "" }
        );
        view
    }
}
