use crate::shared::api::{Gateway, GatewayError, HttpMethod};
use contracts::domain::a026_return_workflow::aggregate::{
    ActionId, ActionKind, AddActionItemsRequest, AssignLocationRequest, BeginReceiveRequest,
    ConfirmReceiveRequest, CreateReturnWorkflowRequest, ReceiveItemInput, ReturnWorkflow,
    ReturnWorkflowFilter, ReturnWorkflowId, ReturnWorkflowListResponse, ReturnWorkflowResponse,
    ReturnWorkflowStatus, UpdateActionRequest,
};
use contracts::domain::a027_order::aggregate::OrderId;
use contracts::domain::a028_stock_location::aggregate::StockLocationId;
use contracts::domain::common::{AggregateId, AggregateRoot};
use serde_json::{json, Value};
use std::sync::Arc;

/// Возвраты ядра коммерции: чтение, приёмка, возврат денег
pub struct ReturnWorkflowRepository {
    gateway: Arc<Gateway>,
    list_limit: u32,
}

impl ReturnWorkflowRepository {
    pub fn new(gateway: Arc<Gateway>, list_limit: u32) -> Self {
        Self { gateway, list_limit }
    }

    fn path(&self, id: &ReturnWorkflowId, tail: &[&str]) -> String {
        let mut segments = vec![ReturnWorkflow::collection_name(), id.as_str()];
        segments.extend_from_slice(tail);
        self.gateway.path(&segments)
    }

    fn action_path(
        &self,
        id: &ReturnWorkflowId,
        kind: ActionKind,
        action_id: Option<&ActionId>,
    ) -> String {
        let mut tail: Vec<&str> = kind.items_path().split('/').collect();
        if let Some(action_id) = action_id {
            tail.push(action_id.as_str());
        }
        self.path(id, &tail)
    }

    /// Список возвратов.
    ///
    /// Бэкенд не фильтрует по связи с заказом, поэтому при любом фильтре
    /// запрашиваем большую страницу и отбираем записи здесь.
    pub async fn list(
        &self,
        filter: &ReturnWorkflowFilter,
    ) -> Result<Vec<ReturnWorkflow>, GatewayError> {
        let path = self.gateway.path(&[ReturnWorkflow::collection_name()]);
        let mut query = Vec::new();
        if !filter.is_empty() {
            query.push(("limit", self.list_limit.to_string()));
            if let Some(order_id) = &filter.order_id {
                query.push(("order_id", order_id.as_string()));
            }
            if let Some(status) = filter.status {
                query.push(("status", status.as_str().to_string()));
            }
        }

        let response: ReturnWorkflowListResponse = self.gateway.get(&path, &query).await?;
        let total = response.returns.len();
        let matched: Vec<ReturnWorkflow> = response
            .returns
            .into_iter()
            .filter(|workflow| filter.matches(workflow))
            .collect();
        tracing::debug!("Returns list: {} of {} matched filter {:?}", matched.len(), total, filter);
        Ok(matched)
    }

    /// Возврат, связанный с заказом: самый новый неотменённый,
    /// иначе самый новый отменённый.
    pub async fn find_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<ReturnWorkflow>, GatewayError> {
        let mut workflows = self.list(&ReturnWorkflowFilter::by_order(order_id.clone())).await?;
        workflows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let active = workflows
            .iter()
            .position(|workflow| workflow.status != ReturnWorkflowStatus::Cancelled);
        Ok(match active {
            Some(index) => Some(workflows.swap_remove(index)),
            None => workflows.into_iter().next(),
        })
    }

    pub async fn get(&self, id: &ReturnWorkflowId) -> Result<ReturnWorkflow, GatewayError> {
        let response: ReturnWorkflowResponse = self.gateway.get(&self.path(id, &[]), &[]).await?;
        tracing::debug!(
            "{} [{}] {}: status {}, {} action(s)",
            ReturnWorkflow::full_name(),
            ReturnWorkflow::origin(),
            id,
            response.workflow.status,
            response.workflow.actions.len()
        );
        Ok(response.workflow)
    }

    pub async fn create(
        &self,
        request: &CreateReturnWorkflowRequest,
    ) -> Result<ReturnWorkflow, GatewayError> {
        let path = self.gateway.path(&[ReturnWorkflow::collection_name()]);
        let response: ReturnWorkflowResponse = self.gateway.post(&path, request).await?;
        tracing::info!(
            "Return {} created for order {} with {} item(s)",
            response.workflow.id,
            request.order_id,
            request.items.len()
        );
        Ok(response.workflow)
    }

    pub async fn assign_location(
        &self,
        id: &ReturnWorkflowId,
        location_id: &StockLocationId,
    ) -> Result<ReturnWorkflow, GatewayError> {
        let body = AssignLocationRequest {
            location_id: location_id.clone(),
        };
        let response: ReturnWorkflowResponse = self.gateway.post(&self.path(id, &[]), &body).await?;
        Ok(response.workflow)
    }

    pub async fn begin_receive(
        &self,
        id: &ReturnWorkflowId,
        request: &BeginReceiveRequest,
    ) -> Result<ReturnWorkflow, GatewayError> {
        let response: ReturnWorkflowResponse = self
            .gateway
            .post(&self.path(id, &["receive"]), request)
            .await?;
        Ok(response.workflow)
    }

    pub async fn add_actions(
        &self,
        id: &ReturnWorkflowId,
        kind: ActionKind,
        items: Vec<ReceiveItemInput>,
    ) -> Result<ReturnWorkflow, GatewayError> {
        let body = AddActionItemsRequest { items };
        let response: ReturnWorkflowResponse = self
            .gateway
            .post(&self.action_path(id, kind, None), &body)
            .await?;
        Ok(response.workflow)
    }

    pub async fn update_action(
        &self,
        id: &ReturnWorkflowId,
        kind: ActionKind,
        action_id: &ActionId,
        quantity: i64,
    ) -> Result<ReturnWorkflow, GatewayError> {
        let body = UpdateActionRequest { quantity };
        let response: ReturnWorkflowResponse = self
            .gateway
            .post(&self.action_path(id, kind, Some(action_id)), &body)
            .await?;
        Ok(response.workflow)
    }

    /// Удалить действие. Бэкенд может ответить без тела, тогда `None`.
    pub async fn remove_action(
        &self,
        id: &ReturnWorkflowId,
        kind: ActionKind,
        action_id: &ActionId,
    ) -> Result<Option<ReturnWorkflow>, GatewayError> {
        let value = self
            .gateway
            .delete(&self.action_path(id, kind, Some(action_id)))
            .await?;
        Ok(workflow_from(value))
    }

    pub async fn confirm_receive(
        &self,
        id: &ReturnWorkflowId,
        notify_customer: bool,
    ) -> Result<ReturnWorkflow, GatewayError> {
        let body = ConfirmReceiveRequest {
            no_notification: !notify_customer,
        };
        let response: ReturnWorkflowResponse = self
            .gateway
            .post(&self.path(id, &["receive", "confirm"]), &body)
            .await?;
        tracing::info!("Return {} receipt confirmed: {}", id, response.workflow.status);
        Ok(response.workflow)
    }

    pub async fn cancel_receive(
        &self,
        id: &ReturnWorkflowId,
    ) -> Result<Option<ReturnWorkflow>, GatewayError> {
        let value = self
            .gateway
            .call(
                HttpMethod::Post,
                &self.path(id, &["cancel-receive"]),
                Some(&json!({})),
                &[],
            )
            .await?;
        Ok(workflow_from(value))
    }

    /// Возврат денег. Тело ответа отдаётся как есть: его разбирает
    /// классификатор идемпотентного ответа.
    pub async fn refund(&self, id: &ReturnWorkflowId) -> Result<Value, GatewayError> {
        self.gateway
            .call(
                HttpMethod::Post,
                &self.path(id, &["refund"]),
                Some(&json!({})),
                &[],
            )
            .await
    }
}

fn workflow_from(value: Value) -> Option<ReturnWorkflow> {
    serde_json::from_value::<ReturnWorkflowResponse>(value)
        .ok()
        .map(|response| response.workflow)
}
