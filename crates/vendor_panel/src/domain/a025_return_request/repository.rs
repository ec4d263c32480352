use crate::shared::api::{Gateway, GatewayError};
use contracts::domain::a025_return_request::aggregate::{
    ReturnRequest, ReturnRequestId, ReturnRequestResponse, ReturnRequestStatus, UpdateReturnRequest,
};
use contracts::domain::common::{AggregateId, AggregateRoot};
use std::sync::Arc;

/// Заявки на возврат (слой продавца)
pub struct ReturnRequestRepository {
    gateway: Arc<Gateway>,
}

impl ReturnRequestRepository {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    fn path(&self, id: &ReturnRequestId) -> String {
        self.gateway
            .path(&[ReturnRequest::collection_name(), id.as_str()])
    }

    pub async fn get(&self, id: &ReturnRequestId) -> Result<ReturnRequest, GatewayError> {
        let response: ReturnRequestResponse = self.gateway.get(&self.path(id), &[]).await?;
        tracing::debug!(
            "{} [{}] {}: status {}",
            ReturnRequest::full_name(),
            ReturnRequest::origin(),
            id,
            response.return_request.status
        );
        Ok(response.return_request)
    }

    /// Записать решение продавца: статус и комментарий одним вызовом
    pub async fn update_status(
        &self,
        id: &ReturnRequestId,
        status: ReturnRequestStatus,
        note: &str,
    ) -> Result<ReturnRequest, GatewayError> {
        let body = UpdateReturnRequest {
            status,
            vendor_reviewer_note: note.to_string(),
        };
        let response: ReturnRequestResponse = self.gateway.post(&self.path(id), &body).await?;
        tracing::info!("Return request {} moved to {}", id, response.return_request.status);
        Ok(response.return_request)
    }
}
