use super::errors::{DecisionError, InvalidTransition, ReceiveError, RefundError, ValidationError};
use super::session::ReceiveSession;
use super::single_flight::{FlightPermit, SingleFlight};
use crate::domain::a025_return_request::ReturnRequestRepository;
use crate::domain::a026_return_workflow::ReturnWorkflowRepository;
use crate::domain::a027_order::OrderRepository;
use crate::domain::a028_stock_location::StockLocationRepository;
use crate::projections::p910_return_lifecycle::ReconcileService;
use crate::shared::api::{Gateway, GatewayError};
use crate::shared::invalidation::{InvalidationSink, InvalidationTarget};
use crate::usecases::u602_receive_quantities::editor::{
    check_quantity, QuantityEditor, QuantityError, WorkflowGate,
};
use contracts::domain::a025_return_request::aggregate::{
    ReturnDecision, ReturnRequest, ReturnRequestId, ReturnRequestStatus,
};
use contracts::domain::a026_return_workflow::aggregate::{
    ActionKind, BeginReceiveRequest, CreateReturnWorkflowRequest, ReceiveItemInput, ReturnWorkflow,
    ReturnWorkflowId, ReturnWorkflowStatus,
};
use contracts::domain::a027_order::aggregate::{OrderId, OrderLineItemId};
use contracts::domain::a028_stock_location::aggregate::StockLocationId;
use contracts::projections::p910_return_lifecycle::dto::LifecycleView;
use contracts::usecases::u601_return_lifecycle::response::{
    RefundOutcome, RefundResult, ResumePoint,
};
use contracts::usecases::u602_receive_quantities::events::QuantityRejection;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedRwLockWriteGuard;

/// Ссылка на возврат, с которым работает приёмка и возврат денег
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowHandle {
    pub workflow_id: ReturnWorkflowId,
    pub request_id: ReturnRequestId,
    pub order_id: OrderId,
}

impl WorkflowHandle {
    pub fn new(workflow: &ReturnWorkflow, request_id: &ReturnRequestId) -> Self {
        Self {
            workflow_id: workflow.id.clone(),
            request_id: request_id.clone(),
            order_id: workflow.order_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BeginReceiveOptions {
    /// Создать возврат, если по заказу его ещё нет
    pub auto_create: bool,
    /// Явный набор позиций; по умолчанию все строки заявки
    pub items: Option<Vec<ReceiveItemInput>>,
    pub internal_note: Option<String>,
    pub description: Option<String>,
}

impl Default for BeginReceiveOptions {
    fn default() -> Self {
        Self {
            auto_create: true,
            items: None,
            internal_note: None,
            description: None,
        }
    }
}

/// Точка продолжения после повторного открытия экрана
#[derive(Debug, Clone, Serialize)]
pub struct Resume {
    pub point: ResumePoint,
    pub handle: Option<WorkflowHandle>,
    pub view: LifecycleView,
}

/// Редакторы количеств открытого возврата и их общий замок
#[derive(Default)]
struct WorkflowEditors {
    gate: WorkflowGate,
    editors: HashMap<ActionKind, QuantityEditor>,
}

/// Оркестратор жизненного цикла возврата (U601):
/// решение по заявке, приёмка товара, возврат денег.
pub struct LifecycleOrchestrator {
    requests: Arc<ReturnRequestRepository>,
    workflows: Arc<ReturnWorkflowRepository>,
    locations: StockLocationRepository,
    reconciler: ReconcileService,
    invalidation: Arc<dyn InvalidationSink>,
    flights: SingleFlight,
    /// Последний известный статус заявок (статусы только растут)
    known_status: Mutex<HashMap<ReturnRequestId, ReturnRequestStatus>>,
    /// Последний прочитанный снимок возвратов
    snapshots: Mutex<HashMap<ReturnWorkflowId, ReturnWorkflow>>,
    /// Один набор редакторов на возврат: правки одной строки из любого
    /// источника идут через одну очередь
    editors: Mutex<HashMap<ReturnWorkflowId, WorkflowEditors>>,
}

fn request_key(id: &ReturnRequestId) -> String {
    format!("return-request:{}", id)
}

fn workflow_key(id: &ReturnWorkflowId) -> String {
    format!("return:{}", id)
}

impl LifecycleOrchestrator {
    pub fn new(
        gateway: Arc<Gateway>,
        list_limit: u32,
        invalidation: Arc<dyn InvalidationSink>,
    ) -> Self {
        let requests = Arc::new(ReturnRequestRepository::new(gateway.clone()));
        let workflows = Arc::new(ReturnWorkflowRepository::new(gateway.clone(), list_limit));
        let orders = Arc::new(OrderRepository::new(gateway.clone()));
        let reconciler = ReconcileService::new(requests.clone(), workflows.clone(), orders);

        Self {
            requests,
            workflows,
            locations: StockLocationRepository::new(gateway),
            reconciler,
            invalidation,
            flights: SingleFlight::new(),
            known_status: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(HashMap::new()),
            editors: Mutex::new(HashMap::new()),
        }
    }

    pub fn reconciler(&self) -> &ReconcileService {
        &self.reconciler
    }

    /// Последний снимок возврата, прочитанный оркестратором
    pub fn snapshot(&self, id: &ReturnWorkflowId) -> Option<ReturnWorkflow> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn known_status(&self, id: &ReturnRequestId) -> Option<ReturnRequestStatus> {
        self.known_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
    }

    fn remember_status(&self, id: &ReturnRequestId, status: ReturnRequestStatus) {
        self.known_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), status);
    }

    fn forget_status(&self, id: &ReturnRequestId) {
        self.known_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Заявка закрыта окончательно: её состояние больше не держим
    pub fn forget_request(&self, id: &ReturnRequestId) {
        self.forget_status(id);
        self.reconciler.ledger().forget(id);
    }

    fn remember_workflow(&self, workflow: &ReturnWorkflow) {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(workflow.id.clone(), workflow.clone());
    }

    /// Редактор возврата; существующий сверяется со свежим снимком
    fn editor_for(&self, workflow: &ReturnWorkflow, kind: ActionKind) -> QuantityEditor {
        let mut editors = self.editors.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = editors.entry(workflow.id.clone()).or_default();
        if let Some(editor) = entry.editors.get(&kind) {
            editor.reconcile(workflow);
            return editor.clone();
        }
        let editor =
            QuantityEditor::with_gate(self.workflows.clone(), workflow, kind, entry.gate.clone());
        entry.editors.insert(kind, editor.clone());
        editor
    }

    fn open_editors(&self, id: &ReturnWorkflowId) -> Vec<QuantityEditor> {
        self.editors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|entry| entry.editors.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Исключительный доступ к возврату: отказ, пока правки строк не завершены
    fn exclusive(&self, id: &ReturnWorkflowId) -> Result<OwnedRwLockWriteGuard<()>, ReceiveError> {
        let (gate, in_flight) = {
            let mut editors = self.editors.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = editors.entry(id.clone()).or_default();
            let in_flight: usize = entry.editors.values().map(QuantityEditor::in_flight).sum();
            (entry.gate.clone(), in_flight)
        };
        let busy = || {
            tracing::warn!("Return {}: {} quantity edit(s) still in flight", id, in_flight);
            ReceiveError::Busy {
                key: workflow_key(id),
            }
        };
        if in_flight > 0 {
            return Err(busy());
        }
        gate.try_write_owned().map_err(|_| busy())
    }

    /// Возврат закрыт: его редакторы больше не нужны
    fn close_editors(&self, id: &ReturnWorkflowId) {
        self.editors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    fn invalidate(&self, targets: impl IntoIterator<Item = InvalidationTarget>) {
        for target in targets {
            self.invalidation.invalidate(target);
        }
    }

    fn acquire(&self, key: String) -> Result<FlightPermit, String> {
        match self.flights.try_acquire(&key) {
            Some(permit) => Ok(permit),
            None => {
                tracing::warn!("Rejected concurrent operation on {}", key);
                Err(key)
            }
        }
    }

    /// Сводная стадия заявки; заодно запоминает её статус
    pub async fn view(&self, request_id: &ReturnRequestId) -> LifecycleView {
        let sources = self.reconciler.load_sources(request_id).await;
        if let Some(request) = &sources.request {
            self.remember_status(request_id, request.status);
        }
        if let Some(workflow) = &sources.workflow {
            self.remember_workflow(workflow);
        }
        self.reconciler.view_from(request_id, &sources)
    }

    // ------------------------------------------------------------------
    // Решение по заявке
    // ------------------------------------------------------------------

    /// Решение продавца. Разрешено только из `pending`; при известном статусе
    /// недопустимый переход отклоняется без обращения к бэкенду.
    pub async fn decide(
        &self,
        request_id: &ReturnRequestId,
        decision: ReturnDecision,
        note: &str,
    ) -> Result<ReturnRequest, DecisionError> {
        if note.trim().is_empty() {
            return Err(ValidationError::EmptyNote.into());
        }
        let _permit = self
            .acquire(request_key(request_id))
            .map_err(|key| DecisionError::Busy { key })?;

        let target = decision.target_status();
        let current = match self.known_status(request_id) {
            Some(status) => status,
            None => {
                let request = self.requests.get(request_id).await?;
                self.remember_status(request_id, request.status);
                request.status
            }
        };
        if current != ReturnRequestStatus::Pending {
            tracing::warn!(
                "Return request {}: decision {:?} rejected, status is {}",
                request_id,
                decision,
                current
            );
            return Err(InvalidTransition {
                request_id: request_id.clone(),
                from: current,
                to: target,
            }
            .into());
        }

        match self.requests.update_status(request_id, target, note.trim()).await {
            Ok(updated) => {
                self.remember_status(request_id, updated.status);
                self.invalidate([InvalidationTarget::ReturnRequest(request_id.clone())]);
                Ok(updated)
            }
            Err(e) => {
                // статус на бэкенде мог уйти вперёд, при следующем решении перечитаем
                self.forget_status(request_id);
                Err(e.into())
            }
        }
    }

    // ------------------------------------------------------------------
    // Приёмка
    // ------------------------------------------------------------------

    pub async fn begin_receive(
        &self,
        request_id: &ReturnRequestId,
    ) -> Result<WorkflowHandle, ReceiveError> {
        self.begin_receive_with(request_id, BeginReceiveOptions::default())
            .await
    }

    /// Начать приёмку по одобренной заявке.
    ///
    /// Находит возврат по заказу (или создаёт его), назначает склад, если он
    /// не задан, и передаёт позиции в том же вызове, который создаёт действия.
    pub async fn begin_receive_with(
        &self,
        request_id: &ReturnRequestId,
        options: BeginReceiveOptions,
    ) -> Result<WorkflowHandle, ReceiveError> {
        let _request_permit = self
            .acquire(request_key(request_id))
            .map_err(|key| ReceiveError::Busy { key })?;

        let request = self.requests.get(request_id).await?;
        self.remember_status(request_id, request.status);
        if request.status != ReturnRequestStatus::Approved {
            return Err(InvalidTransition {
                request_id: request_id.clone(),
                from: request.status,
                to: ReturnRequestStatus::Refunded,
            }
            .into());
        }

        let items = receive_items(&request, options.items)?;

        let existing = self
            .workflows
            .find_for_order(&request.order_id)
            .await?
            .filter(|workflow| workflow.status != ReturnWorkflowStatus::Cancelled);

        let workflow = match existing {
            Some(workflow) if workflow.status != ReturnWorkflowStatus::Requested => {
                return Err(ReceiveError::WorkflowClosed {
                    workflow_id: workflow.id,
                    status: workflow.status,
                });
            }
            Some(workflow) => workflow,
            None if !options.auto_create => {
                return Err(ReceiveError::NoWorkflow {
                    order_id: request.order_id.clone(),
                });
            }
            None => {
                let location_id = self.first_location(&request.order_id).await?;
                self.workflows
                    .create(&CreateReturnWorkflowRequest {
                        order_id: request.order_id.clone(),
                        location_id: Some(location_id),
                        items: items.clone(),
                    })
                    .await?
            }
        };

        let _workflow_permit = self
            .acquire(workflow_key(&workflow.id))
            .map_err(|key| ReceiveError::Busy { key })?;

        let workflow = match workflow.location_id {
            Some(_) => workflow,
            None => {
                let location_id = self.first_location(&request.order_id).await?;
                tracing::info!("Return {}: assigning stock location {}", workflow.id, location_id);
                self.workflows
                    .assign_location(&workflow.id, &location_id)
                    .await?
            }
        };

        let body = BeginReceiveRequest {
            items,
            internal_note: options.internal_note,
            description: options.description,
        };
        let workflow = self.workflows.begin_receive(&workflow.id, &body).await?;
        self.remember_workflow(&workflow);
        self.invalidate([
            InvalidationTarget::ReturnWorkflow(workflow.id.clone()),
            InvalidationTarget::ReturnWorkflowList(request.order_id.clone()),
        ]);

        tracing::info!(
            "Return request {}: receiving started on return {} ({} action(s))",
            request_id,
            workflow.id,
            workflow.actions.len()
        );
        Ok(WorkflowHandle::new(&workflow, request_id))
    }

    /// Начать приёмку и получить сессию, которая отменит её, если форму бросят
    pub async fn open_receive_session(
        self: &Arc<Self>,
        request_id: &ReturnRequestId,
        options: BeginReceiveOptions,
    ) -> Result<ReceiveSession, ReceiveError> {
        let handle = self.begin_receive_with(request_id, options).await?;
        Ok(ReceiveSession::new(self.clone(), handle))
    }

    async fn first_location(&self, order_id: &OrderId) -> Result<StockLocationId, ReceiveError> {
        let locations = self.locations.list().await?;
        match locations.into_iter().next() {
            Some(location) => Ok(location.id),
            None => {
                tracing::warn!("No stock location available to receive order {}", order_id);
                Err(ReceiveError::NoLocationAvailable {
                    order_id: order_id.clone(),
                })
            }
        }
    }

    /// Редактор количеств по свежему снимку возврата
    pub async fn open_editor(
        &self,
        handle: &WorkflowHandle,
        kind: ActionKind,
    ) -> Result<QuantityEditor, ReceiveError> {
        let workflow = self.workflows.get(&handle.workflow_id).await?;
        self.remember_workflow(&workflow);
        Ok(self.editor_for(&workflow, kind))
    }

    /// Отметить принятые количества. Все значения проверяются до первого вызова;
    /// 0 удаляет действие приёмки по строке.
    pub async fn mark_items_received(
        &self,
        handle: &WorkflowHandle,
        items: &[ReceiveItemInput],
    ) -> Result<ReturnWorkflow, ReceiveError> {
        let _permit = self
            .acquire(workflow_key(&handle.workflow_id))
            .map_err(|key| ReceiveError::Busy { key })?;

        let workflow = self.workflows.get(&handle.workflow_id).await?;
        self.remember_workflow(&workflow);
        if workflow.status != ReturnWorkflowStatus::Requested {
            return Err(ReceiveError::WorkflowClosed {
                workflow_id: workflow.id,
                status: workflow.status,
            });
        }
        if items.is_empty() {
            return Err(ValidationError::NoItems.into());
        }

        for item in items {
            let requested = workflow.requested_quantity(&item.id);
            if let Err(rejection) = check_quantity(requested, item.quantity) {
                let restore = items
                    .iter()
                    .map(|input| ReceiveItemInput {
                        id: input.id.clone(),
                        quantity: workflow
                            .action_for(ActionKind::Receive, &input.id)
                            .map_or(0, |action| action.quantity),
                    })
                    .collect();
                return Err(ReceiveError::Validation {
                    error: rejection_error(&item.id, item.quantity, requested, rejection),
                    restore,
                });
            }
        }

        let editor = self.editor_for(&workflow, ActionKind::Receive);
        for item in items {
            if let Err(e) = editor.set_quantity_and_wait(&item.id, Some(item.quantity)).await {
                return Err(match e {
                    QuantityError::Gateway(e) => ReceiveError::Gateway(e),
                    QuantityError::Busy { workflow_id } => ReceiveError::Busy {
                        key: workflow_key(&workflow_id),
                    },
                    QuantityError::Rejected(rejection) => rejection_error(
                        &item.id,
                        item.quantity,
                        workflow.requested_quantity(&item.id),
                        rejection,
                    )
                    .into(),
                });
            }
        }

        let workflow = self.workflows.get(&handle.workflow_id).await?;
        self.remember_workflow(&workflow);
        self.invalidate([InvalidationTarget::ReturnWorkflow(workflow.id.clone())]);
        Ok(workflow)
    }

    /// Подтвердить приёмку. Нужна хотя бы одна позиция к приёмке.
    pub async fn confirm_receive(
        &self,
        handle: &WorkflowHandle,
        notify_customer: bool,
    ) -> Result<ReturnWorkflow, ReceiveError> {
        let _permit = self
            .acquire(workflow_key(&handle.workflow_id))
            .map_err(|key| ReceiveError::Busy { key })?;
        let _exclusive = self.exclusive(&handle.workflow_id)?;

        let workflow = self.workflows.get(&handle.workflow_id).await?;
        if workflow.status != ReturnWorkflowStatus::Requested {
            return Err(ReceiveError::WorkflowClosed {
                workflow_id: workflow.id,
                status: workflow.status,
            });
        }
        if !workflow.has_receive_actions() {
            return Err(ReceiveError::NothingToConfirm {
                workflow_id: workflow.id,
            });
        }

        let workflow = self
            .workflows
            .confirm_receive(&handle.workflow_id, notify_customer)
            .await?;
        self.remember_workflow(&workflow);
        self.close_editors(&workflow.id);
        self.invalidate([
            InvalidationTarget::ReturnWorkflow(workflow.id.clone()),
            InvalidationTarget::ReturnWorkflowList(handle.order_id.clone()),
            InvalidationTarget::ReturnRequest(handle.request_id.clone()),
            InvalidationTarget::Order(handle.order_id.clone()),
        ]);
        Ok(workflow)
    }

    /// Отменить неподтверждённую приёмку. Ошибка не повторяется: возврат
    /// остаётся для ручной сверки.
    pub async fn cancel_receive(&self, handle: &WorkflowHandle) -> Result<(), ReceiveError> {
        let _permit = self
            .acquire(workflow_key(&handle.workflow_id))
            .map_err(|key| ReceiveError::Busy { key })?;
        let _exclusive = self.exclusive(&handle.workflow_id)?;

        match self.workflows.cancel_receive(&handle.workflow_id).await {
            Ok(workflow) => {
                if let Some(workflow) = workflow {
                    self.remember_workflow(&workflow);
                }
                self.close_editors(&handle.workflow_id);
                self.invalidate([
                    InvalidationTarget::ReturnWorkflow(handle.workflow_id.clone()),
                    InvalidationTarget::ReturnWorkflowList(handle.order_id.clone()),
                ]);
                tracing::info!("Return {}: receiving cancelled", handle.workflow_id);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    "Return {}: failed to cancel receiving, left for manual reconciliation: {}",
                    handle.workflow_id,
                    e
                );
                Err(e.into())
            }
        }
    }

    /// Форму приёмки бросили: дождаться отправленных правок и отменить.
    /// Если возврат всё ещё занят другой операцией, он остаётся для ручной сверки.
    pub async fn abandon_receive(&self, handle: &WorkflowHandle) -> Result<(), ReceiveError> {
        for editor in self.open_editors(&handle.workflow_id) {
            editor.flush().await;
        }
        let result = self.cancel_receive(handle).await;
        if let Err(ReceiveError::Busy { key }) = &result {
            tracing::warn!(
                "Return {}: abandoned while {} is busy, left for manual reconciliation",
                handle.workflow_id,
                key
            );
        }
        result
    }

    // ------------------------------------------------------------------
    // Возврат денег
    // ------------------------------------------------------------------

    /// Возврат денег. Ответ "уже выполнен" считается успехом, поэтому
    /// повторное нажатие безопасно.
    pub async fn refund(&self, handle: &WorkflowHandle) -> Result<RefundResult, RefundError> {
        let _permit = self
            .acquire(workflow_key(&handle.workflow_id))
            .map_err(|key| RefundError::Busy { key })?;

        let response = self.workflows.refund(&handle.workflow_id).await;
        let (outcome, message) = classify_refund_response(response)?;

        self.invalidate([
            InvalidationTarget::ReturnRequest(handle.request_id.clone()),
            InvalidationTarget::Order(handle.order_id.clone()),
            InvalidationTarget::ReturnWorkflow(handle.workflow_id.clone()),
        ]);
        tracing::info!("Return {}: refund {:?}", handle.workflow_id, outcome);

        Ok(RefundResult {
            workflow_id: handle.workflow_id.clone(),
            outcome,
            message,
        })
    }

    // ------------------------------------------------------------------
    // Продолжение
    // ------------------------------------------------------------------

    /// Следующий шаг по заявке для повторно открытого экрана
    pub async fn resume(&self, request_id: &ReturnRequestId) -> Result<Resume, GatewayError> {
        let sources = self.reconciler.load_sources(request_id).await;
        let request = match &sources.request {
            Some(request) => request.clone(),
            None => self.requests.get(request_id).await?,
        };
        self.remember_status(request_id, request.status);
        let view = self.reconciler.view_from(request_id, &sources);

        let workflow = sources
            .workflow
            .filter(|workflow| workflow.status != ReturnWorkflowStatus::Cancelled);
        if let Some(workflow) = &workflow {
            self.remember_workflow(workflow);
        }
        let handle = workflow
            .as_ref()
            .map(|workflow| WorkflowHandle::new(workflow, request_id));

        // сводная стадия считает `received` завершением, а для продолжения
        // нужен именно факт возврата денег
        let point = if view.signals.refund_observed() {
            ResumePoint::Done
        } else {
            match request.status {
                ReturnRequestStatus::Pending => ResumePoint::Decide,
                ReturnRequestStatus::Withdrawn | ReturnRequestStatus::Escalated => {
                    ResumePoint::Closed
                }
                ReturnRequestStatus::Refunded => ResumePoint::Done,
                ReturnRequestStatus::Approved => match &workflow {
                    None => ResumePoint::BeginReceive,
                    Some(workflow) if workflow.status == ReturnWorkflowStatus::Requested => {
                        if workflow.has_receive_actions() {
                            ResumePoint::Confirm(workflow.id.clone())
                        } else {
                            ResumePoint::MarkItems(workflow.id.clone())
                        }
                    }
                    Some(workflow) => ResumePoint::Refund(workflow.id.clone()),
                },
            }
        };

        tracing::info!(
            "Return request {}: resume at {:?} (stage {})",
            request_id,
            point,
            view.stage
        );
        if point == ResumePoint::Closed || request.status == ReturnRequestStatus::Refunded {
            self.forget_request(request_id);
        }
        Ok(Resume { point, handle, view })
    }
}

/// Позиции для начала приёмки: явные (с проверкой) или все строки заявки
fn receive_items(
    request: &ReturnRequest,
    explicit: Option<Vec<ReceiveItemInput>>,
) -> Result<Vec<ReceiveItemInput>, ValidationError> {
    let items = match explicit {
        Some(items) => {
            for item in &items {
                let requested = request.requested_quantity(&item.id);
                check_quantity(requested, item.quantity).map_err(|rejection| {
                    rejection_error(&item.id, item.quantity, requested, rejection)
                })?;
            }
            items
        }
        None => {
            let mut items: Vec<ReceiveItemInput> = Vec::new();
            for line in &request.line_items {
                match items.iter_mut().find(|item| item.id == line.line_item_id) {
                    Some(item) => item.quantity += line.quantity,
                    None => items.push(ReceiveItemInput {
                        id: line.line_item_id.clone(),
                        quantity: line.quantity,
                    }),
                }
            }
            items
        }
    };

    let items: Vec<ReceiveItemInput> = items.into_iter().filter(|item| item.quantity > 0).collect();
    if items.is_empty() {
        return Err(ValidationError::NoItems);
    }
    Ok(items)
}

fn rejection_error(
    item_id: &OrderLineItemId,
    quantity: i64,
    requested: Option<i64>,
    rejection: QuantityRejection,
) -> ValidationError {
    match (rejection, requested) {
        (QuantityRejection::Negative, _) => ValidationError::NegativeQuantity {
            item_id: item_id.clone(),
        },
        (QuantityRejection::AboveRequested, Some(requested)) => ValidationError::AboveRequested {
            item_id: item_id.clone(),
            quantity,
            requested,
        },
        _ => ValidationError::UnknownItem {
            item_id: item_id.clone(),
        },
    }
}

/// Фразы, которыми бэкенд сообщает о повторном возврате
const ALREADY_REFUNDED_PHRASES: [&str; 4] = [
    "already refunded",
    "already been refunded",
    "already processed",
    "already been processed",
];

/// Признак "возврат уже выполнен": сначала типизированное поле, затем текст
fn indicates_already_refunded(body: &Value, message: Option<&str>) -> bool {
    let typed = body.get("already_refunded").and_then(Value::as_bool) == Some(true)
        || body.get("code").and_then(Value::as_str) == Some("already_refunded");
    typed
        || message
            .map(|text| {
                let text = text.to_lowercase();
                ALREADY_REFUNDED_PHRASES.iter().any(|phrase| text.contains(phrase))
            })
            .unwrap_or(false)
}

/// Разобрать ответ на возврат денег.
///
/// Бэкенд сообщает о повторном возврате текстом (иногда с кодом 4xx), и такой
/// ответ считается успехом. Остальные ошибки возвращаются как есть.
pub fn classify_refund_response(
    response: Result<Value, GatewayError>,
) -> Result<(RefundOutcome, Option<String>), GatewayError> {
    match response {
        Ok(body) => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string);
            if indicates_already_refunded(&body, message.as_deref()) {
                Ok((RefundOutcome::AlreadyRefunded, message))
            } else {
                Ok((RefundOutcome::Refunded, message))
            }
        }
        Err(GatewayError::Http { status, message, body }) => {
            if indicates_already_refunded(&body, Some(&message)) {
                tracing::info!("Refund already processed (HTTP {}): {}", status, message);
                Ok((RefundOutcome::AlreadyRefunded, Some(message)))
            } else {
                Err(GatewayError::Http { status, message, body })
            }
        }
        Err(e) => Err(e),
    }
}
