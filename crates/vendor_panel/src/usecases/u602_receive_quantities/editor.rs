use crate::domain::a026_return_workflow::ReturnWorkflowRepository;
use crate::shared::api::GatewayError;
use contracts::domain::a026_return_workflow::aggregate::{
    ActionId, ActionKind, ReceiveItemInput, ReturnWorkflow, ReturnWorkflowId,
};
use contracts::domain::a027_order::aggregate::OrderLineItemId;
use contracts::usecases::common::UseCaseMetadata;
use contracts::usecases::u602_receive_quantities::events::{EditOutcome, QuantityRejection};
use contracts::usecases::u602_receive_quantities::ReceiveQuantities;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{broadcast, Notify, RwLock};

const EVENT_CAPACITY: usize = 64;

/// Общий замок возврата: правки строк берут его на чтение,
/// подтверждение и отмена приёмки на запись.
pub type WorkflowGate = Arc<RwLock<()>>;

#[derive(Debug, Error)]
pub enum QuantityError {
    #[error("Quantity rejected: {0:?}")]
    Rejected(QuantityRejection),

    /// Возврат сейчас подтверждают или отменяют
    #[error("Return {workflow_id} is being confirmed or cancelled")]
    Busy { workflow_id: ReturnWorkflowId },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Проверка количества до обращения к бэкенду: `0..=requested`
pub fn check_quantity(requested: Option<i64>, value: i64) -> Result<i64, QuantityRejection> {
    let requested = requested.ok_or(QuantityRejection::UnknownItem)?;
    if value < 0 {
        return Err(QuantityRejection::Negative);
    }
    if value > requested {
        return Err(QuantityRejection::AboveRequested);
    }
    Ok(value)
}

#[derive(Debug, Default)]
struct ItemState {
    requested: i64,
    /// Последнее подтверждённое бэкендом значение
    confirmed: i64,
    action_id: Option<ActionId>,
    displayed: i64,
    /// Номер последней принятой правки
    generation: u64,
    in_flight: usize,
    /// Правки одной строки уходят на бэкенд строго по очереди
    lock: Arc<tokio::sync::Mutex<()>>,
}

struct PendingEdit {
    item_id: OrderLineItemId,
    quantity: i64,
    generation: u64,
    lock: Arc<tokio::sync::Mutex<()>>,
}

enum RemoteStep {
    Add,
    Update(ActionId),
    Remove(ActionId),
    Nothing,
}

struct EditorInner {
    workflows: Arc<ReturnWorkflowRepository>,
    workflow_id: ReturnWorkflowId,
    kind: ActionKind,
    gate: WorkflowGate,
    items: Mutex<HashMap<OrderLineItemId, ItemState>>,
    events: broadcast::Sender<EditOutcome>,
    idle: Notify,
}

/// Оптимистичный ввод принятых (или списанных) количеств по строкам возврата.
///
/// Значение показывается сразу, а вызов на бэкенд идёт в фоне. Ответ
/// применяется к отображению, только если после него не было более новой правки.
#[derive(Clone)]
pub struct QuantityEditor {
    inner: Arc<EditorInner>,
}

impl QuantityEditor {
    pub fn new(
        workflows: Arc<ReturnWorkflowRepository>,
        workflow: &ReturnWorkflow,
        kind: ActionKind,
    ) -> Self {
        Self::with_gate(workflows, workflow, kind, WorkflowGate::default())
    }

    /// Редактор, который делит замок возврата с другими операциями над ним
    pub fn with_gate(
        workflows: Arc<ReturnWorkflowRepository>,
        workflow: &ReturnWorkflow,
        kind: ActionKind,
        gate: WorkflowGate,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let editor = Self {
            inner: Arc::new(EditorInner {
                workflows,
                workflow_id: workflow.id.clone(),
                kind,
                gate,
                items: Mutex::new(HashMap::new()),
                events,
                idle: Notify::new(),
            }),
        };
        editor.reconcile(workflow);
        tracing::debug!(
            "{}: editing {:?} quantities of return {}",
            ReceiveQuantities::full_name(),
            kind,
            workflow.id
        );
        editor
    }

    pub fn workflow_id(&self) -> &ReturnWorkflowId {
        &self.inner.workflow_id
    }

    pub fn kind(&self) -> ActionKind {
        self.inner.kind
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EditOutcome> {
        self.inner.events.subscribe()
    }

    pub fn displayed(&self, item_id: &OrderLineItemId) -> Option<i64> {
        self.items().get(item_id).map(|item| item.displayed)
    }

    pub fn confirmed(&self, item_id: &OrderLineItemId) -> Option<i64> {
        self.items().get(item_id).map(|item| item.confirmed)
    }

    pub fn in_flight(&self) -> usize {
        self.items().values().map(|item| item.in_flight).sum()
    }

    /// Показать значение и отправить его на бэкенд в фоне
    pub fn set_quantity(&self, item_id: &OrderLineItemId, value: Option<i64>) {
        if let Ok(edit) = self.begin_edit(item_id, value) {
            let editor = self.clone();
            tokio::spawn(async move {
                if let Err(e) = editor.commit(edit).await {
                    tracing::debug!("Background quantity edit failed: {}", e);
                }
            });
        }
    }

    pub async fn set_quantity_and_wait(
        &self,
        item_id: &OrderLineItemId,
        value: Option<i64>,
    ) -> Result<EditOutcome, QuantityError> {
        let edit = self.begin_edit(item_id, value)?;
        self.commit(edit).await
    }

    /// Дождаться завершения всех отправленных правок
    pub async fn flush(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Обновить подтверждённые значения из свежего чтения возврата.
    /// Отображение меняется только у строк без незавершённых правок.
    pub fn reconcile(&self, workflow: &ReturnWorkflow) {
        let kind = self.inner.kind;
        let mut items = self.items();
        for line in &workflow.items {
            let item = items.entry(line.item_id.clone()).or_default();
            let action = workflow.action_for(kind, &line.item_id);
            item.requested = line.quantity;
            item.confirmed = action.map_or(0, |action| action.quantity);
            item.action_id = action.map(|action| action.id.clone());
            if item.in_flight == 0 {
                item.displayed = item.confirmed;
            }
        }
    }

    fn items(&self) -> MutexGuard<'_, HashMap<OrderLineItemId, ItemState>> {
        self.inner.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, outcome: EditOutcome) {
        // нет подписчиков: событие никому не нужно
        let _ = self.inner.events.send(outcome);
    }

    fn begin_edit(
        &self,
        item_id: &OrderLineItemId,
        value: Option<i64>,
    ) -> Result<PendingEdit, QuantityError> {
        let kind = self.inner.kind;
        let value = value.unwrap_or(0);
        let mut items = self.items();

        let (requested, displayed) = match items.get(item_id) {
            Some(item) => (Some(item.requested), Some(item.displayed)),
            None => (None, None),
        };
        if let Err(reason) = check_quantity(requested, value) {
            drop(items);
            tracing::warn!(
                "Return {}: quantity {} for {} rejected ({:?})",
                self.inner.workflow_id,
                value,
                item_id,
                reason
            );
            self.publish(EditOutcome::Rejected {
                item_id: item_id.clone(),
                kind,
                reason,
                restored: displayed,
            });
            return Err(QuantityError::Rejected(reason));
        }

        let item = items.entry(item_id.clone()).or_default();
        item.generation += 1;
        item.in_flight += 1;
        item.displayed = value;
        Ok(PendingEdit {
            item_id: item_id.clone(),
            quantity: value,
            generation: item.generation,
            lock: item.lock.clone(),
        })
    }

    async fn commit(&self, edit: PendingEdit) -> Result<EditOutcome, QuantityError> {
        let _turn = edit.lock.lock().await;
        let kind = self.inner.kind;

        let step = {
            let items = self.items();
            let item = items.get(&edit.item_id);
            match item {
                Some(item) if item.generation == edit.generation => {
                    Some(match (&item.action_id, edit.quantity) {
                        (Some(action_id), 0) => RemoteStep::Remove(action_id.clone()),
                        (None, 0) => RemoteStep::Nothing,
                        (Some(action_id), _) => RemoteStep::Update(action_id.clone()),
                        (None, _) => RemoteStep::Add,
                    })
                }
                _ => None,
            }
        };

        let Some(step) = step else {
            // за этой правкой в очереди уже стоит более новая
            return Ok(self.finish(&edit, None));
        };

        let Ok(_shared) = self.inner.gate.try_read() else {
            let error = QuantityError::Busy {
                workflow_id: self.inner.workflow_id.clone(),
            };
            self.roll_back(&edit, &error);
            return Err(error);
        };

        let workflows = &self.inner.workflows;
        let workflow_id = &self.inner.workflow_id;
        let result = match step {
            RemoteStep::Add => workflows
                .add_actions(
                    workflow_id,
                    kind,
                    vec![ReceiveItemInput {
                        id: edit.item_id.clone(),
                        quantity: edit.quantity,
                    }],
                )
                .await
                .map(Some),
            RemoteStep::Update(action_id) => workflows
                .update_action(workflow_id, kind, &action_id, edit.quantity)
                .await
                .map(Some),
            RemoteStep::Remove(action_id) => {
                workflows.remove_action(workflow_id, kind, &action_id).await
            }
            RemoteStep::Nothing => Ok(None),
        };

        match result {
            Ok(workflow) => Ok(self.finish(&edit, Some(workflow))),
            Err(e) => {
                let error = QuantityError::Gateway(e);
                self.roll_back(&edit, &error);
                Err(error)
            }
        }
    }

    /// Вернуть отображение к подтверждённому значению, если правка последняя
    fn roll_back(&self, edit: &PendingEdit, error: &QuantityError) {
        let restored = {
            let mut items = self.items();
            let item = items.entry(edit.item_id.clone()).or_default();
            item.in_flight = item.in_flight.saturating_sub(1);
            if item.generation == edit.generation {
                item.displayed = item.confirmed;
            }
            item.displayed
        };
        tracing::error!(
            "Return {}: failed to save quantity {} for {}: {}",
            self.inner.workflow_id,
            edit.quantity,
            edit.item_id,
            error
        );
        self.publish(EditOutcome::RolledBack {
            item_id: edit.item_id.clone(),
            kind: self.inner.kind,
            restored: Some(restored),
            error: error.to_string(),
        });
        self.inner.idle.notify_waiters();
    }

    /// Завершить правку: `applied` есть, если вызов на бэкенд был выполнен
    fn finish(&self, edit: &PendingEdit, applied: Option<Option<ReturnWorkflow>>) -> EditOutcome {
        let kind = self.inner.kind;
        let outcome = {
            let mut items = self.items();
            let item = items.entry(edit.item_id.clone()).or_default();
            item.in_flight = item.in_flight.saturating_sub(1);

            if let Some(workflow) = applied {
                let action = workflow
                    .as_ref()
                    .and_then(|workflow| workflow.action_for(kind, &edit.item_id));
                item.confirmed = action.map_or(0, |action| action.quantity);
                item.action_id = action.map(|action| action.id.clone());
            }

            if item.generation == edit.generation {
                item.displayed = item.confirmed;
                EditOutcome::Committed {
                    item_id: edit.item_id.clone(),
                    kind,
                    quantity: item.confirmed,
                    generation: edit.generation,
                }
            } else {
                EditOutcome::Superseded {
                    item_id: edit.item_id.clone(),
                    kind,
                    generation: edit.generation,
                }
            }
        };

        self.publish(outcome.clone());
        self.inner.idle.notify_waiters();
        outcome
    }
}
