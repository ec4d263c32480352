//! Test doubles for the transport seam: a scripted queue of responses and an
//! in-memory commerce backend that routes requests like the real one.

use super::gateway::{Gateway, GatewayConfig};
use super::session::SessionStore;
use super::transport::{
    HttpMethod, Transport, TransportFailure, TransportFailureKind, TransportRequest,
    TransportResponse,
};
use async_trait::async_trait;
use chrono::Utc;
use contracts::domain::a025_return_request::aggregate::{
    ReturnRequest, ReturnRequestId, ReturnRequestLine, ReturnRequestStatus, UpdateReturnRequest,
};
use contracts::domain::a026_return_workflow::aggregate::{
    ActionId, ActionKind, AddActionItemsRequest, AssignLocationRequest, BeginReceiveRequest,
    ConfirmReceiveRequest, CreateReturnWorkflowRequest, ReceiveAction, ReceiveItemInput,
    ReturnWorkflow, ReturnWorkflowId, ReturnWorkflowItem, ReturnWorkflowStatus,
    UpdateActionRequest,
};
use contracts::domain::a027_order::aggregate::{
    OrderId, OrderLineItemId, OrderSummary, Payment, PaymentCollection, PaymentRefund,
    PaymentStatus,
};
use contracts::domain::a028_stock_location::aggregate::{StockLocation, StockLocationId};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

const BASE_URL: &str = "http://fake.test";

pub fn test_gateway_config() -> GatewayConfig {
    GatewayConfig {
        base_url: BASE_URL.to_string(),
        resource: "vendor".to_string(),
        publishable_key: "pk_test".to_string(),
        max_retries: 2,
        base_delay: Duration::from_millis(100),
    }
}

pub fn test_gateway(transport: Arc<dyn Transport>) -> Arc<Gateway> {
    Arc::new(Gateway::new(
        transport,
        SessionStore::default().with_token("tok_test"),
        test_gateway_config(),
    ))
}

// ============================================================================
// ScriptedTransport
// ============================================================================

#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportFailure>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: TransportResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_failure(&self, failure: TransportFailure) {
        self.script.lock().unwrap().push_back(Err(failure));
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportFailure::new(
                    TransportFailureKind::Other,
                    "script exhausted",
                ))
            })
    }
}

// ============================================================================
// FakeBackend
// ============================================================================

#[derive(Default)]
pub struct FakeState {
    pub requests: HashMap<String, ReturnRequest>,
    pub workflows: HashMap<String, ReturnWorkflow>,
    pub orders: HashMap<String, OrderSummary>,
    pub locations: Vec<StockLocation>,
    /// Выполненные возвраты денег (ID возвратов)
    pub refunds: Vec<String>,
    /// (workflow_id, no_notification) для каждого подтверждения приёмки
    pub confirmations: Vec<(String, bool)>,
    workflow_seq: u64,
    action_seq: u64,
}

type Reply = Result<Value, (u16, String)>;

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<&'static str>>,
    holds: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
    failures: Mutex<HashMap<&'static str, VecDeque<TransportResponse>>>,
}

impl FakeBackend {
    /// Бэкенд с одним складом
    pub fn new() -> Arc<Self> {
        let backend = Self::default();
        backend.state.lock().unwrap().locations.push(StockLocation {
            id: StockLocationId::new("sloc_1"),
            name: "Main warehouse".to_string(),
        });
        Arc::new(backend)
    }

    pub fn without_locations(self: &Arc<Self>) -> Arc<Self> {
        self.state.lock().unwrap().locations.clear();
        self.clone()
    }

    pub fn with_request(
        self: &Arc<Self>,
        id: &str,
        order_id: &str,
        status: ReturnRequestStatus,
        lines: &[(&str, i64)],
    ) -> Arc<Self> {
        let request = ReturnRequest {
            id: ReturnRequestId::new(id),
            order_id: OrderId::new(order_id),
            customer_id: None,
            status,
            vendor_reviewer_id: None,
            vendor_reviewer_note: None,
            vendor_review_date: None,
            admin_reviewer_id: None,
            admin_reviewer_note: None,
            admin_review_date: None,
            line_items: lines
                .iter()
                .enumerate()
                .map(|(index, (item, quantity))| ReturnRequestLine {
                    id: format!("rrl_{}", index + 1),
                    line_item_id: OrderLineItemId::new(*item),
                    quantity: *quantity,
                    reason_id: None,
                })
                .collect(),
            created_at: Some(Utc::now()),
        };
        let mut state = self.state.lock().unwrap();
        state.requests.insert(id.to_string(), request);
        state.orders.entry(order_id.to_string()).or_insert_with(|| OrderSummary {
            id: OrderId::new(order_id),
            payment_status: PaymentStatus::Captured,
            payment_collections: vec![PaymentCollection {
                id: "pc_1".to_string(),
                payments: vec![Payment {
                    id: "pay_1".to_string(),
                    refunds: vec![],
                }],
            }],
        });
        drop(state);
        self.clone()
    }

    pub fn with_workflow(self: &Arc<Self>, workflow: ReturnWorkflow) -> Arc<Self> {
        let mut state = self.state.lock().unwrap();
        state.workflow_seq += 1;
        state.workflows.insert(workflow.id.0.clone(), workflow);
        drop(state);
        self.clone()
    }

    pub fn set_request_status(&self, id: &str, status: ReturnRequestStatus) {
        if let Some(request) = self.state.lock().unwrap().requests.get_mut(id) {
            request.status = status;
        }
    }

    pub fn set_workflow_status(&self, id: &str, status: ReturnWorkflowStatus) {
        if let Some(workflow) = self.state.lock().unwrap().workflows.get_mut(id) {
            workflow.status = status;
        }
    }

    pub fn set_payment_status(&self, order_id: &str, status: PaymentStatus) {
        if let Some(order) = self.state.lock().unwrap().orders.get_mut(order_id) {
            order.payment_status = status;
        }
    }

    pub fn request(&self, id: &str) -> Option<ReturnRequest> {
        self.state.lock().unwrap().requests.get(id).cloned()
    }

    pub fn workflow(&self, id: &str) -> Option<ReturnWorkflow> {
        self.state.lock().unwrap().workflows.get(id).cloned()
    }

    pub fn refund_count(&self) -> usize {
        self.state.lock().unwrap().refunds.len()
    }

    pub fn confirmations(&self) -> Vec<(String, bool)> {
        self.state.lock().unwrap().confirmations.clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, route: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| **call == route).count()
    }

    /// Придержать запросы маршрута до `release`
    pub fn hold(&self, route: &'static str) {
        self.holds
            .lock()
            .unwrap()
            .insert(route, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, route: &'static str, permits: usize) {
        if let Some(semaphore) = self.holds.lock().unwrap().get(route) {
            semaphore.add_permits(permits);
        }
    }

    /// Следующий запрос маршрута получит этот ответ вместо обработки
    pub fn fail_next(&self, route: &'static str, status: u16, body: Value) {
        self.failures
            .lock()
            .unwrap()
            .entry(route)
            .or_default()
            .push_back(TransportResponse::json(status, body));
    }

    fn route(method: HttpMethod, segments: &[String]) -> Option<&'static str> {
        let segs: Vec<&str> = segments.iter().map(String::as_str).collect();
        let route = match (method, segs.as_slice()) {
            (HttpMethod::Get, ["return-request", _]) => "return_request.get",
            (HttpMethod::Post, ["return-request", _]) => "return_request.update",
            (HttpMethod::Get, ["returns"]) => "returns.list",
            (HttpMethod::Post, ["returns"]) => "returns.create",
            (HttpMethod::Get, ["returns", _]) => "returns.get",
            (HttpMethod::Post, ["returns", _]) => "returns.assign_location",
            (HttpMethod::Post, ["returns", _, "receive"]) => "receive.begin",
            (HttpMethod::Post, ["returns", _, "receive", "items"]) => "receive.items.add",
            (HttpMethod::Post, ["returns", _, "receive", "items", _]) => "receive.items.update",
            (HttpMethod::Delete, ["returns", _, "receive", "items", _]) => "receive.items.remove",
            (HttpMethod::Post, ["returns", _, "receive", "confirm"]) => "receive.confirm",
            (HttpMethod::Post, ["returns", _, "dismiss-items"]) => "dismiss.add",
            (HttpMethod::Post, ["returns", _, "dismiss-items", _]) => "dismiss.update",
            (HttpMethod::Delete, ["returns", _, "dismiss-items", _]) => "dismiss.remove",
            (HttpMethod::Post, ["returns", _, "cancel-receive"]) => "receive.cancel",
            (HttpMethod::Post, ["returns", _, "refund"]) => "refund",
            (HttpMethod::Get, ["orders", _]) => "orders.get",
            (HttpMethod::Get, ["stock-locations"]) => "stock_locations.list",
            _ => return None,
        };
        Some(route)
    }

    fn dispatch(&self, route: &str, segments: &[String], body: Option<&str>) -> Reply {
        let mut state = self.state.lock().unwrap();
        let id = segments.get(1).cloned().unwrap_or_default();
        let action_id = segments.get(4).or_else(|| segments.get(3)).cloned().unwrap_or_default();

        match route {
            "return_request.get" => state
                .requests
                .get(&id)
                .map(|request| json!({ "return_request": request }))
                .ok_or((404, format!("Return request {} not found", id))),
            "return_request.update" => {
                let input: UpdateReturnRequest = parse(body)?;
                let request = state
                    .requests
                    .get_mut(&id)
                    .ok_or((404, format!("Return request {} not found", id)))?;
                if !request.status.can_transition_to(input.status) {
                    return Err((
                        400,
                        format!(
                            "Cannot move return request from {} to {}",
                            request.status, input.status
                        ),
                    ));
                }
                request.status = input.status;
                request.vendor_reviewer_note = Some(input.vendor_reviewer_note);
                request.vendor_reviewer_id = Some("vendor_user_1".to_string());
                request.vendor_review_date = Some(Utc::now());
                Ok(json!({ "return_request": request }))
            }
            "returns.list" => {
                let mut returns: Vec<&ReturnWorkflow> = state.workflows.values().collect();
                returns.sort_by(|a, b| a.id.cmp(&b.id));
                Ok(json!({ "returns": returns, "count": returns.len() }))
            }
            "returns.create" => {
                let input: CreateReturnWorkflowRequest = parse(body)?;
                state.workflow_seq += 1;
                let workflow = ReturnWorkflow {
                    id: ReturnWorkflowId::new(format!("rw_{}", state.workflow_seq)),
                    order_id: input.order_id,
                    status: ReturnWorkflowStatus::Requested,
                    location_id: input.location_id,
                    items: input
                        .items
                        .into_iter()
                        .map(|item| ReturnWorkflowItem {
                            item_id: item.id,
                            quantity: item.quantity,
                            received_quantity: 0,
                            damaged_quantity: 0,
                        })
                        .collect(),
                    actions: vec![],
                    created_at: Some(Utc::now()),
                };
                state.workflows.insert(workflow.id.0.clone(), workflow.clone());
                Ok(json!({ "return": workflow }))
            }
            "returns.get" => state
                .workflows
                .get(&id)
                .map(|workflow| json!({ "return": workflow }))
                .ok_or((404, format!("Return {} not found", id))),
            "returns.assign_location" => {
                let input: AssignLocationRequest = parse(body)?;
                let workflow = workflow_mut(&mut state, &id)?;
                workflow.location_id = Some(input.location_id);
                Ok(json!({ "return": workflow }))
            }
            "receive.begin" => {
                let input: BeginReceiveRequest = parse(body)?;
                let FakeState { workflows, action_seq, .. } = &mut *state;
                let workflow = workflows
                    .get_mut(&id)
                    .ok_or((404, format!("Return {} not found", id)))?;
                if workflow.status != ReturnWorkflowStatus::Requested {
                    return Err((400, format!("Return {} is not in a receivable state", id)));
                }
                if workflow.location_id.is_none() {
                    return Err((400, format!("Return {} has no location", id)));
                }
                upsert_actions(workflow, ActionKind::Receive, &input.items, action_seq)?;
                Ok(json!({ "return": workflow }))
            }
            "receive.items.add" | "dismiss.add" => {
                let input: AddActionItemsRequest = parse(body)?;
                let kind = kind_of(route);
                let FakeState { workflows, action_seq, .. } = &mut *state;
                let workflow = workflows
                    .get_mut(&id)
                    .ok_or((404, format!("Return {} not found", id)))?;
                upsert_actions(workflow, kind, &input.items, action_seq)?;
                Ok(json!({ "return": workflow }))
            }
            "receive.items.update" | "dismiss.update" => {
                let input: UpdateActionRequest = parse(body)?;
                let kind = kind_of(route);
                let workflow = workflow_mut(&mut state, &id)?;
                let requested = {
                    let action = workflow
                        .actions
                        .iter()
                        .find(|action| action.id.0 == action_id && action.kind == kind)
                        .ok_or((404, format!("Action {} not found", action_id)))?;
                    workflow.requested_quantity(&action.item_id).unwrap_or(0)
                };
                if input.quantity > requested {
                    return Err((400, "Quantity exceeds the returned quantity".to_string()));
                }
                if let Some(action) = workflow
                    .actions
                    .iter_mut()
                    .find(|action| action.id.0 == action_id)
                {
                    action.quantity = input.quantity;
                }
                Ok(json!({ "return": workflow }))
            }
            "receive.items.remove" | "dismiss.remove" => {
                let kind = kind_of(route);
                let workflow = workflow_mut(&mut state, &id)?;
                let before = workflow.actions.len();
                workflow
                    .actions
                    .retain(|action| !(action.id.0 == action_id && action.kind == kind));
                if workflow.actions.len() == before {
                    return Err((404, format!("Action {} not found", action_id)));
                }
                // Настоящий бэкенд отвечает пустым телом
                Ok(Value::Null)
            }
            "receive.confirm" => {
                let input: ConfirmReceiveRequest = parse(body)?;
                let workflow = workflow_mut(&mut state, &id)?;
                if workflow.status != ReturnWorkflowStatus::Requested {
                    return Err((400, format!("Return {} is not in a receivable state", id)));
                }
                if !workflow.has_receive_actions() {
                    return Err((400, "No items to receive".to_string()));
                }
                let actions = std::mem::take(&mut workflow.actions);
                for item in workflow.items.iter_mut() {
                    for action in actions.iter().filter(|action| action.item_id == item.item_id) {
                        match action.kind {
                            ActionKind::Receive => item.received_quantity += action.quantity,
                            ActionKind::Dismiss => item.damaged_quantity += action.quantity,
                        }
                    }
                }
                let complete = workflow
                    .items
                    .iter()
                    .all(|item| item.received_quantity + item.damaged_quantity >= item.quantity);
                workflow.status = if complete {
                    ReturnWorkflowStatus::Received
                } else {
                    ReturnWorkflowStatus::PartiallyReceived
                };
                let reply = json!({ "return": workflow });
                state.confirmations.push((id.clone(), input.no_notification));
                Ok(reply)
            }
            "receive.cancel" => {
                let workflow = workflow_mut(&mut state, &id)?;
                if workflow.status != ReturnWorkflowStatus::Requested {
                    return Err((400, format!("Return {} can no longer be cancelled", id)));
                }
                workflow.status = ReturnWorkflowStatus::Cancelled;
                workflow.actions.clear();
                Ok(json!({ "return": workflow }))
            }
            "refund" => {
                let workflow = workflow_mut(&mut state, &id)?.clone();
                if !workflow.status.is_receipt_confirmed() {
                    return Err((400, format!("Return {} has not been received", id)));
                }
                if state.refunds.contains(&id) {
                    return Err((400, format!("Return {} has already been refunded", id)));
                }
                state.refunds.push(id.clone());
                let refund_id = format!("ref_{}", state.refunds.len());
                if let Some(order) = state.orders.get_mut(&workflow.order_id.0) {
                    order.payment_status = PaymentStatus::Refunded;
                    if let Some(payment) = order
                        .payment_collections
                        .iter_mut()
                        .flat_map(|collection| collection.payments.iter_mut())
                        .next()
                    {
                        payment.refunds.push(PaymentRefund {
                            id: refund_id.clone(),
                            amount: None,
                            created_at: Some(Utc::now()),
                        });
                    }
                }
                Ok(json!({ "return": workflow, "refund": { "id": refund_id } }))
            }
            "orders.get" => state
                .orders
                .get(&id)
                .map(|order| json!({ "order": order }))
                .ok_or((404, format!("Order {} not found", id))),
            "stock_locations.list" => Ok(json!({ "stock_locations": state.locations })),
            _ => Err((404, "Not found".to_string())),
        }
    }
}

fn parse<T: DeserializeOwned>(body: Option<&str>) -> Result<T, (u16, String)> {
    serde_json::from_str(body.unwrap_or("{}")).map_err(|e| (400, format!("Invalid body: {}", e)))
}

fn kind_of(route: &str) -> ActionKind {
    if route.starts_with("dismiss") {
        ActionKind::Dismiss
    } else {
        ActionKind::Receive
    }
}

fn workflow_mut<'a>(
    state: &'a mut FakeState,
    id: &str,
) -> Result<&'a mut ReturnWorkflow, (u16, String)> {
    state
        .workflows
        .get_mut(id)
        .ok_or((404, format!("Return {} not found", id)))
}

fn upsert_actions(
    workflow: &mut ReturnWorkflow,
    kind: ActionKind,
    items: &[ReceiveItemInput],
    action_seq: &mut u64,
) -> Result<(), (u16, String)> {
    for item in items {
        let requested = workflow
            .requested_quantity(&item.id)
            .ok_or((400, format!("Item {} is not part of the return", item.id)))?;
        if item.quantity > requested {
            return Err((400, format!("Quantity for {} exceeds the returned quantity", item.id)));
        }
    }
    for item in items {
        if let Some(action) = workflow
            .actions
            .iter_mut()
            .find(|action| action.kind == kind && action.item_id == item.id)
        {
            action.quantity = item.quantity;
        } else {
            *action_seq += 1;
            workflow.actions.push(ReceiveAction {
                id: ActionId::new(format!("act_{}", action_seq)),
                kind,
                item_id: item.id.clone(),
                quantity: item.quantity,
            });
        }
    }
    Ok(())
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(request.url.as_str())
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();
        let segments: Vec<String> = path
            .trim_matches('/')
            .split('/')
            .skip(1) // resource prefix
            .map(|segment| urlencoding::decode(segment).unwrap().into_owned())
            .collect();

        let Some(route) = Self::route(request.method, &segments) else {
            return Ok(TransportResponse::json(
                404,
                json!({ "message": format!("No route for {}", path) }),
            ));
        };
        self.calls.lock().unwrap().push(route);

        let hold = self.holds.lock().unwrap().get(route).cloned();
        if let Some(semaphore) = hold {
            semaphore.acquire().await.unwrap().forget();
        }

        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(route)
            .and_then(|queue| queue.pop_front());
        if let Some(response) = failure {
            return Ok(response);
        }

        match self.dispatch(route, &segments, request.body.as_deref()) {
            Ok(Value::Null) => Ok(TransportResponse::new(200, "")),
            Ok(value) => Ok(TransportResponse::json(200, value)),
            Err((status, message)) => {
                Ok(TransportResponse::json(status, json!({ "message": message })))
            }
        }
    }
}
