use contracts::domain::a025_return_request::aggregate::{ReturnDecision, ReturnRequestId};
use contracts::usecases::common::UseCaseMetadata;
use contracts::usecases::u601_return_lifecycle::{ResumePoint, ReturnLifecycle};
use serde::Serialize;
use std::sync::Arc;
use vendor_panel::shared::api::{Gateway, SessionStore};
use vendor_panel::shared::config::load_config;
use vendor_panel::shared::invalidation::TracingInvalidation;
use vendor_panel::system;
use vendor_panel::usecases::u601_return_lifecycle::{BeginReceiveOptions, LifecycleOrchestrator};

const USAGE: &str = "\
Usage:
  vendor_panel status  <return-request-id>
  vendor_panel decide  <return-request-id> <approved|withdrawn|escalated> <note>
  vendor_panel receive <return-request-id> [--notify]
  vendor_panel refund  <return-request-id>

Environment:
  VENDOR_PANEL_TOKEN            access token of the signed-in vendor
  VENDOR_PANEL_PUBLISHABLE_KEY  overrides api.publishable_key
  RUST_LOG                      log filter";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    system::tracing::initialize()?;
    let config = load_config()?;

    let gateway = Arc::new(Gateway::from_config(&config, SessionStore::default()));
    if let Ok(token) = std::env::var("VENDOR_PANEL_TOKEN") {
        gateway.sign_in(token);
    }
    if !gateway.is_signed_in() {
        tracing::warn!("VENDOR_PANEL_TOKEN is not set, requests will be unauthorized");
    }

    let orchestrator = Arc::new(LifecycleOrchestrator::new(
        gateway,
        config.returns.list_limit,
        Arc::new(TracingInvalidation),
    ));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let Some(request_id) = rest.first().map(|id| ReturnRequestId::new(id.as_str())) else {
        anyhow::bail!("Missing return request id\n\n{}", USAGE);
    };

    tracing::info!(
        "{} ({}): {} {}",
        ReturnLifecycle::full_name(),
        ReturnLifecycle::display_name(),
        command,
        request_id
    );

    match command.as_str() {
        "status" => {
            let view = orchestrator.view(&request_id).await;
            print_json(&view)?;
        }
        "decide" => {
            let decision = rest
                .get(1)
                .and_then(|code| ReturnDecision::from_code(code))
                .ok_or_else(|| {
                    anyhow::anyhow!("Decision must be approved, withdrawn or escalated")
                })?;
            let note = rest.get(2..).map(|words| words.join(" ")).unwrap_or_default();
            let request = orchestrator.decide(&request_id, decision, &note).await?;
            print_json(&request)?;
        }
        "receive" => {
            let notify_customer = rest.iter().any(|arg| arg == "--notify");
            let mut session = orchestrator
                .open_receive_session(&request_id, BeginReceiveOptions::default())
                .await?;
            match session.confirm(notify_customer).await {
                Ok(workflow) => print_json(&workflow)?,
                Err(e) => {
                    // рантайм завершится раньше фоновой отмены из Drop
                    if let Err(cancel_error) = session.abandon().await {
                        tracing::error!("Failed to cancel receive: {}", cancel_error);
                    }
                    return Err(e.into());
                }
            }
        }
        "refund" => {
            let resume = orchestrator.resume(&request_id).await?;
            let handle = match (&resume.point, resume.handle) {
                (ResumePoint::Done, _) => {
                    println!("Refund is already completed");
                    return Ok(());
                }
                (ResumePoint::Refund(_), Some(handle)) => handle,
                (point, _) => anyhow::bail!(
                    "Return request {} is not ready for refund, next step: {:?}",
                    request_id,
                    point
                ),
            };
            let result = orchestrator.refund(&handle).await?;
            print_json(&result)?;
        }
        other => anyhow::bail!("Unknown command: {}\n\n{}", other, USAGE),
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
