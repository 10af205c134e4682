use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use tracing::Level;

use x402_observability::{emit_event, ObservabilityEvent, ProcessKind};
use x402_types::{
    ErrorEnvelope, ErrorKind, PaymentPayload, PaymentRequiredBody, PaymentRequirement,
    PaymentRequirementExtra, PricingConfig,
};

use crate::facilitator::{verify_with_retry, Facilitator};
use crate::pricing::network_name_for_chain;

const X402_VERSION: u32 = 1;

pub struct PaymentState {
    pub pricing: PricingConfig,
    pub facilitator: Arc<dyn Facilitator>,
    pub payee_wallet_address: String,
    /// When `false`, the middleware skips verification entirely — used in
    /// local/dev runs with no facilitator configured.
    pub enabled: bool,
}

impl Clone for PaymentState {
    fn clone(&self) -> Self {
        Self {
            pricing: self.pricing.clone(),
            facilitator: self.facilitator.clone(),
            payee_wallet_address: self.payee_wallet_address.clone(),
            enabled: self.enabled,
        }
    }
}

/// Per-route payment configuration. `operation_id` is set at router-build
/// time for REST routes (axum's `route_layer` runs after routing, so the
/// operation id for a route can simply be baked into its own middleware
/// instance rather than read back out of the request). Routes that carry
/// no fixed operation id (e.g. a generic MCP tool-call endpoint) leave this
/// `None` and fall back to peeking the request body.
#[derive(Clone)]
pub struct RoutePaymentState {
    pub payments: PaymentState,
    pub operation_id: Option<String>,
}

/// Resolves the operation id this request should be priced under.
///
/// - REST routes carry their operation id via `RoutePaymentState`,
///   mirroring the framework's route-level `operation_id`.
/// - MCP-shaped requests (`POST` with a JSON body of the form
///   `{"params": {"name": "..."}}`) have no fixed route-level id, so the
///   body is peeked (buffered and reconstructed so the handler can still
///   read it) and `params.name` is used instead.
/// - Otherwise the request passes through unpriced.
async fn resolve_operation_id(
    configured: Option<&str>,
    request: Request,
) -> (Request, Option<String>) {
    if let Some(id) = configured {
        return (request, Some(id.to_string()));
    }

    if request.method() != axum::http::Method::POST {
        return (request, None);
    }

    let (request, body) = peek_json_body(request).await;
    let operation_id = body
        .as_ref()
        .and_then(|v| v.get("params"))
        .and_then(|params| params.get("name"))
        .and_then(|name| name.as_str())
        .map(str::to_string);
    (request, operation_id)
}

fn build_payment_requirements(
    options: &[x402_types::PaymentOption],
    resource: &str,
    content_type: &str,
    payee_wallet_address: &str,
) -> Vec<PaymentRequirement> {
    options
        .iter()
        .filter_map(|option| {
            let Some(network) = network_name_for_chain(option.chain_id) else {
                tracing::warn!(chain_id = option.chain_id, "unknown chain_id in pricing config, skipping");
                return None;
            };
            Some(PaymentRequirement {
                scheme: "exact".to_string(),
                network: network.to_string(),
                asset: option.token_address.clone(),
                max_amount_required: option.token_amount_minor_units.to_string(),
                resource: resource.to_string(),
                description: format!("Payment for {resource}"),
                mime_type: content_type.to_string(),
                pay_to: payee_wallet_address.to_string(),
                max_timeout_seconds: 60,
                extra: PaymentRequirementExtra {
                    name: "USDC".to_string(),
                    version: "2".to_string(),
                },
            })
        })
        .collect()
}

fn payment_required_response(accepts: Vec<PaymentRequirement>, error: &str) -> Response {
    (
        StatusCode::PAYMENT_REQUIRED,
        Json(PaymentRequiredBody {
            x402_version: X402_VERSION,
            accepts,
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn extract_payment_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-PAYMENT")
        .or_else(|| headers.get("X-Payment-Proof"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn decode_payment(raw: &str) -> anyhow::Result<PaymentPayload> {
    let json_str = if raw.trim_start().starts_with('{') {
        raw.to_string()
    } else {
        let decoded = base64::engine::general_purpose::STANDARD.decode(raw.trim())?;
        String::from_utf8(decoded)?
    };
    Ok(serde_json::from_str(&json_str)?)
}

fn select_matching_requirement(
    requirements: &[PaymentRequirement],
    payment: &PaymentPayload,
) -> Option<PaymentRequirement> {
    requirements
        .iter()
        .find(|req| req.network == payment.network)
        .cloned()
}

/// Enforces x402 payment for monetized operations. Attached per-route via
/// `route_layer`, which axum runs after routing — so it always executes
/// after the rate-limit layer (a `Router::layer`, which runs before
/// routing) and before the handler, matching the request pipeline in
/// spec.md.
pub async fn payment_gate(
    State(route): State<RoutePaymentState>,
    request: Request,
    next: Next,
) -> Response {
    let state = route.payments;
    if !state.enabled {
        return next.run(request).await;
    }

    let (request, operation_id) =
        resolve_operation_id(route.operation_id.as_deref(), request).await;
    let Some(operation_id) = operation_id else {
        return next.run(request).await;
    };

    let Some(options) = state.pricing.get(&operation_id) else {
        return next.run(request).await;
    };
    if options.is_empty() {
        return next.run(request).await;
    }

    let content_type = request
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let resource = request.uri().to_string();
    let requirements =
        build_payment_requirements(options, &resource, &content_type, &state.payee_wallet_address);

    let payment_header = extract_payment_header(request.headers());
    let Some(raw) = payment_header else {
        emit_event(
            Level::WARN,
            ProcessKind::Seller,
            ObservabilityEvent {
                event: "payment_required",
                component: "payments",
                task_id: None,
                agent_id: None,
                status: Some("missing_header"),
                error_code: None,
                detail: Some(&operation_id),
            },
        );
        return payment_required_response(requirements, "No X-PAYMENT header provided");
    };

    let payment = match decode_payment(&raw) {
        Ok(payment) => payment,
        Err(err) => {
            emit_event(
                Level::WARN,
                ProcessKind::Seller,
                ObservabilityEvent {
                    event: "payment_decode_failed",
                    component: "payments",
                    task_id: None,
                    agent_id: None,
                    status: Some("invalid_header"),
                    error_code: None,
                    detail: Some(&err.to_string()),
                },
            );
            return payment_required_response(requirements, "Invalid payment header format");
        }
    };

    let Some(selected) = select_matching_requirement(&requirements, &payment) else {
        return payment_required_response(requirements, "No matching payment requirements found");
    };

    let verify_response = match verify_with_retry(state.facilitator.as_ref(), &payment, &selected).await
    {
        Ok(response) => response,
        Err(err) => {
            emit_event(
                Level::ERROR,
                ProcessKind::Seller,
                ObservabilityEvent {
                    event: "payment_verify_failed",
                    component: "payments",
                    task_id: None,
                    agent_id: None,
                    status: Some("unavailable"),
                    error_code: None,
                    detail: Some(&format!("{operation_id}: {err}")),
                },
            );
            return payment_required_response(
                requirements,
                "Payment verification failed; please try again later.",
            );
        }
    };

    if !verify_response.is_valid {
        let reason = verify_response.invalid_reason.unwrap_or_else(|| "Unknown reason".to_string());
        return payment_required_response(requirements, &format!("Invalid payment: {reason}"));
    }

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    match state.facilitator.settle(&payment, &selected).await {
        Ok(settle_response) if settle_response.success => {
            if let Ok(encoded) = serde_json::to_vec(&settle_response) {
                let header_value = base64::engine::general_purpose::STANDARD.encode(encoded);
                if let Ok(value) = axum::http::HeaderValue::from_str(&header_value) {
                    parts.headers.insert("X-PAYMENT-RESPONSE", value);
                }
            }
        }
        Ok(settle_response) => {
            let reason = settle_response.error_reason.unwrap_or_else(|| "Unknown".to_string());
            emit_event(
                Level::ERROR,
                ProcessKind::Seller,
                ObservabilityEvent {
                    event: "payment_settle_failed",
                    component: "payments",
                    task_id: None,
                    agent_id: None,
                    status: Some("failed"),
                    error_code: None,
                    detail: Some(&format!("{operation_id}: {reason}")),
                },
            );
        }
        Err(err) => {
            emit_event(
                Level::ERROR,
                ProcessKind::Seller,
                ObservabilityEvent {
                    event: "payment_settle_failed",
                    component: "payments",
                    task_id: None,
                    agent_id: None,
                    status: Some("exception"),
                    error_code: None,
                    detail: Some(&format!("{operation_id}: {err}")),
                },
            );
        }
    }
    Response::from_parts(parts, body)
}

/// Reads a bounded amount of the request body for operation-id resolution,
/// then reconstructs the request so handlers downstream can still consume
/// it — mirrors the Python's peek-then-forward `await request.json()`.
async fn peek_json_body(request: Request) -> (Request, Option<serde_json::Value>) {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, 1024 * 1024).await {
        Ok(bytes) => bytes,
        Err(_) => return (Request::from_parts(parts, Body::empty()), None),
    };
    let value = serde_json::from_slice(&bytes).ok();
    let rebuilt = Request::from_parts(parts, Body::from(bytes));
    (rebuilt, value)
}

pub fn missing_payment_envelope() -> ErrorEnvelope {
    ErrorEnvelope::new(ErrorKind::PaymentRequired, "payment required")
}
