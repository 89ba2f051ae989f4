//! Admission webhook endpoints for Agent resources
//!
//! The mutating endpoint answers with a JSON patch from the submitted
//! object to its defaulted form. The validating endpoint rejects with every
//! violation joined into one message. Deletes are always allowed.

use crate::crd::Agent;
use crate::defaults::Defaulter;
use crate::health::{components, HealthRegistry};
use crate::observability::{StructuredLogger, WebhookMetrics};
use crate::validation::validate;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use kube::core::admission::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, ConvertAdmissionReviewError, Operation,
    SerializePatchError,
};
use kube::core::DynamicObject;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const MUTATE_PATH: &str = "/mutate-otel-splunk-com-v1alpha1-agent";
pub const VALIDATE_PATH: &str = "/validate-otel-splunk-com-v1alpha1-agent";

/// HTTP-level failures; admission decisions are always a 200 review
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("malformed admission review: {0}")]
    MalformedReview(#[from] ConvertAdmissionReviewError),

    #[error("failed to encode object: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to encode patch: {0}")]
    Patch(#[from] SerializePatchError),

    #[error("submitted object is not a JSON object")]
    NotAnObject,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match self {
            WebhookError::MalformedReview(_) | WebhookError::NotAnObject => StatusCode::BAD_REQUEST,
            WebhookError::Encode(_) | WebhookError::Patch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(error = %self, status = status.as_u16(), "Admission review failed");
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Allowed,
    Denied,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Denied => "denied",
        }
    }
}

/// Shared webhook state
#[derive(Clone)]
pub struct WebhookState {
    pub defaulter: Defaulter,
    pub health: HealthRegistry,
    pub metrics: WebhookMetrics,
    pub logger: StructuredLogger,
}

impl WebhookState {
    pub fn new(defaulter: Defaulter, health: HealthRegistry) -> Self {
        let logger = StructuredLogger::new(defaulter.distro().as_str());
        Self {
            defaulter,
            health,
            metrics: WebhookMetrics::new(),
            logger,
        }
    }

    async fn mutate(
        &self,
        req: &AdmissionRequest<DynamicObject>,
    ) -> Result<(AdmissionResponse, Outcome), WebhookError> {
        let response = AdmissionResponse::from(req);
        let object = match (&req.operation, &req.object) {
            (Operation::Delete, _) | (_, None) => return Ok((response, Outcome::Allowed)),
            (_, Some(object)) => object,
        };
        let namespace = req.namespace.as_deref().unwrap_or_default();

        let submitted = serde_json::to_value(object)?;
        let mut agent = match decode_agent(&submitted) {
            Ok(agent) => agent,
            Err(e) => {
                warn!(uid = %req.uid, name = %req.name, error = %e, "Submitted object is not a valid Agent");
                return Ok((response.deny(format!("invalid Agent: {e}")), Outcome::Denied));
            }
        };

        match self.defaulter.apply(&mut agent).await {
            Ok(_) => self.health.set_healthy(components::TEMPLATE_SOURCE).await,
            Err(err) => {
                if err.is_template_failure() {
                    self.health
                        .set_degraded(components::TEMPLATE_SOURCE, err.to_string())
                        .await;
                }
                self.logger
                    .log_defaulting_unavailable(&req.uid, &req.name, namespace, &err.to_string());
                return Ok((
                    response.deny(format!("defaulting unavailable: {err}")),
                    Outcome::Denied,
                ));
            }
        }

        let defaulted = with_defaults(&submitted, &agent)?;
        let patch = json_patch::diff(&submitted, &defaulted);
        self.logger
            .log_defaulted(&req.uid, &req.name, namespace, patch.0.len());

        Ok((response.with_patch(patch)?, Outcome::Allowed))
    }

    fn validate(
        &self,
        req: &AdmissionRequest<DynamicObject>,
    ) -> Result<(AdmissionResponse, Outcome), WebhookError> {
        let response = AdmissionResponse::from(req);
        let object = match (&req.operation, &req.object) {
            (Operation::Delete, _) | (_, None) => {
                debug!(uid = %req.uid, name = %req.name, "Allowing delete");
                return Ok((response, Outcome::Allowed));
            }
            (_, Some(object)) => object,
        };
        let namespace = req.namespace.as_deref().unwrap_or_default();

        let agent = match decode_agent(&serde_json::to_value(object)?) {
            Ok(agent) => agent,
            Err(e) => return Ok((response.deny(format!("invalid Agent: {e}")), Outcome::Denied)),
        };

        let violations = validate(&agent);
        if violations.is_empty() {
            info!(uid = %req.uid, name = %req.name, namespace = %namespace, "Agent is valid");
            return Ok((response, Outcome::Allowed));
        }

        self.logger
            .log_rejected(&req.uid, &req.name, namespace, &violations);
        Ok((response.deny(violations.join("\n")), Outcome::Denied))
    }

    fn record(&self, webhook: &str, started: Instant, outcome: Result<Outcome, &WebhookError>) {
        let result = match outcome {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "error",
        };
        self.metrics
            .observe_admission(webhook, result, started.elapsed().as_secs_f64());
    }
}

/// Typed view of a submitted object; a missing spec reads as empty
fn decode_agent(submitted: &Value) -> Result<Agent, serde_json::Error> {
    let mut value = submitted.clone();
    if let Some(root) = value.as_object_mut() {
        let spec = root.entry("spec").or_insert(Value::Null);
        if spec.is_null() {
            *spec = Value::Object(Default::default());
        }
    }
    serde_json::from_value(value)
}

/// The submitted object with defaulted labels and spec
///
/// Everything else, including fields the typed view does not know, is left
/// as submitted so the patch only touches what defaulting owns.
fn with_defaults(submitted: &Value, agent: &Agent) -> Result<Value, WebhookError> {
    let mut defaulted = submitted.clone();
    let root = defaulted.as_object_mut().ok_or(WebhookError::NotAnObject)?;

    let metadata = root
        .entry("metadata")
        .or_insert_with(|| Value::Object(Default::default()));
    let metadata = metadata.as_object_mut().ok_or(WebhookError::NotAnObject)?;
    metadata.insert("labels".to_string(), serde_json::to_value(&agent.metadata.labels)?);

    root.insert("spec".to_string(), serde_json::to_value(&agent.spec)?);
    Ok(defaulted)
}

async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    let started = Instant::now();
    let result = match TryInto::<AdmissionRequest<DynamicObject>>::try_into(review) {
        Ok(req) => state.mutate(&req).await,
        Err(e) => Err(e.into()),
    };
    state.record("mutate", started, result.as_ref().map(|(_, o)| *o));
    let (response, _) = result?;
    Ok(Json(response.into_review()))
}

async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, WebhookError> {
    let started = Instant::now();
    let result = TryInto::<AdmissionRequest<DynamicObject>>::try_into(review)
        .map_err(WebhookError::from)
        .and_then(|req| state.validate(&req));
    state.record("validate", started, result.as_ref().map(|(_, o)| *o));
    let (response, _) = result?;
    Ok(Json(response.into_review()))
}

/// Router serving both admission endpoints
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(MUTATE_PATH, post(mutate_handler))
        .route(VALIDATE_PATH, post(validate_handler))
        .with_state(state)
}
