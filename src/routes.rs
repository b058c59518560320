use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    response::{sse::Sse, IntoResponse},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::coach::CoachMode;
use crate::error::{ApiError, TEXT_REQUIRED};
use crate::relay;
use crate::state::AppState;

/// Body of a coach request
#[derive(Debug, Default, Deserialize)]
pub struct HelpRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Only a declared, non-blank JSON body is parsed; anything else reads as `{}`.
#[async_trait]
impl<S> FromRequest<S> for HelpRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let declared_json = has_json_content_type(req.headers());
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        if !declared_json || body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let Json(request) = Json::<HelpRequest>::from_bytes(&body)?;
        Ok(request)
    }
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

/// Full application: routes, CORS and request tracing.
pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.system_config.allowed_origins);

    Router::new()
        .merge(create_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn create_routes() -> Router<AppState> {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check));

    for mode in CoachMode::ALL {
        router = router.route(mode.route(), coach_route(mode));
    }

    router
}

fn coach_route(mode: CoachMode) -> MethodRouter<AppState> {
    post(
        move |State(state): State<AppState>, request: HelpRequest| async move {
            coach_help(state, mode, request).await
        },
    )
    .fallback(method_not_allowed)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn root() -> &'static str {
    "Hello World"
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn method_not_allowed(method: Method) -> ApiError {
    info!("{} request received when POST expected", method);
    ApiError::method_not_allowed()
}

async fn coach_help(
    state: AppState,
    mode: CoachMode,
    request: HelpRequest,
) -> Result<impl IntoResponse, ApiError> {
    let text = request
        .text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request(TEXT_REQUIRED))?;

    info!("Received {} coach request ({} chars)", mode, text.chars().count());

    let coach = state.coaches.get(mode).clone();
    let events = relay::into_sse_events(relay::relay(coach, text));

    Ok(([(header::CONNECTION, "keep-alive")], Sse::new(events)))
}
