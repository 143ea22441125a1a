use crate::cli::Args;
use crate::error::ApiError;
use crate::generator::Generator;
use crate::models::chat::{ now_rfc3339, ChatRequest, GenerationOutcome, HealthResponse };
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Semaphore;
use axum::{
    body::Bytes,
    routing::{ get, post },
    Router,
    extract::{ State, rejection::BytesRejection },
    Json,
};
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use tower_http::cors::{ Any, CorsLayer };
use uuid::Uuid;
use log::{ info, error, debug };

type ChatRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct AppState {
    generator: Arc<dyn Generator>,
    model_name: String,
    service_name: String,
    max_concurrent: usize,
    slots: Option<Arc<Semaphore>>,
    rate_limiter: Option<Arc<ChatRateLimiter>>,
}

impl AppState {
    pub fn new(generator: Arc<dyn Generator>, args: &Args) -> Self {
        let slots = (args.max_concurrent > 0).then(|| Arc::new(Semaphore::new(args.max_concurrent)));
        let rate_limiter = NonZeroU32::new(args.rate_limit_per_second).map(|n|
            Arc::new(RateLimiter::direct(Quota::per_second(n)))
        );
        Self {
            generator,
            model_name: args.model_name.clone(),
            service_name: args.service_name.clone(),
            max_concurrent: args.max_concurrent,
            slots,
            rate_limiter,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/mini-ice", post(mini_ice_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        service: state.service_name.clone(),
        model: state.model_name.clone(),
        timestamp: now_rfc3339(),
    })
}

async fn mini_ice_handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<GenerationOutcome>, ApiError> {
    let body = body?;
    let request = ChatRequest::from_json(&body)?;

    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            return Err(ApiError::RateLimited);
        }
    }

    // Held until the response is built; dropping it frees the slot.
    let _permit = match &state.slots {
        Some(slots) =>
            Some(
                Arc::clone(slots)
                    .try_acquire_owned()
                    .map_err(|_| ApiError::Busy(state.max_concurrent))?
            ),
        None => None,
    };

    let request_id = Uuid::new_v4();
    info!(
        "[{}] Mini-ICEBURG request: {} chars, {} history turns",
        request_id,
        request.message.chars().count(),
        request.conversation_history.len()
    );
    debug!("[{}] Message: {}", request_id, request.message);

    let raw = state.generator.generate(&request.message).await.map_err(|e| {
        error!("[{}] Generation failed", request_id);
        e
    })?;

    let outcome = GenerationOutcome::from_output(&raw, &state.model_name);
    info!("[{}] Responded with {} chars", request_id, outcome.response.len());
    Ok(Json(outcome))
}
