use crate::auth::AuthService;
use crate::errors::Error;
use crate::metrics::REQUEST_LATENCY_SECONDS;
use crate::model::{
    AuthResponse, CreateReadingRequest, GenerateQuery, LoginRequest, Reading, SensorSummary,
    TimeRange,
};
use crate::service::ReadingService;
use crate::token::TokenError;
use crate::validate::{validate_reading, validate_sample_count};
use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

const DEFAULT_SAMPLE_COUNT: u32 = 10;

#[derive(Clone)]
pub struct AppState {
    pub readings: ReadingService,
    pub auth: AuthService,
}

/// Email of the caller, set by the bearer middleware
#[derive(Debug, Clone)]
pub struct Subject(pub String);

pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let public = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/api/auth/validate", get(validate_token));

    let protected = Router::new()
        .route("/api/sensors", get(list_sensors))
        .route("/api/readings", get(list_readings).post(create_reading))
        .route("/api/readings/generate", post(generate_samples))
        .route("/api/readings/id/:id", get(reading_by_id))
        .route(
            "/api/readings/:sensor_id",
            get(readings_by_sensor).delete(delete_reading),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));

    public
        .merge(protected)
        .layer(middleware::from_fn(track_latency))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let email = {
        let token = bearer_token(request.headers()).ok_or(TokenError::Malformed)?;
        state.auth.validate(token)?
    };

    debug!("Authenticated request from {}", email);
    request.extensions_mut().insert(Subject(email));
    Ok(next.run(request).await)
}

async fn track_latency(request: Request, next: Next) -> Response {
    let timer = REQUEST_LATENCY_SECONDS.start_timer();
    let response = next.run(request).await;
    timer.observe_duration();
    response
}

async fn health() -> &'static str {
    "Sensor API is running"
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    info!("POST /api/auth/login - {}", request.email);
    Ok(Json(state.auth.login(&request)?))
}

async fn validate_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match bearer_token(&headers).map(|token| state.auth.validate(token)) {
        Some(Ok(email)) => (StatusCode::OK, format!("Token valid for: {}", email)).into_response(),
        _ => (StatusCode::UNAUTHORIZED, "Invalid or expired token").into_response(),
    }
}

async fn list_sensors(
    State(state): State<AppState>,
) -> Result<Json<Vec<SensorSummary>>, AppError> {
    info!("GET /api/sensors");
    Ok(Json(state.readings.list_sensors().await?))
}

async fn list_readings(State(state): State<AppState>) -> Result<Json<Vec<Reading>>, AppError> {
    info!("GET /api/readings");
    Ok(Json(state.readings.list_all().await?))
}

async fn readings_by_sensor(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
    Query(range): Query<TimeRange>,
) -> Result<Json<Vec<Reading>>, AppError> {
    info!("GET /api/readings/{}", sensor_id);
    Ok(Json(
        state
            .readings
            .list_by_sensor_between(&sensor_id, range)
            .await?,
    ))
}

async fn reading_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Reading>, AppError> {
    info!("GET /api/readings/id/{}", id);
    Ok(Json(state.readings.get_by_id(id).await?))
}

async fn create_reading(
    State(state): State<AppState>,
    Extension(Subject(email)): Extension<Subject>,
    Json(request): Json<CreateReadingRequest>,
) -> Result<(StatusCode, Json<Reading>), AppError> {
    info!(
        "POST /api/readings - sensor {} by {}",
        request.sensor_id, email
    );
    validate_reading(&request)?;

    let reading = state.readings.create(request.into()).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

async fn generate_samples(
    State(state): State<AppState>,
    Query(params): Query<GenerateQuery>,
) -> Result<String, AppError> {
    let count = params.count.unwrap_or(DEFAULT_SAMPLE_COUNT);
    info!("POST /api/readings/generate - count {}", count);
    validate_sample_count(count)?;

    Ok(state.readings.generate_samples(count).await?)
}

async fn delete_reading(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    info!("DELETE /api/readings/{}", id);
    state.readings.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Token(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("API error: {}", self.0);
            return (status, format!("Internal server error: {}", self.0)).into_response();
        }

        debug!("Request rejected ({}): {}", status, self.0);
        (status, self.0.to_string()).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
