// 🌐 REST API - axum routes over the address service
//
// The query engine is synchronous. Each request runs it on the blocking pool
// under the configured deadline; an expired deadline answers 503 so the
// caller may retry.

use crate::assembler::AddressService;
use crate::error::{Result, ServiceError};
use crate::normalizer::QueryParams;
use crate::store::RegistryStore;
use anyhow::anyhow;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

pub type SharedStore = Arc<dyn RegistryStore>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<AddressService<SharedStore>>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(service: Arc<AddressService<SharedStore>>, request_timeout: Duration) -> Self {
        AppState {
            service,
            request_timeout,
        }
    }

    /// Run one query on the blocking pool, resolved at a single instant.
    async fn run<T, F>(&self, query: F) -> Response
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&AddressService<SharedStore>, DateTime<Utc>) -> Result<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        let as_of = Utc::now();
        let task = tokio::task::spawn_blocking(move || query(&service, as_of));

        let result = match tokio::time::timeout(self.request_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ServiceError::Store(anyhow!("query task failed: {}", join_error))),
            Err(_) => Err(ServiceError::Unavailable(format!(
                "query exceeded {} ms",
                self.request_timeout.as_millis()
            ))),
        };

        match result {
            Ok(body) => (StatusCode::OK, Json(body)).into_response(),
            Err(e) => e.into_response(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(error = %self, retryable = self.is_retryable(), "query failed");
        } else {
            warn!(error = %self, "query rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct ReloadResponse {
    kommuner: usize,
    generation: u64,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "OK"}))
}

/// GET /adresse/lokalitet?kommune=
async fn get_localities(State(state): State<AppState>, Query(params): Query<QueryParams>) -> Response {
    state.run(move |service, now| service.localities(&params, now)).await
}

/// GET /adresse/vej?lokalitet=
async fn get_roads(State(state): State<AppState>, Query(params): Query<QueryParams>) -> Response {
    state.run(move |service, now| service.roads(&params, now)).await
}

/// GET /adresse/hus?vej=
async fn get_buildings(State(state): State<AppState>, Query(params): Query<QueryParams>) -> Response {
    state.run(move |service, now| service.buildings(&params, now)).await
}

/// GET /adresse/adresse?vej=&husnr=&bnr=
async fn get_addresses(State(state): State<AppState>, Query(params): Query<QueryParams>) -> Response {
    state.run(move |service, now| service.addresses(&params, now)).await
}

/// GET /adresse/adresseoplysninger?adresse=
async fn get_address_detail(State(state): State<AppState>, Query(params): Query<QueryParams>) -> Response {
    state.run(move |service, now| service.address_detail(&params, now)).await
}

/// POST /admin/kommuner/genindlaes - full municipality cache rebuild
async fn reload_municipalities(State(state): State<AppState>) -> Response {
    state
        .run(|service, now| {
            let kommuner = service.reload_municipalities(now)?;
            Ok(ReloadResponse {
                kommuner,
                generation: service.municipalities().generation(),
            })
        })
        .await
}

pub fn router(state: AppState) -> Router {
    let mut adresse = Router::new();
    // Both with and without trailing slash
    for (path, handler) in [
        ("/lokalitet", get(get_localities)),
        ("/vej", get(get_roads)),
        ("/hus", get(get_buildings)),
        ("/adresse", get(get_addresses)),
        ("/adresseoplysninger", get(get_address_detail)),
    ] {
        adresse = adresse
            .route(path, handler.clone())
            .route(&format!("{}/", path), handler);
    }

    Router::new()
        .route("/health", get(health_check))
        .route("/admin/kommuner/genindlaes", post(reload_municipalities))
        .nest("/adresse", adresse)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
