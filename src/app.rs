use axum::{http::HeaderValue, middleware::from_fn_with_state, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::database::{
    DatabaseError, DatabaseManager, PgRecordStore, RecordStore, TenantGateway, TenantScopedRecordRepository,
    UnavailableStore,
};
use crate::error::ApiError;
use crate::handlers;
use crate::middleware::resolve_tenant_middleware;
use crate::tenancy::TenantContext;

/// Shared application state; cheap to clone per request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Request-scoped repository bound to the given tenant
    pub fn records(&self, tenant: TenantContext) -> TenantScopedRecordRepository {
        TenantScopedRecordRepository::new(TenantGateway::new(tenant, self.store.clone()))
    }
}

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    // The nested "/" only matches "/api", so the trailing-slash form is routed explicitly
    let router = Router::new()
        .route("/api/", get(handlers::public::root))
        .nest("/api", api_routes());
    let mut router = crate::frontend::attach(router, &config)
        // Tenant resolution runs before every handler
        .layer(from_fn_with_state(state.clone(), resolve_tenant_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(config.api.request_timeout_secs)));

    if config.security.enable_cors {
        router = router.layer(cors_layer(&config));
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn api_routes() -> Router<AppState> {
    use axum::routing::post;
    use handlers::protected::sample;
    use handlers::public;

    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Tenant-scoped sample records
        .route("/sample/records", post(sample::records_post).get(sample::records_get))
        .fallback(api_not_found)
}

async fn api_not_found() -> ApiError {
    ApiError::not_found("No API route matches this path")
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.is_development() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Record store plus the pool that backs it, when there is one
pub struct Storage {
    pub store: Arc<dyn RecordStore>,
    manager: Option<DatabaseManager>,
}

impl Storage {
    fn degraded() -> Self {
        Self {
            store: Arc::new(UnavailableStore::new("DATABASE_URL")),
            manager: None,
        }
    }

    /// Close the database pool, if any. Call after the server has drained.
    pub async fn close(&self) {
        if let Some(manager) = &self.manager {
            manager.close().await;
        }
    }
}

/// Build the record store for the configured database.
///
/// A missing connection string or failed migration aborts startup in
/// development; elsewhere it is logged and the API starts degraded.
pub async fn connect_store(config: &AppConfig) -> Result<Storage, DatabaseError> {
    let manager = match DatabaseManager::new(&config.database) {
        Ok(manager) => manager,
        Err(e) if config.is_development() => return Err(e),
        Err(e) => {
            tracing::error!("Database unavailable, starting degraded: {}", e);
            return Ok(Storage::degraded());
        }
    };

    if config.database.migrate_on_startup {
        if let Err(e) = manager.migrate().await {
            tracing::error!("Failed to apply database migrations: {}", e);
            // In development, fail fast so schema issues are immediately visible
            if config.is_development() {
                return Err(e);
            }
        }
    }

    Ok(Storage {
        store: Arc::new(PgRecordStore::new(manager.clone())),
        manager: Some(manager),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::database::MemoryRecordStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_app(store: &MemoryRecordStore) -> Router {
        let mut config = AppConfig::for_environment(Environment::Production);
        config.frontend.static_dir = "does-not-exist".to_string();
        app(AppState::new(config, Arc::new(store.clone())))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn create(tenant: Option<&str>, value: &str) -> Request<Body> {
        let mut builder = Request::post("/api/sample/records").header(header::CONTENT_TYPE, "application/json");
        if let Some(tenant) = tenant {
            builder = builder.header("X-Tenant-Id", tenant);
        }
        builder
            .body(Body::from(json!({ "value": value }).to_string()))
            .unwrap()
    }

    fn list(tenant: Option<&str>) -> Request<Body> {
        let mut builder = Request::get("/api/sample/records");
        if let Some(tenant) = tenant {
            builder = builder.header("X-Tenant-Id", tenant);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn records_are_isolated_by_tenant() {
        let store = MemoryRecordStore::new();
        let app = test_app(&store);
        let tenant_a = Uuid::new_v4().to_string();
        let tenant_b = Uuid::new_v4().to_string();

        let (status, body) = send(&app, create(Some(&tenant_a), "a1")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["data"]["id"].is_string());

        let (status, body) = send(&app, list(Some(&tenant_a))).await;
        assert_eq!(status, StatusCode::OK);
        let records = body["data"].as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["value"], "a1");
        assert_eq!(records[0]["tenantId"], tenant_a.as_str());

        let (status, body) = send(&app, list(Some(&tenant_b))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn create_without_tenant_is_rejected() {
        let store = MemoryRecordStore::new();
        let app = test_app(&store);

        let (status, body) = send(&app, create(None, "x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Tenant context is required.");
        assert!(store.rows().await.is_empty());
    }

    #[tokio::test]
    async fn nil_and_garbage_headers_mean_no_tenant() {
        let store = MemoryRecordStore::new();
        let app = test_app(&store);

        for header in ["00000000-0000-0000-0000-000000000000", "tenant-a", ""] {
            let (status, _) = send(&app, create(Some(header), "x")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "header {:?}", header);
            let (status, _) = send(&app, list(Some(header))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "header {:?}", header);
        }
        assert!(store.rows().await.is_empty());
    }

    #[tokio::test]
    async fn create_sets_location_header() {
        let store = MemoryRecordStore::new();
        let app = test_app(&store);

        let response = app
            .oneshot(create(Some(&Uuid::new_v4().to_string()), "a1"))
            .await
            .unwrap();
        let id = store.rows().await[0].id;
        assert_eq!(
            response.headers()[header::LOCATION],
            format!("/api/sample/records/{}", id).as_str()
        );
    }

    #[tokio::test]
    async fn overlong_value_is_a_validation_error() {
        let store = MemoryRecordStore::new();
        let app = test_app(&store);

        let (status, body) = send(&app, create(Some(&Uuid::new_v4().to_string()), &"x".repeat(501))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(store.rows().await.is_empty());
    }

    #[tokio::test]
    async fn custom_tenant_header_name() {
        let store = MemoryRecordStore::new();
        let mut config = AppConfig::for_environment(Environment::Production);
        config.tenancy.header_name = "X-Org".to_string();
        let app = app(AppState::new(config, Arc::new(store.clone())));
        let tenant = Uuid::new_v4().to_string();

        let request = Request::get("/api/sample/records")
            .header("X-Org", tenant.as_str())
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, request).await.0, StatusCode::OK);

        assert_eq!(send(&app, list(Some(&tenant))).await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_and_root() {
        let store = MemoryRecordStore::new();
        let app = test_app(&store);

        let (status, body) = send(&app, Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");

        let response = app
            .clone()
            .oneshot(Request::get("/api").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"MiLyst API");
    }

    #[tokio::test]
    async fn root_with_trailing_slash_is_the_banner_not_the_spa() {
        let mut config = AppConfig::for_environment(Environment::Production);
        config.frontend.static_dir = "tests/fixtures/wwwroot".to_string();
        let app = app(AppState::new(config, Arc::new(MemoryRecordStore::new())));

        let response = app
            .oneshot(Request::get("/api/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"MiLyst API");
    }

    #[tokio::test]
    async fn health_reports_degraded_store() {
        let config = AppConfig::for_environment(Environment::Production);
        let app = app(AppState::new(config, Arc::new(UnavailableStore::new("DATABASE_URL"))));

        let (status, body) = send(&app, Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["data"]["status"], "degraded");
    }

    #[tokio::test]
    async fn unknown_api_path_is_json_not_found() {
        let store = MemoryRecordStore::new();
        let app = test_app(&store);

        let (status, body) = send(&app, Request::get("/api/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn degraded_startup_outside_development() {
        let mut config = AppConfig::for_environment(Environment::Production);
        config.database.url = None;
        let storage = connect_store(&config).await.unwrap();
        assert!(storage.store.ping().await.is_err());
        storage.close().await;

        let mut config = AppConfig::for_environment(Environment::Development);
        config.database.url = None;
        assert!(matches!(
            connect_store(&config).await,
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        ));
    }

    #[tokio::test]
    async fn close_releases_the_pool() {
        let mut config = AppConfig::for_environment(Environment::Production);
        config.database.url = Some("postgres://u:p@127.0.0.1:1/none".to_string());
        config.database.migrate_on_startup = false;

        let storage = connect_store(&config).await.unwrap();
        storage.close().await;
        assert!(storage.manager.as_ref().is_some_and(|m| m.pool().is_closed()));
        assert!(storage.store.ping().await.is_err());
    }
}
