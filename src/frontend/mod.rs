// frontend/mod.rs - Single-page app hosting
//
// Development: every non-API request is proxied to the Vite dev server.
// Staging/production: the built SPA is served from disk with an index.html
// fallback so client-side routes resolve.

pub mod dev_server;
pub mod proxy;

use axum::{extract::Request, response::IntoResponse, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

use crate::app::AppState;
use crate::config::AppConfig;

pub use dev_server::DevServer;
pub use proxy::DevServerProxy;

/// Install the frontend as the router's fallback
pub fn attach(router: Router<AppState>, config: &AppConfig) -> Router<AppState> {
    if config.is_development() {
        match DevServerProxy::new(&config.frontend.dev_server_url) {
            Ok(proxy) => {
                let proxy = Arc::new(proxy);
                return router.fallback(move |request: Request| {
                    let proxy = proxy.clone();
                    async move { proxy.forward(request).await.into_response() }
                });
            }
            Err(e) => {
                tracing::warn!("Dev server proxy disabled: {}", e);
                return router;
            }
        }
    }

    let static_dir = Path::new(&config.frontend.static_dir);
    let index = static_dir.join("index.html");
    router.fallback_service(ServeDir::new(static_dir).fallback(ServeFile::new(index)))
}
