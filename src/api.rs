//! HTTP surface (section 6, ambient collaborator): serves the routing
//! document and diagnostics snapshots as JSON. Grounded on the teacher's
//! `api.rs` (`ApiConfig`, `create_server`, `ApiServer` shutdown handle);
//! the core never depends on `actix_web` types outside this module.

use std::net::SocketAddr;

use actix_web::{dev, get, web, App, HttpResponse, HttpServer, Responder};
use serde::Deserialize;

use crate::{cache::Cache, diagnostics::Diagnostics, health::HealthChecker};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ApiConfig {
    pub(crate) address: SocketAddr,
}

#[derive(Clone)]
struct AppData {
    cache: Arc<Cache>,
    diagnostics: Arc<Diagnostics>,
    health: Arc<HealthChecker>,
}

#[get("/api/config")]
async fn routing_document(app_data: web::Data<AppData>) -> impl Responder {
    match app_data.cache.get().await {
        Some(document) => HttpResponse::Ok().json(&*document),
        None => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "error": "No routing document has been generated yet"
        })),
    }
}

#[get("/api/health")]
async fn health(app_data: web::Data<AppData>) -> impl Responder {
    web::Json(app_data.health.snapshot().await)
}

#[get("/api/diagnostics")]
async fn diagnostics(app_data: web::Data<AppData>) -> impl Responder {
    web::Json(app_data.diagnostics.snapshot().await)
}

fn create_server(config: &ApiConfig, app_data: AppData) -> Option<(dev::Server, u16)> {
    tracing::info!(address = %config.address, "Starting API server");

    let api_server = match HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_data.clone()))
            .service(routing_document)
            .service(health)
            .service(diagnostics)
    })
    .disable_signals()
    .bind(config.address)
    {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error=%e, "Failed to create API server");
            return None;
        }
    };

    let port = api_server.addrs().first().unwrap().port();

    Some((api_server.run(), port))
}

pub(crate) struct ApiServer {
    #[cfg(test)]
    pub(crate) port: u16,
    api_server: dev::ServerHandle,
}

impl ApiServer {
    pub(crate) fn new(
        config: &ApiConfig,
        cache: Arc<Cache>,
        diagnostics: Arc<Diagnostics>,
        health: Arc<HealthChecker>,
    ) -> Option<Self> {
        let data = AppData {
            cache,
            diagnostics,
            health,
        };

        create_server(config, data).map(|(api_server, _port)| {
            let handle = api_server.handle();
            tokio::spawn(api_server);

            Self {
                #[cfg(test)]
                port: _port,
                api_server: handle,
            }
        })
    }

    pub(crate) async fn shutdown(self) {
        self.api_server.stop(!cfg!(test)).await;
    }
}
