//! Web服务器

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use clinic_core::Result;
use clinic_workflow::WorkflowEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::context::actor_context_middleware;
use crate::handlers::{
    api_root, clock_in, create_visit, final_checkout, get_visit, handoff, health, queue_snapshot,
    reset_stage,
};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, engine: Arc<WorkflowEngine>) -> Self {
        let app = Self::create_app(engine);
        Self { addr, app }
    }

    fn create_app(engine: Arc<WorkflowEngine>) -> Router {
        Router::new()
            // 根路径与健康检查（无需身份头）
            .route("/", get(api_root))
            .route("/health", get(health))
            // 业务API（网关注入的身份头必填）
            .nest("/api/v1", api_routes(engine))
            // 全局中间件
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CorsLayer::new()
                            .allow_origin(Any)
                            .allow_methods(Any)
                            .allow_headers(Any),
                    ),
            )
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| clinic_core::ClinicError::Internal(format!("bind failed: {}", e)))?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| clinic_core::ClinicError::Internal(format!("server error: {}", e)))?;

        Ok(())
    }
}

/// API v1 路由
fn api_routes(engine: Arc<WorkflowEngine>) -> Router {
    Router::new()
        .route("/visits", post(create_visit))
        .route("/visits/:id", get(get_visit))
        .route("/visits/:id/clock-in", post(clock_in))
        .route("/visits/:id/handoff", post(handoff))
        .route("/visits/:id/checkout", post(final_checkout))
        .route("/visits/:id/reset-stage", post(reset_stage))
        .route("/queue", get(queue_snapshot))
        .layer(middleware::from_fn(actor_context_middleware))
        .with_state(engine)
}
