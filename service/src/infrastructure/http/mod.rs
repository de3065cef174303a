use anyhow::Context;
use axum::Router;
use axum::routing::{get, post, put};
use axum_prometheus::PrometheusMetricLayer;
use tokio::net;
use tokio_util::sync::CancellationToken;

use crate::domain::AppState;
use crate::infrastructure::http::handlers::{articles, assignments, drafts, health_check, schedule};

mod actor;
mod api;
mod handlers;
mod querystring;

/// Configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServerConfig<'a> {
    pub port: &'a str,
}

/// The application's HTTP server. The underlying HTTP package is opaque to module consumers.
pub struct HttpServer {
    router: axum::Router,
    listener: net::TcpListener,
}

impl HttpServer {
    /// Returns a new HTTP server bound to the port specified in `config`.
    pub async fn new(state: impl AppState, config: HttpServerConfig<'_>) -> anyhow::Result<Self> {
        let trace_layer = tower_http::trace::TraceLayer::new_for_http().make_span_with(
            |request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                tracing::info_span!("http_request", method = ?request.method(), uri)
            },
        );
        // see: https://github.com/Ptrskay3/axum-prometheus
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

        let router = routes()
            .route("/metrics", get(|| async move { metric_handle.render() }))
            .layer(trace_layer)
            .layer(prometheus_layer)
            .with_state(state);

        let listener = net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
            .await
            .with_context(|| format!("failed to listen on {}", config.port))?;

        Ok(Self { router, listener })
    }

    /// Runs the HTTP server until `shutdown` is cancelled, letting in-flight requests finish.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let address = self.listener.local_addr().context("listener has no local address")?;
        tracing::info!("listening on {}", address);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("received error from running server")?;
        Ok(())
    }
}

fn routes<S: AppState>() -> Router<S> {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
}

fn api_routes<S: AppState>() -> Router<S> {
    Router::new()
        .route(
            "/articles",
            get(articles::list_articles::<S>).post(articles::create_article::<S>),
        )
        .route("/articles/{id}", get(articles::get_article::<S>))
        .route("/articles/{id}/content", put(articles::commit_content::<S>))
        .route("/articles/{id}/submit", post(articles::submit_for_review::<S>))
        .route("/articles/{id}/approve", post(articles::approve::<S>))
        .route("/articles/{id}/request-revision", post(articles::request_revision::<S>))
        .route(
            "/articles/{id}/schedule",
            get(articles::schedule_entry::<S>)
                .post(articles::schedule::<S>)
                .delete(articles::cancel_schedule::<S>),
        )
        .route("/articles/{id}/publish", post(articles::publish_now::<S>))
        .route("/articles/{id}/archive", post(articles::archive::<S>))
        .route("/articles/{id}/publication", get(articles::publication_status::<S>))
        .route(
            "/articles/{id}/publication/{channel}/retry",
            post(articles::retry_channel::<S>),
        )
        .route("/articles/{id}/assignments", get(articles::article_assignments::<S>))
        .route(
            "/assignments",
            get(assignments::list_active::<S>).post(assignments::assign::<S>),
        )
        .route("/assignments/{id}", get(assignments::get_assignment::<S>))
        .route("/assignments/{id}/complete", post(assignments::complete::<S>))
        .route("/assignments/{id}/withdraw", post(assignments::withdraw::<S>))
        .route("/schedule/due", get(schedule::list_due::<S>))
        .route("/schedule/tick", post(schedule::tick::<S>))
        .route(
            "/drafts/snapshot",
            get(drafts::load_snapshot::<S>)
                .put(drafts::save_snapshot::<S>)
                .delete(drafts::clear_snapshot::<S>),
        )
        .route("/drafts/restore-candidate", get(drafts::restore_candidate::<S>))
        .route(
            "/drafts/session",
            put(drafts::update_session::<S>).delete(drafts::close_session::<S>),
        )
}
