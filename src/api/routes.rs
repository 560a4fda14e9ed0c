//! Router assembly and shared application state.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::activity::ActivityLog;
use crate::ai::{AssistClient, GroqAssist};
use crate::comments::Comments;
use crate::config::Config;
use crate::notify::NotificationDispatcher;
use crate::realtime::RealtimeHub;
use crate::stages::StageRegistry;
use crate::store::Store;
use crate::tasks::TaskLifecycle;

use super::{activity as activity_api, assist, auth, comments as comments_api};
use super::{notifications, stages as stages_api, stream, tasks as tasks_api, users};

/// Shared application state. Every collaborator is an explicit dependency
/// injected here; there is no process-global publish handle.
pub struct AppState {
    pub config: Config,
    pub store: Arc<Store>,
    pub hub: Arc<RealtimeHub>,
    pub stages: StageRegistry,
    pub tasks: TaskLifecycle,
    pub comments: Comments,
    pub notifier: NotificationDispatcher,
    pub activity: ActivityLog,
    pub assist: Arc<dyn AssistClient>,
}

impl AppState {
    /// Wire up the service graph over a store, hub, and assist backend.
    pub fn new(config: Config, store: Arc<Store>, assist: Arc<dyn AssistClient>) -> Self {
        let hub = Arc::new(RealtimeHub::new());
        let activity = ActivityLog::new(Arc::clone(&store), Arc::clone(&hub));
        let notifier = NotificationDispatcher::new(Arc::clone(&store), Arc::clone(&hub));
        let tasks = TaskLifecycle::new(
            Arc::clone(&store),
            activity.clone(),
            notifier.clone(),
            Arc::clone(&assist),
        );
        let comments = Comments::new(
            Arc::clone(&store),
            activity.clone(),
            notifier.clone(),
            Arc::clone(&hub),
        );
        let stages = StageRegistry::new(Arc::clone(&store));

        Self {
            config,
            store,
            hub,
            stages,
            tasks,
            comments,
            notifier,
            activity,
            assist,
        }
    }
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Store::open(&config.data_dir);
    let assist: Arc<dyn AssistClient> = Arc::new(GroqAssist::new(&config));
    let state = Arc::new(AppState::new(config.clone(), store, assist));

    let app = router(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the full router over the given state.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        // WebSocket feed authenticates via subprotocol/query token
        // (browsers cannot set an Authorization header on upgrades).
        .route("/api/stream", get(stream::stream_ws));

    let protected_routes = Router::new()
        // Tasks
        .route("/api/tasks", get(tasks_api::list).post(tasks_api::create))
        .route("/api/tasks/nlp", post(tasks_api::create_from_text))
        .route(
            "/api/tasks/:id",
            get(tasks_api::get_one)
                .put(tasks_api::update)
                .delete(tasks_api::delete_one),
        )
        .route("/api/tasks/:id/status", patch(tasks_api::change_stage))
        .route("/api/tasks/:id/assign", patch(tasks_api::reassign))
        .route("/api/tasks/:id/subtasks", post(tasks_api::add_subtask))
        .route(
            "/api/tasks/:task_id/subtasks/:subtask_id",
            put(tasks_api::update_subtask).delete(tasks_api::delete_subtask),
        )
        .route("/api/tasks/:id/risk", get(tasks_api::risk))
        // Task comments
        .route(
            "/api/tasks/:id/comments",
            get(comments_api::list).post(comments_api::add),
        )
        .route(
            "/api/comments/:id",
            put(comments_api::update).delete(comments_api::delete_one),
        )
        // Workflow stages
        .route(
            "/api/stages",
            get(stages_api::list).post(stages_api::create),
        )
        .route("/api/stages/reorder", patch(stages_api::reorder))
        .route(
            "/api/stages/:id",
            put(stages_api::update).delete(stages_api::delete_one),
        )
        // Notifications
        .route("/api/notifications", get(notifications::list))
        .route(
            "/api/notifications/read-all",
            patch(notifications::mark_all_read),
        )
        .route(
            "/api/notifications/:id/read",
            patch(notifications::mark_read),
        )
        // Activity feed
        .route("/api/activity", get(activity_api::feed))
        // Users
        .route("/api/users", get(users::list))
        .route("/api/users/me", get(users::me).put(users::update_profile))
        .route("/api/users/me/stats", get(users::stats))
        // AI assist
        .route("/api/assist/enhance-task", post(assist::enhance_task))
        .route(
            "/api/assist/suggest-subtasks",
            post(assist::suggest_subtasks),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    dev_mode: bool,
    auth_required: bool,
    realtime_clients: usize,
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            dev_mode: state.config.dev_mode,
            auth_required: state.config.auth_required(),
            realtime_clients: state.hub.connection_count().await,
        }),
    )
}
