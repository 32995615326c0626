use std::sync::Arc;

use agenda_scheduler::{EventService, JobTable};
use agenda_users::UserDirectory;
use axum::{
    routing::{get, put},
    Router,
};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub events: Arc<EventService>,
    pub users: Arc<UserDirectory>,
    pub jobs: Arc<JobTable>,
}

impl AppState {
    pub fn new(
        events: Arc<EventService>,
        users: Arc<UserDirectory>,
        jobs: Arc<JobTable>,
    ) -> Self {
        Self {
            events,
            users,
            jobs,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    use crate::http::{contacts, events, health, jobs};

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/v1/events", get(events::list_events).post(events::create_event))
        .route(
            "/v1/events/{id}",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/v1/me", put(contacts::put_contact).get(contacts::get_contact))
        .route("/v1/jobs", get(jobs::list_jobs))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
