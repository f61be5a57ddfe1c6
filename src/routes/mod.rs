mod attendance;
mod auth;
mod guests;
mod health;
mod invites;
mod item_types;
mod parties;
mod selections;

use axum::middleware as axum_mw;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::rate_limit::rate_limit_middleware;
use crate::state::AppState;

/// Build the full application router. Consumes the state so middleware
/// layers that need `State<AppState>` (the rate limiter) can be wired up.
pub fn router(state: AppState) -> Router {
    let api = api_routes(&state);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Admin auth (register/login are public, logout requires a token)
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Guest-facing
        .route("/invites/resolve", post(invites::resolve_invite))
        .route("/parties/{party_id}", get(parties::get_party))
        .route("/parties/{party_id}/join", post(guests::join_party))
        .route("/parties/{party_id}/me", get(guests::get_me))
        .route(
            "/parties/{party_id}/attendance",
            put(attendance::set_attendance),
        )
        .route(
            "/parties/{party_id}/selection",
            put(selections::select_item_type).delete(selections::release_selection),
        )
        // Admin: parties
        .route(
            "/admin/parties",
            get(parties::list_parties).post(parties::create_party),
        )
        .route(
            "/admin/parties/{party_id}",
            get(parties::get_admin_party)
                .patch(parties::update_party)
                .delete(parties::delete_party),
        )
        // Admin: invite codes
        .route(
            "/admin/parties/{party_id}/invite",
            patch(invites::update_invite),
        )
        .route(
            "/admin/parties/{party_id}/invite/rotate",
            post(invites::rotate_invite),
        )
        // Admin: guests
        .route(
            "/admin/parties/{party_id}/guests/{guest_id}",
            delete(guests::remove_guest),
        )
        // Admin: item types
        .route(
            "/admin/parties/{party_id}/item-types",
            get(item_types::list_item_types).post(item_types::create_item_type),
        )
        .route(
            "/admin/parties/{party_id}/item-types/{item_type_id}",
            patch(item_types::update_item_type).delete(item_types::delete_item_type),
        )
        // Version
        .route("/version", get(health::version))
        // Rate limit on all API routes
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
}
