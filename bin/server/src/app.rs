//! Route table.
//!
//! Routes of a disabled capability are not mounted and answer 404.

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{AppState, omniauth, passwords, registrations, sessions};
use crate::home;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let config = state.accounts.config().clone();

    let mut users: Router<Arc<AppState>> = Router::new().route(
        "/users/sign_out",
        delete(sessions::destroy).post(sessions::destroy),
    );

    // Provider buttons live on the sign-in page.
    if config.database_authenticatable {
        users = users.route(
            "/users/sign_in",
            get(sessions::new).post(sessions::create),
        );
    } else if config.omniauthable {
        users = users.route("/users/sign_in", get(sessions::new));
    }

    if config.registerable {
        users = users
            .route("/users/sign_up", get(registrations::new))
            .route(
                "/users",
                post(registrations::create)
                    .put(registrations::update)
                    .patch(registrations::update),
            )
            .route(
                "/users/edit",
                get(registrations::edit).post(registrations::update),
            );
    }

    if config.recoverable && config.database_authenticatable {
        users = users
            .route("/users/password/new", get(passwords::new))
            .route(
                "/users/password",
                post(passwords::create)
                    .put(passwords::update)
                    .patch(passwords::update),
            )
            .route(
                "/users/password/edit",
                get(passwords::edit).post(passwords::update),
            );
    }

    if config.omniauthable {
        users = users
            .route("/users/auth/failure", get(omniauth::failure))
            .route(
                "/users/auth/{provider}",
                get(omniauth::passthru).post(omniauth::passthru),
            )
            .route("/users/auth/{provider}/callback", get(omniauth::callback));
    }

    Router::new()
        .route("/", get(home::index))
        .route("/home/index", get(home::index))
        .merge(users)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
