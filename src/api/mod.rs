//! Versioned REST API guarded by a configurable authenticator.

pub mod auth;
pub mod gate;
pub mod views;

use actix_web::web;

pub use auth::{build_authenticator, require_auth, Authenticator, RequestCredentials};
pub use gate::{AuthGate, CurrentUser};

use crate::AppState;

pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    let gate = AuthGate::new(
        state.authenticator.clone(),
        state.config.auth.excluded_paths.clone(),
        &state.config.auth.session_name,
    );

    cfg.service(
        web::scope("/api/v1")
            .wrap(gate)
            .route("/status", web::get().to(views::index::status))
            .route("/stats", web::get().to(views::index::stats))
            .route("/unauthorized", web::get().to(views::index::unauthorized))
            .route("/forbidden", web::get().to(views::index::forbidden))
            .service(
                web::resource("/users")
                    .route(web::get().to(views::users::list_users))
                    .route(web::post().to(views::users::create_user)),
            )
            .service(
                web::resource("/users/{user_id}")
                    .route(web::get().to(views::users::get_user))
                    .route(web::delete().to(views::users::delete_user)),
            )
            .route("/auth_session/login", web::post().to(views::session_auth::login))
            .route("/auth_session/logout", web::delete().to(views::session_auth::logout)),
    );
}
