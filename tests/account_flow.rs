use std::net::TcpListener;

use actix_web::{middleware, web, App, HttpServer};
use sessionauth_server::client::AuthClient;
use sessionauth_server::{configure_app, AppState, Settings};

/// Serves the app on a random local port and returns its base URL.
async fn spawn_app() -> (String, AppState) {
    let config = Settings::new_for_test().expect("Failed to load test config");
    let state = AppState::new(config).await.expect("Failed to build state");

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let data = web::Data::new(state.clone());
    let app_state = state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::NormalizePath::trim())
            .app_data(data.clone())
            .configure(|cfg| configure_app(cfg, &app_state))
    })
    .listen(listener)
    .expect("Failed to listen")
    .workers(1)
    .run();
    actix_rt::spawn(server);

    (format!("http://127.0.0.1:{}", port), state)
}

#[test_log::test(actix_web::test)]
async fn test_full_account_flow() {
    let (base_url, state) = spawn_app().await;
    let client = AuthClient::new(&base_url).unwrap();

    client
        .run_flow("guillaume@holberton.io", "b4l0u", "t4rt1fl3tt3")
        .await
        .expect("account flow");

    assert_eq!(state.db.count_users().await.unwrap(), 1);
}

#[actix_web::test]
async fn test_flow_fails_for_registered_email() {
    let (base_url, state) = spawn_app().await;
    state
        .auth_service
        .register_user("guillaume@holberton.io", "b4l0u")
        .await
        .unwrap();

    let client = AuthClient::new(&base_url).unwrap();
    let result = client.run_flow("guillaume@holberton.io", "b4l0u", "t4rt1fl3tt3").await;
    assert!(result.is_err());
}
