//! HTTP client that walks a running service through the full account
//! lifecycle, checking every response on the way.

use anyhow::{bail, ensure, Context, Result};
use reqwest::{header, Client, Response, StatusCode};
use serde_json::{json, Value};
use tracing::info;
use url::Url;

use crate::auth::handlers::SESSION_COOKIE;

pub struct AuthClient {
    http: Client,
    base: Url,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid base url {}", base_url))?;
        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    async fn expect_json(response: Response, status: StatusCode) -> Result<Value> {
        let actual = response.status();
        let body = response.text().await?;
        ensure!(actual == status, "expected {}, got {}: {}", status, actual, body);
        serde_json::from_str(&body).with_context(|| format!("response is not JSON: {}", body))
    }

    pub async fn register_user(&self, email: &str, password: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url("users")?)
            .form(&[("email", email), ("password", password)])
            .send()
            .await?;

        let body = Self::expect_json(response, StatusCode::OK).await?;
        ensure!(body == json!({ "email": email, "message": "user created" }), "unexpected body {}", body);
        Ok(())
    }

    pub async fn log_in_wrong_password(&self, email: &str, password: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url("sessions")?)
            .form(&[("email", email), ("password", password)])
            .send()
            .await?;

        ensure!(
            response.status() == StatusCode::UNAUTHORIZED,
            "wrong password answered {}",
            response.status()
        );
        Ok(())
    }

    pub async fn log_in(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("sessions")?)
            .form(&[("email", email), ("password", password)])
            .send()
            .await?;

        let session_id = response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string());

        let body = Self::expect_json(response, StatusCode::OK).await?;
        ensure!(body == json!({ "email": email, "message": "logged in" }), "unexpected body {}", body);

        match session_id {
            Some(session_id) => Ok(session_id),
            None => bail!("login did not set the {} cookie", SESSION_COOKIE),
        }
    }

    pub async fn profile_unlogged(&self) -> Result<()> {
        let response = self.http.get(self.url("profile")?).send().await?;
        ensure!(
            response.status() == StatusCode::FORBIDDEN,
            "anonymous profile answered {}",
            response.status()
        );
        Ok(())
    }

    pub async fn profile_logged(&self, session_id: &str) -> Result<String> {
        let response = self
            .http
            .get(self.url("profile")?)
            .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, session_id))
            .send()
            .await?;

        let body = Self::expect_json(response, StatusCode::OK).await?;
        body["email"]
            .as_str()
            .map(str::to_string)
            .context("profile has no email")
    }

    /// The service redirects to `/` once the session is gone; the redirect
    /// is followed.
    pub async fn log_out(&self, session_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url("sessions")?)
            .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, session_id))
            .send()
            .await?;

        ensure!(response.status() == StatusCode::OK, "logout answered {}", response.status());
        ensure!(
            response.cookies().all(|cookie| cookie.name() != SESSION_COOKIE),
            "logout handed out a new session"
        );
        Ok(())
    }

    pub async fn reset_password_token(&self, email: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("reset_password")?)
            .form(&[("email", email)])
            .send()
            .await?;

        let body = Self::expect_json(response, StatusCode::OK).await?;
        body["reset_token"]
            .as_str()
            .map(str::to_string)
            .context("response has no reset_token")
    }

    pub async fn update_password(&self, email: &str, reset_token: &str, new_password: &str) -> Result<()> {
        let response = self
            .http
            .put(self.url("reset_password")?)
            .form(&[
                ("email", email),
                ("reset_token", reset_token),
                ("new_password", new_password),
            ])
            .send()
            .await?;

        let body = Self::expect_json(response, StatusCode::OK).await?;
        ensure!(
            body == json!({ "email": email, "message": "Password updated" }),
            "unexpected body {}",
            body
        );
        Ok(())
    }

    /// Register, log in and out, reset the password, and log in again with
    /// the new one.
    pub async fn run_flow(&self, email: &str, password: &str, new_password: &str) -> Result<()> {
        self.register_user(email, password).await.context("register")?;
        self.log_in_wrong_password(email, new_password).await.context("wrong password")?;
        self.profile_unlogged().await.context("anonymous profile")?;

        let session_id = self.log_in(email, password).await.context("log in")?;
        let profile_email = self.profile_logged(&session_id).await.context("profile")?;
        ensure!(profile_email == email, "profile belongs to {}", profile_email);
        self.log_out(&session_id).await.context("log out")?;

        let reset_token = self.reset_password_token(email).await.context("reset token")?;
        self.update_password(email, &reset_token, new_password)
            .await
            .context("update password")?;
        self.log_in(email, new_password).await.context("log in with new password")?;

        info!("Account lifecycle completed for {}", email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(AuthClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_register_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(body_string_contains("email=bob%40example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "email": "bob@example.com",
                "message": "user created"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri()).unwrap();
        client.register_user("bob@example.com", "pw").await.unwrap();
    }

    #[tokio::test]
    async fn test_register_user_rejects_duplicate_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "email already registered"
            })))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri()).unwrap();
        assert!(client.register_user("bob@example.com", "pw").await.is_err());
    }

    #[tokio::test]
    async fn test_log_in_returns_session_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "session_id=abc-123; Path=/")
                    .set_body_json(json!({ "email": "bob@example.com", "message": "logged in" })),
            )
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri()).unwrap();
        let session_id = client.log_in("bob@example.com", "pw").await.unwrap();
        assert_eq!(session_id, "abc-123");
    }

    #[tokio::test]
    async fn test_log_in_without_cookie_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "email": "bob@example.com", "message": "logged in" })),
            )
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri()).unwrap();
        assert!(client.log_in("bob@example.com", "pw").await.is_err());
    }

    #[tokio::test]
    async fn test_profile_sends_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profile"))
            .and(header_matcher("cookie", "session_id=abc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "email": "bob@example.com" })))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri()).unwrap();
        assert_eq!(client.profile_logged("abc-123").await.unwrap(), "bob@example.com");
    }

    #[tokio::test]
    async fn test_log_out_follows_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Bienvenue" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri()).unwrap();
        client.log_out("abc-123").await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_password_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reset_password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "email": "bob@example.com",
                "reset_token": "tok-1"
            })))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri()).unwrap();
        assert_eq!(client.reset_password_token("bob@example.com").await.unwrap(), "tok-1");
    }
}
