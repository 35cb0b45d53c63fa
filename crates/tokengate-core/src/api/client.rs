//! Service-level API client.
//!
//! Thin pass-through endpoints on top of [`ReauthInterceptor`]. Only sign-in,
//! logout and profile touch auth state; everything else is a plain call.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use super::executor::RequestExecutor;
use super::reauth::ReauthInterceptor;
use super::request::{ApiResponse, PendingRequest};
use super::transport::{HttpTransport, Transport};
use super::RequestError;
use crate::auth::Credential;
use crate::context::AuthContext;
use crate::models::{
    ForgetPasswordRequest, LoginRequest, LoginResponse, ProfileResponse, RegisterRequest,
    ResetPasswordRequest, UserProfile, VerifyOtpRequest,
};

const SIGNIN_PATH: &str = "auth/signin";
const SIGNUP_PATH: &str = "auth/signup";
const LOGOUT_PATH: &str = "auth/logout";
const PROFILE_PATH: &str = "auth/me";
const FORGET_PASSWORD_PATH: &str = "auth/forget-password";
const VERIFY_OTP_PATH: &str = "auth/verify-otp";
const RESET_PASSWORD_PATH: &str = "auth/reset-password";
const USERS_PATH: &str = "user/get";
const DASHBOARD_STATS_PATH: &str = "packing-list/summary";

/// Clone is cheap - the interceptor, executor and context are shared.
#[derive(Clone)]
pub struct ApiClient {
    api: ReauthInterceptor,
}

impl ApiClient {
    /// Client over the real HTTP transport
    pub fn new(base_url: Url, timeout: Duration, ctx: AuthContext) -> Result<Self, RequestError> {
        let transport = HttpTransport::new(timeout)?;
        Ok(Self::with_transport(Arc::new(transport), base_url, ctx))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, base_url: Url, ctx: AuthContext) -> Self {
        let executor = RequestExecutor::new(transport, base_url, Arc::clone(ctx.tokens()));
        Self {
            api: ReauthInterceptor::new(executor, ctx),
        }
    }

    pub fn context(&self) -> &AuthContext {
        self.api.context()
    }

    pub fn interceptor(&self) -> &ReauthInterceptor {
        &self.api
    }

    /// Arbitrary call with silent refresh on 401
    pub async fn request(&self, request: PendingRequest) -> Result<ApiResponse, RequestError> {
        self.api.request(request).await
    }

    // ===== Auth =====

    /// Sign in and hold the returned credential in memory.
    ///
    /// The refresh cookie set by the server lands in the cookie channel.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, RequestError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let request = PendingRequest::post(SIGNIN_PATH)
            .with_body(&body)?
            .with_credentials()
            .without_reauth();

        let response: LoginResponse = self.api.request(request).await?.json()?;
        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RequestError::Decode("sign-in response has no accessToken".into()))?;

        let user = response.user.unwrap_or_else(|| UserProfile {
            email: Some(email.to_string()),
            ..Default::default()
        });
        self.context().sign_in(Credential::new(token), user.clone());
        Ok(user)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Value, RequestError> {
        let body = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let request = PendingRequest::post(SIGNUP_PATH)
            .with_body(&body)?
            .with_credentials()
            .without_reauth();
        Ok(self.api.request(request).await?.body)
    }

    /// Refresh the credential now instead of waiting for a 401
    pub async fn refresh(&self) -> Result<(), RequestError> {
        self.api.refresh().await.map(|_| ()).map_err(RequestError::from)
    }

    /// Log out on the server and locally.
    ///
    /// Local state is cleared even when the server call fails; that failure
    /// is still returned.
    pub async fn logout(&self) -> Result<(), RequestError> {
        let request = PendingRequest::post(LOGOUT_PATH)
            .with_credentials()
            .without_reauth();
        let result = self.api.request(request).await;
        self.context().sign_out();

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Server logout failed, local session cleared anyway");
                Err(e)
            }
        }
    }

    /// Fetch the current profile and merge it into the session
    pub async fn profile(&self) -> Result<UserProfile, RequestError> {
        let response: ProfileResponse = self.api.request(PendingRequest::get(PROFILE_PATH)).await?.json()?;
        let profile = response.into_profile();
        debug!(user = %profile.display_name(), "Profile fetched");
        self.context().session().update_profile(profile.clone().into());
        Ok(profile)
    }

    pub async fn forget_password(&self, email: &str) -> Result<Value, RequestError> {
        let body = ForgetPasswordRequest {
            email: email.to_string(),
        };
        self.post_unauthenticated(FORGET_PASSWORD_PATH, &body).await
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<Value, RequestError> {
        let body = VerifyOtpRequest {
            email: email.to_string(),
            otp: otp.to_string(),
        };
        self.post_unauthenticated(VERIFY_OTP_PATH, &body).await
    }

    pub async fn reset_password(&self, email: &str, otp: &str, password: &str) -> Result<Value, RequestError> {
        let body = ResetPasswordRequest {
            email: email.to_string(),
            otp: otp.to_string(),
            password: password.to_string(),
        };
        self.post_unauthenticated(RESET_PASSWORD_PATH, &body).await
    }

    // ===== Data =====

    /// List users, passing `params` through as query parameters
    pub async fn fetch_users(&self, params: &[(&str, &str)]) -> Result<Value, RequestError> {
        let request = params
            .iter()
            .fold(PendingRequest::get(USERS_PATH), |req, (k, v)| req.query(*k, *v));
        Ok(self.api.request(request).await?.body)
    }

    pub async fn dashboard_stats(&self) -> Result<Value, RequestError> {
        Ok(self.api.request(PendingRequest::get(DASHBOARD_STATS_PATH)).await?.body)
    }

    /// Anonymous account-recovery call. A 401 here rejects the code or
    /// email, so it is returned as-is without a refresh.
    async fn post_unauthenticated<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<Value, RequestError> {
        let request = PendingRequest::post(path).with_body(body)?.without_reauth();
        Ok(self.api.request(request).await?.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{test_base, test_context, Scripted, ScriptedTransport};
    use crate::auth::MemorySessionStorage;
    use reqwest::Method;
    use serde_json::json;

    fn client(transport: &ScriptedTransport) -> (ApiClient, MemorySessionStorage) {
        let (ctx, storage) = test_context();
        let client = ApiClient::with_transport(Arc::new(transport.clone()), test_base(), ctx);
        (client, storage)
    }

    fn login_ok() -> Scripted {
        Scripted::Respond(
            200,
            json!({
                "accessToken": "t1",
                "user": {"id": 3, "name": "Ada", "email": "ada@example.com", "role": "admin"}
            }),
        )
    }

    #[tokio::test]
    async fn test_login_establishes_session_and_token() {
        let transport = ScriptedTransport::new();
        transport.push(Method::POST, "auth/signin", login_ok());
        let (client, storage) = client(&transport);

        let user = client.login("ada@example.com", "hunter2").await.expect("login");
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert_eq!(client.context().tokens().get(), Some(Credential::new("t1")));

        let session = client.context().session().snapshot();
        assert!(session.is_logged_in);
        assert_eq!(session.role.as_deref(), Some("admin"));

        let call = &transport.calls()[0];
        assert!(call.include_credentials);
        assert_eq!(
            call.body,
            Some(json!({"email": "ada@example.com", "password": "hunter2"}))
        );

        let record = storage.contents().expect("session persisted");
        assert!(!record.contains("accessToken"));
        assert!(!record.contains("\"t1\""));
        assert!(!record.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_login_with_string_user_id() {
        let transport = ScriptedTransport::new();
        transport.push(
            Method::POST,
            "auth/signin",
            Scripted::Respond(
                200,
                json!({
                    "accessToken": "t1",
                    "user": {"id": "65f1c0ffee", "name": "Ada", "role": "admin"}
                }),
            ),
        );
        let (client, _storage) = client(&transport);

        let user = client.login("ada@example.com", "hunter2").await.expect("login");
        assert_eq!(user.id, Some(json!("65f1c0ffee")));
        assert_eq!(client.context().tokens().get(), Some(Credential::new("t1")));

        let session = client.context().session().snapshot();
        assert!(session.is_logged_in);
        assert_eq!(session.role.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_login_without_token_fails() {
        let transport = ScriptedTransport::new();
        transport.push(Method::POST, "auth/signin", Scripted::Respond(200, json!({"user": {}})));
        let (client, _storage) = client(&transport);

        let err = client.login("ada@example.com", "x").await.unwrap_err();
        assert!(matches!(err, RequestError::Decode(_)));
        assert!(!client.context().session().is_logged_in());
    }

    #[tokio::test]
    async fn test_bad_password_does_not_refresh() {
        let transport = ScriptedTransport::new();
        transport.push(Method::POST, "auth/signin", Scripted::Respond(401, json!({})));
        let (client, _storage) = client(&transport);

        let err = client.login("ada@example.com", "wrong").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(transport.calls_to("auth/refresh").is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_local_state_even_on_server_error() {
        let transport = ScriptedTransport::new();
        transport
            .push(Method::POST, "auth/signin", login_ok())
            .push(Method::POST, "auth/logout", Scripted::Respond(500, json!({})));
        let (client, _storage) = client(&transport);
        client.login("ada@example.com", "hunter2").await.expect("login");

        let err = client.logout().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(client.context().tokens().get().is_none());
        assert!(!client.context().session().is_logged_in());
    }

    #[tokio::test]
    async fn test_profile_merges_into_session() {
        let transport = ScriptedTransport::new();
        transport
            .push(Method::POST, "auth/signin", login_ok())
            .push(
                Method::GET,
                "auth/me",
                Scripted::Respond(200, json!({"user": {"name": "Ada Lovelace", "team": "core"}})),
            );
        let (client, _storage) = client(&transport);
        client.login("ada@example.com", "hunter2").await.expect("login");

        client.profile().await.expect("profile");
        let user = client.context().session().snapshot().user.expect("user");
        assert_eq!(user.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.extra.get("team"), Some(&json!("core")));
    }

    #[tokio::test]
    async fn test_fetch_users_passes_query() {
        let transport = ScriptedTransport::new();
        transport.push(Method::GET, "user/get", Scripted::Respond(200, json!([{"id": 1}])));
        let (client, _storage) = client(&transport);

        let users = client
            .fetch_users(&[("page", "2"), ("limit", "10")])
            .await
            .expect("users");
        assert_eq!(users, json!([{"id": 1}]));
        assert_eq!(
            transport.calls()[0].query,
            vec![("page".to_string(), "2".to_string()), ("limit".to_string(), "10".to_string())]
        );
    }

    #[tokio::test]
    async fn test_explicit_refresh_failure_maps_error() {
        let transport = ScriptedTransport::new();
        transport.push(Method::POST, "auth/refresh", Scripted::Respond(200, json!({})));
        let (client, _storage) = client(&transport);

        let err = client.refresh().await.unwrap_err();
        assert!(matches!(err, RequestError::Decode(_)));
    }

    #[tokio::test]
    async fn test_rejected_otp_does_not_expire_session() {
        let transport = ScriptedTransport::new();
        transport
            .push(Method::POST, "auth/signin", login_ok())
            .push(Method::POST, "auth/verify-otp", Scripted::Respond(401, json!({"message": "bad code"})));
        let (client, _storage) = client(&transport);
        client.login("ada@example.com", "hunter2").await.expect("login");
        let mut events = client.context().events();

        let err = client.verify_otp("ada@example.com", "000000").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(transport.calls_to("auth/refresh").is_empty());
        assert!(client.context().session().is_logged_in());
        assert_eq!(client.context().tokens().get(), Some(Credential::new("t1")));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_password_reset_flow_bodies() {
        let transport = ScriptedTransport::new();
        transport
            .push(Method::POST, "auth/forget-password", Scripted::Respond(200, json!({"sent": true})))
            .push(Method::POST, "auth/verify-otp", Scripted::Respond(200, json!({"valid": true})))
            .push(Method::POST, "auth/reset-password", Scripted::Respond(200, json!({})));
        let (client, _storage) = client(&transport);

        client.forget_password("ada@example.com").await.expect("forget");
        client.verify_otp("ada@example.com", "123456").await.expect("verify");
        client
            .reset_password("ada@example.com", "123456", "n3w")
            .await
            .expect("reset");

        let bodies: Vec<Value> = transport.calls().into_iter().filter_map(|c| c.body).collect();
        assert_eq!(bodies[1], json!({"email": "ada@example.com", "otp": "123456"}));
        assert_eq!(
            bodies[2],
            json!({"email": "ada@example.com", "otp": "123456", "password": "n3w"})
        );
    }
}
