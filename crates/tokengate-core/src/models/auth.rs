use serde::{Deserialize, Serialize};

use super::UserProfile;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgetPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub password: String,
}

/// Body of a successful sign-in
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "accessToken", default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// `auth/me` answers either `{ "user": {...} }` or the bare profile
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProfileResponse {
    Wrapped { user: UserProfile },
    Bare(UserProfile),
}

impl ProfileResponse {
    pub fn into_profile(self) -> UserProfile {
        match self {
            ProfileResponse::Wrapped { user } => user,
            ProfileResponse::Bare(user) => user,
        }
    }
}
