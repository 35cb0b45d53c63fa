//! Data models shared by the session store and the service endpoints.
//!
//! - `UserProfile`, `ProfileUpdate`: the signed-in user and partial updates
//! - Request/response bodies for the auth endpoints

pub mod auth;
pub mod user;

pub use auth::{
    ForgetPasswordRequest, LoginRequest, LoginResponse, ProfileResponse, RegisterRequest,
    ResetPasswordRequest, VerifyOtpRequest,
};
pub use user::{ProfileUpdate, UserProfile};
