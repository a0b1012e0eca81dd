use serde::{Deserialize, Serialize};

/// Request body for POST /createUser.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Request body for POST /login.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub keep_me_signed_in: bool,
}

/// Request body for DELETE /deleteUser. Re-authentication is by credential,
/// not by bearer token.
#[derive(Debug, Deserialize)]
pub struct DeleteUserRequest {
    pub email: String,
    pub password: String,
}

/// Request body for POST /updateUser. All three fields are overwritten on the
/// caller's record, changed or not.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub full_name: String,
    pub email: String,
    pub color: i16,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Response for a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
}
