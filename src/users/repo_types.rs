use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record as stored. Serialized for getUser responses, which is why the
/// password hash is skipped rather than filtered per call site.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub username: Option<String>,
    pub role: String,
    /// Avatar color, 1..=7, random at signup.
    pub color: i16,
    pub onboarding: bool,
    pub user_type: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub phone_number: Option<String>,
    pub organization_name: Option<String>,
    pub organization_size: Option<String>,
    pub project_type: Option<String>,
    pub notifications: serde_json::Value,
    pub projects: serde_json::Value,
    pub docs: serde_json::Value,
    pub created_at: OffsetDateTime,
}

/// Fields the signup handler decides; the store assigns the id and fills the
/// remaining defaults (role "user", onboarding false, empty sequences).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub username: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub color: i16,
    pub created_at: OffsetDateTime,
}

/// One-time profile answers merged into the record by submitOnboardingAnswers.
/// Field shapes are not validated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingAnswers {
    pub user_type: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub phone_number: Option<String>,
    pub organization_name: Option<String>,
    pub organization_size: Option<String>,
    pub project_type: Option<String>,
}
