use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::repo_types::{NewUser, OnboardingAnswers, User};

/// Operations the handlers need from the document store. Email lookups return
/// zero or one record; more than one match is an invariant violation and is
/// surfaced as an error instead of silently taking the first.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Inserts the record and returns it with the store-assigned id set.
    async fn insert_user(&self, new: NewUser) -> anyhow::Result<User>;
    /// Overwrites full_name, email and color on one record, whether or not
    /// they actually changed.
    async fn update_profile(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
        color: i16,
    ) -> anyhow::Result<()>;
    /// Merges the answers into the record and marks onboarding complete.
    async fn apply_onboarding(&self, id: Uuid, answers: &OnboardingAnswers) -> anyhow::Result<()>;
    async fn delete_user(&self, id: Uuid) -> anyhow::Result<()>;
    async fn insert_product(&self, data: serde_json::Value) -> anyhow::Result<Uuid>;
}

const USER_COLUMNS: &str = "id, email, password_hash, full_name, username, role, color, onboarding, \
     user_type, gender, date_of_birth, phone_number, organization_name, \
     organization_size, project_type, notifications, projects, docs, created_at";

/// Postgres-backed store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        // fetch_all instead of fetch_optional: email has no unique constraint
        // (signup check-then-insert races), so duplicates must be surfaced.
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        match rows.len() {
            0 | 1 => Ok(rows.into_iter().next()),
            n => anyhow::bail!("{n} user records share the email {email}"),
        }
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, new: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (full_name, username, email, password_hash, color, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.full_name)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.color)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
        color: i16,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET full_name = $2, email = $3, color = $4 WHERE id = $1")
            .bind(id)
            .bind(full_name)
            .bind(email)
            .bind(color)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn apply_onboarding(&self, id: Uuid, answers: &OnboardingAnswers) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET user_type = $2, gender = $3, date_of_birth = $4, \
             phone_number = $5, organization_name = $6, organization_size = $7, \
             project_type = $8, onboarding = TRUE WHERE id = $1",
        )
        .bind(id)
        .bind(&answers.user_type)
        .bind(&answers.gender)
        .bind(&answers.date_of_birth)
        .bind(&answers.phone_number)
        .bind(&answers.organization_name)
        .bind(&answers.organization_size)
        .bind(&answers.project_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_product(&self, data: serde_json::Value) -> anyhow::Result<Uuid> {
        let id: Uuid =
            sqlx::query_scalar("INSERT INTO products (data) VALUES ($1) RETURNING id")
                .bind(data)
                .fetch_one(&self.pool)
                .await?;
        Ok(id)
    }
}

/// In-memory store for tests, the counterpart of `AppState::fake()`. Kept as a
/// plain Vec so the duplicate-email race stays representable.
#[derive(Default)]
pub struct MemStore {
    users: Mutex<Vec<User>>,
    products: Mutex<Vec<(Uuid, serde_json::Value)>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn product_count(&self) -> usize {
        self.products.lock().await.len()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().await;
        let mut matches = users.iter().filter(|u| u.email == email);
        let first = matches.next().cloned();
        if matches.next().is_some() {
            anyhow::bail!("multiple user records share the email {email}");
        }
        Ok(first)
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.lock().await.iter().find(|u| u.id == id).cloned())
    }

    async fn insert_user(&self, new: NewUser) -> anyhow::Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            username: new.username,
            role: "user".to_string(),
            color: new.color,
            onboarding: false,
            user_type: None,
            gender: None,
            date_of_birth: None,
            phone_number: None,
            organization_name: None,
            organization_size: None,
            project_type: None,
            notifications: serde_json::json!([]),
            projects: serde_json::json!([]),
            docs: serde_json::json!([]),
            created_at: new.created_at,
        };
        self.users.lock().await.push(user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
        color: i16,
    ) -> anyhow::Result<()> {
        let mut users = self.users.lock().await;
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.full_name = full_name.to_string();
            user.email = email.to_string();
            user.color = color;
        }
        Ok(())
    }

    async fn apply_onboarding(&self, id: Uuid, answers: &OnboardingAnswers) -> anyhow::Result<()> {
        let mut users = self.users.lock().await;
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.user_type = answers.user_type.clone();
            user.gender = answers.gender.clone();
            user.date_of_birth = answers.date_of_birth.clone();
            user.phone_number = answers.phone_number.clone();
            user.organization_name = answers.organization_name.clone();
            user.organization_size = answers.organization_size.clone();
            user.project_type = answers.project_type.clone();
            user.onboarding = true;
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> anyhow::Result<()> {
        self.users.lock().await.retain(|u| u.id != id);
        Ok(())
    }

    async fn insert_product(&self, data: serde_json::Value) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        self.products.lock().await.push((id, data));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            full_name: "Test User".into(),
            username: None,
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
            color: 3,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_defaults() {
        let store = MemStore::new();
        let user = store.insert_user(new_user("a@x.com")).await.unwrap();
        assert_eq!(user.role, "user");
        assert!(!user.onboarding);
        assert_eq!(user.notifications, serde_json::json!([]));
        let found = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.email, "a@x.com");
    }

    #[tokio::test]
    async fn duplicate_emails_surface_as_error() {
        let store = MemStore::new();
        // The signup race can leave two records behind; lookups must not
        // silently pick one.
        store.insert_user(new_user("dup@x.com")).await.unwrap();
        store.insert_user(new_user("dup@x.com")).await.unwrap();
        let err = store.find_user_by_email("dup@x.com").await.unwrap_err();
        assert!(err.to_string().contains("dup@x.com"));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = MemStore::new();
        let user = store.insert_user(new_user("gone@x.com")).await.unwrap();
        store.delete_user(user.id).await.unwrap();
        assert!(store.find_user_by_id(user.id).await.unwrap().is_none());
        assert!(store
            .find_user_by_email("gone@x.com")
            .await
            .unwrap()
            .is_none());
    }
}
