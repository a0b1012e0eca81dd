use axum::{
    extract::{FromRef, State},
    routing::{delete, get, post},
    Json, Router,
};
use rand::Rng;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        extractors::AuthUser,
        jwt::{SessionLength, TokenKeys},
        password::{hash_password, verify_password},
    },
    error::ApiError,
    state::AppState,
    users::{
        dto::{
            CreateUserRequest, DeleteUserRequest, LoginRequest, LoginResponse, MessageResponse,
            UpdateUserRequest,
        },
        repo_types::{NewUser, OnboardingAnswers, User},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/createUser", post(create_user))
        .route("/login", post(login))
        .route("/deleteUser", delete(delete_user))
        .route("/updateUser", post(update_user))
        .route("/submitOnboardingAnswers", post(submit_onboarding_answers))
        .route("/getUser", get(get_user))
}

/// Shared credential check for login and deleteUser: unknown email is 404,
/// wrong password is 401, an unreadable stored hash is 500.
async fn verify_credentials(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<User, ApiError> {
    let user = state
        .store
        .find_user_by_email(email)
        .await?
        .ok_or(ApiError::NotFound("no user with this email"))?;
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "incorrect password");
        return Err(ApiError::Unauthenticated("incorrect password"));
    }
    Ok(user)
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(mut payload): Json<CreateUserRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Check-then-insert: not atomic, two concurrent signups for one email can
    // both pass. Lookups surface the resulting duplicates as errors.
    if state
        .store
        .find_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, "signup with an existing email");
        return Err(ApiError::Conflict("email already exists"));
    }

    let password_hash = hash_password(&payload.password)?;
    // ThreadRng is !Send; drop it before the await so the handler future is Send.
    let color = rand::thread_rng().gen_range(1..=7);
    let user = state
        .store
        .insert_user(NewUser {
            full_name: payload.full_name,
            username: payload.username,
            email: payload.email,
            password_hash,
            color,
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(Json(MessageResponse {
        message: "New User Created",
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = verify_credentials(&state, &payload.email, &payload.password).await?;

    let length = if payload.keep_me_signed_in {
        SessionLength::Extended
    } else {
        SessionLength::Short
    };
    let token = TokenKeys::from_ref(&state).sign_session(user.id, &user.email, length)?;

    info!(user_id = %user.id, "login successful");
    Ok(Json(LoginResponse {
        message: "Login Successful",
        token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn delete_user(
    State(state): State<AppState>,
    Json(mut payload): Json<DeleteUserRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = verify_credentials(&state, &payload.email, &payload.password).await?;
    state.store.delete_user(user.id).await?;

    info!(user_id = %user.id, "user deleted");
    Ok(Json(MessageResponse {
        message: "User Deleted",
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // The caller may keep their own email; only someone else's is a conflict.
    if let Some(existing) = state.store.find_user_by_email(&payload.email).await? {
        if existing.id != auth.user_id {
            warn!(user_id = %auth.user_id, "update to an email taken by another user");
            return Err(ApiError::Conflict("email taken by another user"));
        }
    }

    state
        .store
        .update_profile(auth.user_id, &payload.full_name, &payload.email, payload.color)
        .await?;

    info!(user_id = %auth.user_id, "user updated");
    Ok(Json(MessageResponse {
        message: "User Updated",
    }))
}

#[instrument(skip(state, payload))]
pub async fn submit_onboarding_answers(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<OnboardingAnswers>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.apply_onboarding(auth.user_id, &payload).await?;

    info!(user_id = %auth.user_id, "onboarding answers saved");
    Ok(Json(MessageResponse {
        message: "Onboarding Complete",
    }))
}

/// The token only proves a past login; the record may be gone by now, which is
/// a 404 here, not an auth failure.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<User>, ApiError> {
    let user = state
        .store
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or(ApiError::NotFound("user not found"))?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn signup(state: &AppState, email: &str, password: &str) {
        create_user(
            State(state.clone()),
            Json(CreateUserRequest {
                full_name: "Ada Lovelace".into(),
                email: email.into(),
                password: password.into(),
                username: None,
            }),
        )
        .await
        .expect("signup should succeed");
    }

    async fn login_token(state: &AppState, email: &str, password: &str) -> String {
        let Json(res) = login(
            State(state.clone()),
            Json(LoginRequest {
                email: email.into(),
                password: password.into(),
                keep_me_signed_in: false,
            }),
        )
        .await
        .expect("login should succeed");
        res.token
    }

    async fn auth_for(state: &AppState, email: &str) -> AuthUser {
        let user = state
            .store
            .find_user_by_email(email)
            .await
            .unwrap()
            .unwrap();
        AuthUser {
            user_id: user.id,
            email: user.email,
        }
    }

    #[tokio::test]
    async fn second_signup_with_same_email_is_conflict() {
        let state = AppState::fake();
        signup(&state, "a@x.com", "pw-one-long").await;
        let err = create_user(
            State(state.clone()),
            Json(CreateUserRequest {
                full_name: "Someone Else".into(),
                email: "a@x.com".into(),
                password: "pw-two-long".into(),
                username: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn signup_fills_defaults_and_normalizes_email() {
        let state = AppState::fake();
        signup(&state, "  Mixed@Case.Com ", "a-long-password").await;
        let user = state
            .store
            .find_user_by_email("mixed@case.com")
            .await
            .unwrap()
            .expect("record stored under normalized email");
        assert_eq!(user.role, "user");
        assert!(!user.onboarding);
        assert!((1..=7).contains(&user.color));
        assert_ne!(user.password_hash, "a-long-password");
    }

    #[tokio::test]
    async fn login_token_carries_the_callers_identity() {
        let state = AppState::fake();
        signup(&state, "a@x.com", "a-long-password").await;
        let token = login_token(&state, "a@x.com", "a-long-password").await;

        let claims = TokenKeys::from_ref(&state).verify(&token).unwrap();
        let user = state
            .store
            .find_user_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "a@x.com");
    }

    #[tokio::test]
    async fn login_failures_distinguish_unknown_email_from_bad_password() {
        let state = AppState::fake();
        signup(&state, "a@x.com", "a-long-password").await;

        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "nobody@x.com".into(),
                password: "whatever".into(),
                keep_me_signed_in: false,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "a@x.com".into(),
                password: "not-the-password".into(),
                keep_me_signed_in: false,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn keep_me_signed_in_issues_a_longer_session() {
        let state = AppState::fake();
        signup(&state, "a@x.com", "a-long-password").await;
        let keys = TokenKeys::from_ref(&state);

        let short = login_token(&state, "a@x.com", "a-long-password").await;
        let Json(res) = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "a@x.com".into(),
                password: "a-long-password".into(),
                keep_me_signed_in: true,
            }),
        )
        .await
        .unwrap();
        assert!(keys.verify(&res.token).unwrap().exp > keys.verify(&short).unwrap().exp);
    }

    #[tokio::test]
    async fn delete_then_login_is_not_found() {
        let state = AppState::fake();
        signup(&state, "a@x.com", "a-long-password").await;

        delete_user(
            State(state.clone()),
            Json(DeleteUserRequest {
                email: "a@x.com".into(),
                password: "a-long-password".into(),
            }),
        )
        .await
        .unwrap();

        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "a@x.com".into(),
                password: "a-long-password".into(),
                keep_me_signed_in: false,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_with_wrong_password_keeps_the_record() {
        let state = AppState::fake();
        signup(&state, "a@x.com", "a-long-password").await;

        let err = delete_user(
            State(state.clone()),
            Json(DeleteUserRequest {
                email: "a@x.com".into(),
                password: "not-the-password".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));
        assert!(state
            .store
            .find_user_by_email("a@x.com")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn update_to_someone_elses_email_is_conflict_without_mutation() {
        let state = AppState::fake();
        signup(&state, "a@x.com", "a-long-password").await;
        signup(&state, "b@x.com", "b-long-password").await;
        let auth = auth_for(&state, "a@x.com").await;
        let before = state
            .store
            .find_user_by_id(auth.user_id)
            .await
            .unwrap()
            .unwrap();

        let err = update_user(
            State(state.clone()),
            auth_for(&state, "a@x.com").await,
            Json(UpdateUserRequest {
                full_name: "A. Renamed".into(),
                email: "b@x.com".into(),
                color: 2,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let after = state
            .store
            .find_user_by_id(before.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.email, before.email);
        assert_eq!(after.full_name, before.full_name);
        assert_eq!(after.color, before.color);
    }

    #[tokio::test]
    async fn update_overwrites_all_three_fields_and_allows_keeping_own_email() {
        let state = AppState::fake();
        signup(&state, "a@x.com", "a-long-password").await;
        let auth = auth_for(&state, "a@x.com").await;

        update_user(
            State(state.clone()),
            AuthUser {
                user_id: auth.user_id,
                email: auth.email,
            },
            Json(UpdateUserRequest {
                full_name: "Ada K. Lovelace".into(),
                email: "a@x.com".into(),
                color: 5,
            }),
        )
        .await
        .unwrap();

        let user = state
            .store
            .find_user_by_id(auth_for(&state, "a@x.com").await.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.full_name, "Ada K. Lovelace");
        assert_eq!(user.color, 5);
    }

    #[tokio::test]
    async fn onboarding_merges_answers_and_sets_the_flag() {
        let state = AppState::fake();
        signup(&state, "a@x.com", "a-long-password").await;
        let auth = auth_for(&state, "a@x.com").await;

        submit_onboarding_answers(
            State(state.clone()),
            AuthUser {
                user_id: auth.user_id,
                email: auth.email.clone(),
            },
            Json(OnboardingAnswers {
                user_type: Some("founder".into()),
                gender: Some("female".into()),
                date_of_birth: Some("1815-12-10".into()),
                phone_number: None,
                organization_name: Some("Analytical Engines Ltd".into()),
                organization_size: Some("1-10".into()),
                project_type: Some("research".into()),
            }),
        )
        .await
        .unwrap();

        let user = state
            .store
            .find_user_by_id(auth.user_id)
            .await
            .unwrap()
            .unwrap();
        assert!(user.onboarding);
        assert_eq!(user.user_type.as_deref(), Some("founder"));
        assert_eq!(user.organization_name.as_deref(), Some("Analytical Engines Ltd"));
    }

    #[tokio::test]
    async fn get_user_never_exposes_the_password_hash() {
        let state = AppState::fake();
        signup(&state, "a@x.com", "a-long-password").await;
        let auth = auth_for(&state, "a@x.com").await;

        let Json(user) = get_user(State(state.clone()), auth).await.unwrap();
        let body = serde_json::to_value(&user).unwrap();
        assert!(body.get("passwordHash").is_none());
        assert!(body.get("password_hash").is_none());
        assert_eq!(body["email"], "a@x.com");
    }

    #[tokio::test]
    async fn get_user_with_a_stale_token_is_not_found_not_forbidden() {
        let state = AppState::fake();
        signup(&state, "a@x.com", "a-long-password").await;
        let auth = auth_for(&state, "a@x.com").await;

        // Record deleted after token issuance; the token is still valid.
        delete_user(
            State(state.clone()),
            Json(DeleteUserRequest {
                email: "a@x.com".into(),
                password: "a-long-password".into(),
            }),
        )
        .await
        .unwrap();

        let err = get_user(State(state.clone()), auth).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
