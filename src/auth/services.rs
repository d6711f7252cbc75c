use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use super::{
    dto::{AuthResponse, PublicUser, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password, verify_password, DUMMY_HASH},
    repo::{User, UserRepo},
};
use crate::error::{AppError, AppResult};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 100;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[instrument(skip(users, req), fields(email = %req.email))]
pub async fn register(users: &dyn UserRepo, req: RegisterRequest) -> AppResult<User> {
    let name = req.name.trim();
    let email = normalize_email(&req.email);

    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation("Invalid name"));
    }
    if !is_valid_email(&email) {
        warn!("invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::validation("Password too short"));
    }

    if users.find_by_email(&email).await?.is_some() {
        warn!("email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&req.password)?;
    let user = users.create(name, &email, &hash).await?;
    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Resolves credentials to a user. Unknown email, wrong password and an
/// unreadable stored hash all surface as the same `InvalidCredentials`.
#[instrument(skip(users, email, password))]
pub async fn authenticate(users: &dyn UserRepo, email: &str, password: &str) -> AppResult<User> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }

    let Some(user) = users.find_by_email(&email).await? else {
        let _ = verify_password(password, DUMMY_HASH);
        warn!("login failed: unknown email");
        return Err(AppError::InvalidCredentials);
    };

    match verify_password(password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            warn!(user_id = %user.id, "login failed: password mismatch");
            return Err(AppError::InvalidCredentials);
        }
        Err(e) => {
            error!(error = %e, user_id = %user.id, "stored password hash unreadable");
            return Err(AppError::InvalidCredentials);
        }
    }

    if let Err(e) = users.touch_last_login(user.id).await {
        warn!(error = %e, user_id = %user.id, "could not record last login");
    }

    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

pub fn issue_tokens(keys: &JwtKeys, user: User) -> AppResult<AuthResponse> {
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: keys.access_ttl.as_secs(),
        user: PublicUser::from(user),
    })
}
