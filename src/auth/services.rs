//! Registration, login and refresh flows, written against the collaborator
//! traits only so they run the same over Postgres or the in-memory store.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RefreshRequest, RegisterRequest},
        jwt::{TokenIssuer, TokenPair},
        password::PasswordHasher,
    },
    errors::{ApiError, AuthError, ValidationError},
    users::{
        repo::CredentialStore,
        repo_types::{NewUser, PublicUser, User, NAME_MAX_LEN},
    },
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed value, or `None` when absent or blank.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Passwords are taken verbatim; only emptiness counts as missing.
fn present_secret(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub(crate) fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong(field, max));
    }
    Ok(())
}

/// Validates the request and creates an inactive user.
pub async fn register(
    store: &dyn CredentialStore,
    hasher: &dyn PasswordHasher,
    payload: RegisterRequest,
) -> Result<PublicUser, ApiError> {
    let first_name = present(payload.first_name);
    let last_name = present(payload.last_name);
    let email = present(payload.email);
    let password = present_secret(payload.password);

    let missing: Vec<&'static str> = [
        ("first_name", first_name.is_none()),
        ("last_name", last_name.is_none()),
        ("email", email.is_none()),
        ("password", password.is_none()),
    ]
    .into_iter()
    .filter_map(|(name, absent)| absent.then_some(name))
    .collect();

    let (Some(first_name), Some(last_name), Some(email), Some(password)) =
        (first_name, last_name, email, password)
    else {
        warn!(?missing, "registration missing fields");
        return Err(ValidationError::MissingField(missing).into());
    };

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ValidationError::InvalidEmail.into());
    }
    check_len("first_name", &first_name, NAME_MAX_LEN)?;
    check_len("last_name", &last_name, NAME_MAX_LEN)?;

    let password_hash = hasher.hash(&password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::Internal(e)
    })?;

    let user = store
        .create(NewUser {
            email,
            password_hash,
            first_name,
            last_name,
            is_active: false,
            is_staff: false,
            is_superuser: false,
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "create user failed");
            ApiError::from(e)
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(PublicUser::from(user))
}

/// Checks credentials and mints a token pair.
///
/// Unknown email and wrong password both end in
/// [`AuthError::InvalidCredentials`].
pub async fn login(
    store: &dyn CredentialStore,
    hasher: &dyn PasswordHasher,
    tokens: &dyn TokenIssuer,
    payload: LoginRequest,
) -> Result<TokenPair, ApiError> {
    let email = present(payload.email);
    let password = present_secret(payload.password);

    let (email, password) = match (email, password) {
        (Some(e), Some(p)) => (e, p),
        (e, p) => {
            let mut missing = Vec::new();
            if e.is_none() {
                missing.push("email");
            }
            if p.is_none() {
                missing.push("password");
            }
            warn!(?missing, "login missing credentials");
            return Err(ValidationError::MissingCredential(missing).into());
        }
    };

    let user = match store.find_by_email(&email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials.into());
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(e.into());
        }
    };

    let ok = hasher.verify(&password, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = %user.id, "verify_password failed");
        ApiError::Internal(e)
    })?;
    if !ok {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials.into());
    }

    let pair = issue(tokens, &user)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(pair)
}

/// Rotates a refresh token into a fresh pair for a still-existing user.
pub async fn refresh(
    store: &dyn CredentialStore,
    tokens: &dyn TokenIssuer,
    payload: RefreshRequest,
) -> Result<TokenPair, ApiError> {
    let token = present(payload.refresh)
        .ok_or_else(|| ValidationError::MissingField(vec!["refresh"]))?;

    let claims = tokens.verify_refresh(&token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        AuthError::InvalidToken
    })?;

    let user = store.find_by_id(claims.sub).await?.ok_or_else(|| {
        warn!(user_id = %claims.sub, "refresh for missing user");
        AuthError::InvalidToken
    })?;

    let pair = issue(tokens, &user)?;
    info!(user_id = %user.id, "tokens refreshed");
    Ok(pair)
}

fn issue(tokens: &dyn TokenIssuer, user: &User) -> Result<TokenPair, ApiError> {
    tokens.issue(user).map_err(|e| {
        error!(error = %e, user_id = %user.id, "jwt sign failed");
        ApiError::Internal(e)
    })
}
