use time::{macros::format_description, Date};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        password::PasswordHasher,
        services::{check_len, is_valid_email},
    },
    config::SuperuserConfig,
    errors::{ApiError, AuthError, ValidationError},
    users::{
        dto::{Pagination, UpdateUserRequest},
        repo::{CredentialStore, StoreError},
        repo_types::{
            NewUser, PublicUser, User, UserChanges, GENDER_CHOICES, NAME_MAX_LEN, PHONE_MAX_LEN,
            ROLE_CHOICES,
        },
    },
};

/// Resolves the token subject to a live user.
pub async fn caller(store: &dyn CredentialStore, user_id: Uuid) -> Result<User, ApiError> {
    store.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(%user_id, "token subject no longer exists");
        AuthError::InvalidToken.into()
    })
}

pub async fn list(store: &dyn CredentialStore, page: &Pagination) -> Result<Vec<PublicUser>, ApiError> {
    let (limit, offset) = page.clamped();
    let users = store.list(limit, offset).await?;
    Ok(users.into_iter().map(PublicUser::from).collect())
}

pub async fn get(store: &dyn CredentialStore, id: Uuid) -> Result<PublicUser, ApiError> {
    let user = store.find_by_id(id).await?.ok_or(ApiError::NotFound)?;
    Ok(PublicUser::from(user))
}

fn ensure_can_manage(actor: &User, target: Uuid) -> Result<(), ApiError> {
    if actor.id == target || actor.is_admin() {
        return Ok(());
    }
    warn!(actor = %actor.id, %target, "forbidden user management");
    Err(AuthError::Forbidden.into())
}

fn non_blank(field: &'static str, v: String, max: usize) -> Result<String, ValidationError> {
    let v = v.trim().to_owned();
    if v.is_empty() {
        return Err(ValidationError::InvalidValue(field));
    }
    check_len(field, &v, max)?;
    Ok(v)
}

fn one_of(field: &'static str, v: String, choices: &[&str]) -> Result<String, ValidationError> {
    if choices.contains(&v.as_str()) {
        Ok(v)
    } else {
        Err(ValidationError::InvalidValue(field))
    }
}

fn picture_url(v: String) -> Result<String, ValidationError> {
    let v = v.trim().to_owned();
    let rest = v
        .strip_prefix("https://")
        .or_else(|| v.strip_prefix("http://"))
        .unwrap_or_default();
    if rest.is_empty() || rest.contains(char::is_whitespace) {
        return Err(ValidationError::InvalidValue("profile_picture"));
    }
    Ok(v)
}

/// Validates an update body into store-level changes.
pub fn changes_from(req: UpdateUserRequest) -> Result<UserChanges, ValidationError> {
    let email = match req.email {
        Some(e) => {
            let e = e.trim().to_owned();
            if !is_valid_email(&e) {
                return Err(ValidationError::InvalidEmail);
            }
            Some(e)
        }
        None => None,
    };
    let date_of_birth = req
        .date_of_birth
        .map(|d| {
            Date::parse(d.trim(), format_description!("[year]-[month]-[day]"))
                .map_err(|_| ValidationError::InvalidValue("date_of_birth"))
        })
        .transpose()?;
    let phone_number = req
        .phone_number
        .map(|p| non_blank("phone_number", p, PHONE_MAX_LEN))
        .transpose()?;

    Ok(UserChanges {
        email,
        first_name: req
            .first_name
            .map(|v| non_blank("first_name", v, NAME_MAX_LEN))
            .transpose()?,
        last_name: req
            .last_name
            .map(|v| non_blank("last_name", v, NAME_MAX_LEN))
            .transpose()?,
        phone_number,
        profile_picture: req.profile_picture.map(picture_url).transpose()?,
        date_of_birth,
        gender: req
            .gender
            .map(|v| one_of("gender", v, GENDER_CHOICES))
            .transpose()?,
        role: req
            .role
            .map(|v| one_of("role", v, ROLE_CHOICES))
            .transpose()?,
        is_active: req.is_active,
        is_staff: req.is_staff,
        is_superuser: req.is_superuser,
    })
}

pub async fn update(
    store: &dyn CredentialStore,
    actor: &User,
    id: Uuid,
    req: UpdateUserRequest,
) -> Result<PublicUser, ApiError> {
    ensure_can_manage(actor, id)?;
    let changes = changes_from(req)?;
    if changes.touches_flags() && !actor.is_admin() {
        warn!(actor = %actor.id, "non-staff tried to change flags");
        return Err(AuthError::Forbidden.into());
    }
    if changes.is_empty() {
        return get(store, id).await;
    }
    let user = store.update(id, changes).await?;
    info!(user_id = %user.id, actor = %actor.id, "user updated");
    Ok(PublicUser::from(user))
}

pub async fn delete(store: &dyn CredentialStore, actor: &User, id: Uuid) -> Result<(), ApiError> {
    ensure_can_manage(actor, id)?;
    store.soft_delete(id).await?;
    info!(user_id = %id, actor = %actor.id, "user soft-deleted");
    Ok(())
}

/// Creates the configured staff account unless its email is already taken.
pub async fn ensure_superuser(
    store: &dyn CredentialStore,
    hasher: &dyn PasswordHasher,
    cfg: &SuperuserConfig,
) -> anyhow::Result<()> {
    let email = cfg.email.trim();
    if !is_valid_email(email) {
        anyhow::bail!("SUPERUSER_EMAIL `{}` is not a valid email address", cfg.email);
    }
    if store.find_by_email(email).await?.is_some() {
        info!(%email, "superuser already present");
        return Ok(());
    }
    let password_hash = hasher.hash(&cfg.password)?;
    match store
        .create(NewUser {
            email: email.to_owned(),
            password_hash,
            first_name: "Admin".into(),
            last_name: "User".into(),
            is_active: true,
            is_staff: true,
            is_superuser: true,
        })
        .await
    {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, "superuser created");
            Ok(())
        }
        // another instance won the race
        Err(StoreError::DuplicateEmail) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
