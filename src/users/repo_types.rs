use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

pub const NAME_MAX_LEN: usize = 50;
pub const PHONE_MAX_LEN: usize = 10;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed in JSON
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    #[serde(with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub role: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_deleted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Staff and superusers may manage other accounts.
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Everything the store needs to insert a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone_number.is_none()
            && self.profile_picture.is_none()
            && self.date_of_birth.is_none()
            && self.gender.is_none()
            && self.role.is_none()
            && self.is_active.is_none()
            && self.is_staff.is_none()
            && self.is_superuser.is_none()
    }

    /// Whether the update touches authorization flags.
    pub fn touches_flags(&self) -> bool {
        self.is_active.is_some() || self.is_staff.is_some() || self.is_superuser.is_some()
    }

    /// Applies the changes in place and bumps `updated_at`.
    pub fn apply(self, user: &mut User, now: OffsetDateTime) {
        if let Some(v) = self.email {
            user.email = v;
        }
        if let Some(v) = self.first_name {
            user.first_name = v;
        }
        if let Some(v) = self.last_name {
            user.last_name = v;
        }
        if let Some(v) = self.phone_number {
            user.phone_number = Some(v);
        }
        if let Some(v) = self.profile_picture {
            user.profile_picture = Some(v);
        }
        if let Some(v) = self.date_of_birth {
            user.date_of_birth = Some(v);
        }
        if let Some(v) = self.gender {
            user.gender = Some(v);
        }
        if let Some(v) = self.role {
            user.role = Some(v);
        }
        if let Some(v) = self.is_active {
            user.is_active = v;
        }
        if let Some(v) = self.is_staff {
            user.is_staff = v;
        }
        if let Some(v) = self.is_superuser {
            user.is_superuser = v;
        }
        user.updated_at = now;
    }
}

pub const GENDER_CHOICES: &[&str] = &["male", "female", "other"];
pub const ROLE_CHOICES: &[&str] = &["project_manager", "developer"];

/// Public projection of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    #[serde(with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub role: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            full_name: format!("{} {}", u.first_name, u.last_name),
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            phone_number: u.phone_number,
            profile_picture: u.profile_picture,
            date_of_birth: u.date_of_birth,
            gender: u.gender,
            role: u.role,
            is_active: u.is_active,
            is_staff: u.is_staff,
            is_superuser: u.is_superuser,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn sample() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone_number: None,
            profile_picture: None,
            date_of_birth: Some(date!(1990 - 04 - 02)),
            gender: None,
            role: None,
            is_active: false,
            is_staff: false,
            is_superuser: false,
            is_deleted: false,
            created_at: datetime!(2024-01-01 0:00 UTC),
            updated_at: datetime!(2024-01-01 0:00 UTC),
        }
    }

    #[test]
    fn public_user_json_has_no_password() {
        let user = sample();
        let hash = user.password_hash.clone();
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains(&hash));
        assert!(json.contains("\"full_name\":\"A B\""));
        assert!(json.contains("\"date_of_birth\":\"1990-04-02\""));
        assert!(json.contains("\"created_at\":\"2024-01-01T00:00:00Z\""));
    }

    #[test]
    fn changes_apply_only_given_fields() {
        let mut user = sample();
        let later = datetime!(2024-02-01 0:00 UTC);
        let changes = UserChanges {
            first_name: Some("Ann".into()),
            is_active: Some(true),
            ..Default::default()
        };
        assert!(changes.touches_flags());
        changes.apply(&mut user, later);
        assert_eq!(user.first_name, "Ann");
        assert_eq!(user.last_name, "B");
        assert!(user.is_active);
        assert_eq!(user.updated_at, later);
        assert!(UserChanges::default().is_empty());
    }
}
