//! Account models
//!
//! Argon2 password hashes and JWT claims with role-based access control.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Account roles, each including the permissions of the ones below it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Everything, including the unscoped overview
    Admin,
    /// Defines scenarios and may read the overview
    Instructor,
    /// Launches and ends their own sessions
    Student,
}

impl Role {
    /// Check if role has permission for an operation
    pub fn has_permission(&self, required: Role) -> bool {
        matches!(
            (self, required),
            (Role::Admin, _)
                | (Role::Instructor, Role::Instructor | Role::Student)
                | (Role::Student, Role::Student)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "instructor" => Ok(Role::Instructor),
            "student" => Ok(Role::Student),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Stored account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: i64,
}

impl User {
    /// Unknown role strings degrade to the least privileged role
    pub fn get_role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Student)
    }

    /// Create new user with hashed password
    pub fn new(
        username: String,
        email: String,
        password: &str,
        role: Role,
    ) -> Result<Self, argon2::password_hash::Error> {
        Ok(User {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash: super::hash_password(password)?,
            role: role.as_str().to_string(),
            created_at: chrono::Utc::now().timestamp(),
        })
    }

    /// Verify password against stored hash
    pub fn verify_password(&self, password: &str) -> bool {
        use argon2::{
            password_hash::{PasswordHash, PasswordVerifier},
            Argon2,
        };

        let parsed_hash = match PasswordHash::new(&self.password_hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Self-service registration always yields a student account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// JWT claims for authentication tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // user id
    pub username: String, // used in backend project names
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn new(user: &User, ttl: chrono::Duration) -> Self {
        let exp = (chrono::Utc::now() + ttl).timestamp() as usize;

        Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role.clone(),
            exp,
        }
    }

    pub fn get_role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Student)
    }

    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp() as usize;
        now >= self.exp
    }

    /// Caller identity as the core understands it
    pub fn requester(&self) -> cyberrange::Requester {
        cyberrange::Requester::new(self.sub.clone(), self.username.clone())
    }
}

/// Account data safe for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: i64,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        UserInfo {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}
