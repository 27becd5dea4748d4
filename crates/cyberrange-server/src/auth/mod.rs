//! Accounts, authentication and authorization
//!
//! JWT-based authentication with Argon2 password hashing and role-based
//! access control. Accounts live in the same sqlite database as the catalog
//! and the session registry; session rows reference users by id.

pub mod middleware;
pub mod models;

pub use middleware::{extract_token, require_auth, require_role, AuthKeys, TOKEN_COOKIE};
pub use models::{Claims, LoginForm, RegisterForm, Role, User, UserInfo};

use crate::error::{WebError, WebResult};
use sqlx::SqlitePool;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::{
        password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
        Argon2,
    };

    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Initialize the user database schema
pub async fn init_user_db(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY NOT NULL,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('student', 'instructor', 'admin')),
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("User database schema initialized");
    Ok(())
}

async fn insert_user(pool: &SqlitePool, user: &User) -> WebResult<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (id, username, email, password_hash, role, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.role)
    .bind(user.created_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(WebError::Conflict(
            "Username or email already registered".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Create the bootstrap admin account when no users exist.
///
/// Without a configured password a random one is generated and logged once.
pub async fn ensure_bootstrap_admin(pool: &SqlitePool, password: Option<&str>) -> WebResult<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if count.0 > 0 {
        return Ok(());
    }

    let generated;
    let password = match password {
        Some(p) if !p.is_empty() => p,
        _ => {
            generated = uuid::Uuid::new_v4().simple().to_string();
            tracing::warn!(
                "Created bootstrap admin with generated password '{}' - CHANGE THIS PASSWORD!",
                generated
            );
            generated.as_str()
        }
    };

    let admin = User::new(
        "admin".to_string(),
        "admin@localhost".to_string(),
        password,
        Role::Admin,
    )?;
    insert_user(pool, &admin).await?;
    tracing::info!("Bootstrap admin account created (username: admin)");
    Ok(())
}

/// Register a student account
pub async fn register_user(pool: &SqlitePool, form: &RegisterForm) -> WebResult<User> {
    let username = form.username.trim();
    let email = form.email.trim();
    if username.is_empty() || email.is_empty() || form.password.is_empty() {
        return Err(WebError::BadRequest(
            "Username, email and password are required".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(WebError::BadRequest("Email address is invalid".to_string()));
    }

    let user = User::new(
        username.to_string(),
        email.to_string(),
        &form.password,
        Role::Student,
    )?;
    insert_user(pool, &user).await?;
    tracing::info!("Registered user {} ({})", user.username, user.id);
    Ok(user)
}

/// Create an account with an explicit role
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> WebResult<User> {
    let user = User::new(username.to_string(), email.to_string(), password, role)?;
    insert_user(pool, &user).await?;
    Ok(user)
}

/// Check credentials; unknown user and wrong password are indistinguishable
pub async fn authenticate_user(pool: &SqlitePool, login: &LoginForm) -> WebResult<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(login.username.trim())
    .fetch_optional(pool)
    .await?;

    match user {
        Some(user) if user.verify_password(&login.password) => Ok(user),
        _ => Err(WebError::Unauthorized(
            "Invalid username or password".to_string(),
        )),
    }
}

pub async fn find_user(pool: &SqlitePool, user_id: &str) -> WebResult<Option<User>> {
    Ok(sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?)
}

pub async fn list_users(pool: &SqlitePool) -> WebResult<Vec<User>> {
    Ok(sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY username",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await?)
}
