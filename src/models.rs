use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A registered account from the `users` table. `password` holds an argon2 PHC
/// string, or plaintext for rows written before hashing was introduced.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    // 'user' or 'admin'. Parsed into `Role` when the session is built.
    pub role: String,
}

impl User {
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::User)
    }
}

/// Role
///
/// Coarse authorization tag. Only `Admin` may manage posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SessionUser
///
/// The identity stored in the session after a successful login. Its presence in the
/// session is the logged-in flag; there is no separate boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role(),
        }
    }
}

/// Post
///
/// A blog post from the `posts` table.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Comment
///
/// A comment from the `comments` table. `username` is a copy of the commenter's
/// name taken from the session at write time, not a reference to `users`.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub username: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Form Bodies) ---

/// CredentialsForm
///
/// Body of `POST /register` and `POST /login`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

/// PostForm
///
/// Body of `POST /add-post` and the edit endpoints. Values are stored verbatim.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PostForm {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: String,
}

/// CommentForm
///
/// Body of `POST /post/{id}/comment`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CommentForm {
    pub comment: String,
}
