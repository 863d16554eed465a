use chrono::{NaiveDateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub security_question: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub security_question: Option<String>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id.unwrap_or_default(),
            username: user.username.unwrap_or_default(),
            security_question: user.security_question.unwrap_or_default(),
        }
    }
}

/// Server-side session record. The browser only ever sees `token`.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserSession {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub token: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
}

impl From<DbUserSession> for UserSession {
    fn from(session: DbUserSession) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: session.id.unwrap_or_default(),
            user_id: session.user_id.unwrap_or_default(),
            username: session.username.unwrap_or_default(),
            token: session.token.unwrap_or_default(),
            created_at: session.created_at.unwrap_or(now),
            // A row without an expiry is treated as already expired.
            expires_at: session.expires_at.unwrap_or(now),
        }
    }
}

impl UserSession {
    pub fn generate_token() -> String {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        format!("{}{}", Uuid::new_v4().simple(), suffix)
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }
}

/// How long an answered security question keeps the reset form open.
pub const RESET_WINDOW_MINUTES: i64 = 10;

/// Payload of the encrypted reset cookie. `fingerprint` is the tail of the
/// password hash when the grant was issued, so the grant stops matching as
/// soon as the password changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResetGrant {
    pub user_id: i64,
    pub issued_at: i64,
    pub fingerprint: String,
}

impl ResetGrant {
    pub fn issue(user_id: i64, password_hash: &str) -> Self {
        Self {
            user_id,
            issued_at: Utc::now().timestamp(),
            fingerprint: hash_fingerprint(password_hash).to_string(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}:{}:{}", self.user_id, self.issued_at, self.fingerprint)
    }

    pub fn decode(value: &str) -> Option<Self> {
        let mut parts = value.splitn(3, ':');
        let user_id = parts.next()?.parse().ok()?;
        let issued_at = parts.next()?.parse().ok()?;
        let fingerprint = parts.next().filter(|f| !f.is_empty())?.to_string();

        Some(Self {
            user_id,
            issued_at,
            fingerprint,
        })
    }

    pub fn is_fresh(&self, now: i64) -> bool {
        (0..=RESET_WINDOW_MINUTES * 60).contains(&(now - self.issued_at))
    }

    pub fn matches(&self, password_hash: &str) -> bool {
        self.fingerprint == hash_fingerprint(password_hash)
    }
}

fn hash_fingerprint(password_hash: &str) -> &str {
    let start = password_hash.len().saturating_sub(16);
    password_hash.get(start..).unwrap_or(password_hash)
}
