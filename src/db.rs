use crate::{
    auth::{DbUser, DbUserSession, User, UserSession},
    error::AppError,
    models::{
        join_list, DbPreference, DbRestaurant, NewPreference, Preference, Restaurant,
        RESTAURANT_COLUMNS,
    },
};
use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, security_question FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, security_question FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument(skip_all, fields(username))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    security_question: &str,
    security_answer: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    if find_user_by_username(pool, username).await?.is_some() {
        return Err(AppError::Validation(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query(
        "INSERT INTO users (username, password_hash, security_question, security_answer)
         VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(hashed_password)
    .bind(security_question.trim())
    .bind(security_answer.trim())
    .execute(pool)
    .await
    .map_err(|e| duplicate_username(e, username))?;

    Ok(res.last_insert_rowid())
}

/// A concurrent registration can slip past the lookup above; the UNIQUE
/// constraint then reports the same conflict.
pub fn duplicate_username(error: sqlx::Error, username: &str) -> AppError {
    let unique = error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());

    if unique {
        AppError::Validation(format!("Username '{}' already exists", username))
    } else {
        AppError::from(error)
    }
}

#[instrument(skip(pool))]
pub async fn get_password_hash(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Option<String>, AppError> {
    let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(hash)
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");

    #[derive(sqlx::FromRow)]
    struct Credentials {
        id: i64,
        username: String,
        security_question: String,
        password_hash: String,
    }

    let row = sqlx::query_as::<_, Credentials>(
        "SELECT id, username, security_question, password_hash FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(creds) => match bcrypt::verify(password, &creds.password_hash) {
            Ok(true) => Ok(Some(User {
                id: creds.id,
                username: creds.username,
                security_question: creds.security_question,
            })),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Checks the stored security question and answer for `username`. Both are
/// compared trimmed and case-insensitively.
#[instrument(skip_all, fields(username))]
pub async fn verify_security_answer(
    pool: &Pool<Sqlite>,
    username: &str,
    question: &str,
    answer: &str,
) -> Result<Option<User>, AppError> {
    info!("Verifying security answer");

    #[derive(sqlx::FromRow)]
    struct Recovery {
        id: i64,
        username: String,
        security_question: String,
        security_answer: String,
    }

    let row = sqlx::query_as::<_, Recovery>(
        "SELECT id, username, security_question, security_answer FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    let Some(recovery) = row else {
        return Ok(None);
    };

    let matches = |stored: &str, given: &str| {
        !given.trim().is_empty() && stored.trim().to_lowercase() == given.trim().to_lowercase()
    };

    if matches(&recovery.security_question, question) && matches(&recovery.security_answer, answer)
    {
        Ok(Some(User {
            id: recovery.id,
            username: recovery.username,
            security_question: recovery.security_question,
        }))
    } else {
        Ok(None)
    }
}

#[instrument(skip_all, fields(user_id))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            user_id
        )));
    }

    Ok(())
}

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user: &User,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query(
        "INSERT INTO user_sessions (user_id, username, token, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(token)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, username, token, created_at, expires_at
         FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[instrument(skip(pool, preference))]
pub async fn insert_preference(
    pool: &Pool<Sqlite>,
    user_id: i64,
    preference: &NewPreference,
) -> Result<i64, AppError> {
    info!("Recording preference submission");

    let res = sqlx::query(
        "INSERT INTO preferences (user_id, region, budget, occasion, cuisine, diet, vibe)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&preference.region)
    .bind(&preference.budget)
    .bind(&preference.occasion)
    .bind(join_list(&preference.cuisine))
    .bind(join_list(&preference.diet))
    .bind(join_list(&preference.vibe))
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_latest_preference(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Option<Preference>, AppError> {
    info!("Getting latest preference");

    let row = sqlx::query_as::<_, DbPreference>(
        "SELECT id, user_id, region, budget, occasion, cuisine, diet, vibe, created_at
         FROM preferences
         WHERE user_id = ?
         ORDER BY id DESC
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Preference::from))
}

/// Restaurants in the preferred region and price band whose cuisine mentions
/// any preferred cuisine.
#[instrument(skip(pool, preference))]
pub async fn find_matching_restaurants(
    pool: &Pool<Sqlite>,
    preference: &Preference,
    limit: usize,
) -> Result<Vec<Restaurant>, AppError> {
    info!("Finding restaurants for preference");

    let any_region = preference.region.eq_ignore_ascii_case("anywhere");
    let sql = format!(
        "SELECT {} FROM restaurants
         WHERE (? OR region = ?)
           AND price_range = ?
           AND cuisine IS NOT NULL
         ORDER BY name",
        RESTAURANT_COLUMNS
    );

    let rows = sqlx::query_as::<_, DbRestaurant>(&sql)
        .bind(any_region)
        .bind(&preference.region)
        .bind(preference.budget.to_lowercase())
        .fetch_all(pool)
        .await?;

    let wanted: Vec<String> = preference
        .cuisine
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();
    let any_cuisine = wanted.iter().any(|c| c == "any");

    Ok(rows
        .into_iter()
        .map(Restaurant::from)
        .filter(|r| {
            let cuisine = r.cuisine.as_deref().unwrap_or_default().to_lowercase();
            any_cuisine || wanted.iter().any(|w| cuisine.contains(w.as_str()))
        })
        .take(limit)
        .collect())
}
