use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::{Flash, Redirect};
use rocket::Request;
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::db::{get_session_by_token, get_user};

use super::User;

pub const SESSION_COOKIE: &str = "session_token";
pub const RESET_COOKIE: &str = "reset_user";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request)
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

async fn authenticate(request: &Request<'_>) -> Outcome<User, ()> {
    let token = request
        .cookies()
        .get_private(SESSION_COOKIE)
        .map(|c| c.value().to_string());

    let Some(token) = token else {
        return Outcome::Forward(Status::Unauthorized);
    };

    let db = match request.rocket().state::<SqlitePool>() {
        Some(pool) => pool,
        _ => {
            tracing::error!("Database pool not found in managed state");
            return Outcome::Error((Status::InternalServerError, ()));
        }
    };

    let session = match get_session_by_token(db, &token).await {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(error = ?err, "Invalid session token");
            return Outcome::Forward(Status::Unauthorized);
        }
    };

    if !session.is_valid() {
        tracing::warn!(user_id = session.user_id, "Session expired");
        return Outcome::Forward(Status::Unauthorized);
    }

    match get_user(db, session.user_id).await {
        Ok(user) => {
            tracing::info!(username = %user.username, "User authenticated via session token");
            Outcome::Success(user)
        }
        Err(err) => {
            tracing::error!(user_id = %session.user_id, error = ?err, "Failed to fetch user for valid session");
            Outcome::Error((Status::InternalServerError, ()))
        }
    }
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Flash<Redirect> {
    tracing::warn!("Unauthorized access attempt");
    Flash::error(Redirect::to("/login"), "Please log in first")
}
