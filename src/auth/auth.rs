use chrono::{Duration, Utc};
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::{context, Template};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};
use validator::Validate;

use crate::db::{
    authenticate_user, clean_expired_sessions, create_user, create_user_session,
    find_user_by_username, get_password_hash, invalidate_session, update_user_password,
    verify_security_answer,
};
use crate::env::Settings;
use crate::error::AppError;
use crate::routes::flash_context;
use crate::validation::{flash_message, ForgotForm, LoginForm, RegisterForm, ResetForm};

use super::{ResetGrant, UserSession, RESET_COOKIE, RESET_WINDOW_MINUTES, SESSION_COOKIE};

const INVALID_CREDENTIALS: &str = "Invalid username or password";
const RESET_REQUIRED: &str = "Answer your security question first";

#[get("/register")]
pub fn register(flash: Option<FlashMessage<'_>>) -> Template {
    Template::render(
        "register",
        context! {
            title: "Register",
            flash: flash_context(flash),
            current_route: "register",
        },
    )
}

#[post("/register", data = "<form>")]
pub async fn process_register(
    form: Form<RegisterForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    if let Err(errors) = form.validate() {
        let message = flash_message(&errors, &RegisterForm::FIELD_ORDER);
        warn!(message = %message, "Rejected registration");
        return Ok(Flash::error(Redirect::to("/register"), message));
    }

    let username = form.username.trim();

    match create_user(
        db,
        username,
        &form.password,
        &form.security_question,
        &form.security_answer,
    )
    .await
    {
        Ok(user_id) => {
            info!(user_id, username = %username, "Registered new user");
            Ok(Flash::success(
                Redirect::to("/login"),
                "Registration successful, please log in",
            ))
        }
        Err(AppError::Validation(msg)) => {
            warn!(message = %msg, "Rejected registration");
            Ok(Flash::error(
                Redirect::to("/register"),
                "Username already taken",
            ))
        }
        Err(e) => Err(e),
    }
}

#[get("/login")]
pub fn login(flash: Option<FlashMessage<'_>>) -> Template {
    Template::render(
        "login",
        context! {
            title: "Log in",
            flash: flash_context(flash),
            current_route: "login",
        },
    )
}

#[post("/login", data = "<form>")]
pub async fn process_login(
    form: Form<LoginForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    settings: &State<Settings>,
) -> Result<Flash<Redirect>, AppError> {
    if form.validate().is_err() {
        return Ok(Flash::error(Redirect::to("/login"), INVALID_CREDENTIALS));
    }

    let username = form.username.trim();
    info!("Login attempt: {}", username);

    let Some(user) = authenticate_user(db, username, &form.password).await? else {
        warn!(username = %username, "Login failed");
        return Ok(Flash::error(Redirect::to("/login"), INVALID_CREDENTIALS));
    };

    let purged = clean_expired_sessions(db).await?;
    if purged > 0 {
        info!("Cleaned up {} expired sessions", purged);
    }

    let token = UserSession::generate_token();
    let expires_at = Utc::now() + Duration::hours(settings.session_ttl_hours);
    create_user_session(db, &user, &token, expires_at.naive_utc()).await?;

    cookies.add_private(
        Cookie::build((SESSION_COOKIE, token))
            .same_site(SameSite::Lax)
            .http_only(true),
    );

    info!(user_id = user.id, "Authentication successful for {}", user.username);
    Ok(Flash::success(
        Redirect::to("/dashboard"),
        format!("Welcome back, {}", user.username),
    ))
}

#[get("/logout")]
pub async fn logout(
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        invalidate_session(db, &token).await?;
    }

    cookies.remove_private(SESSION_COOKIE);

    Ok(Flash::success(Redirect::to("/"), "You have been logged out"))
}

#[get("/forgot")]
pub fn forgot(flash: Option<FlashMessage<'_>>) -> Template {
    Template::render(
        "forgot",
        context! {
            title: "Forgot password",
            flash: flash_context(flash),
            current_route: "forgot",
        },
    )
}

#[post("/forgot", data = "<form>")]
pub async fn process_forgot(
    form: Form<ForgotForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    if let Err(errors) = form.validate() {
        let message = flash_message(&errors, &[]);
        return Ok(Flash::error(Redirect::to("/forgot"), message));
    }

    let username = form.username.trim();

    if find_user_by_username(db, username).await?.is_none() {
        warn!(username = %username, "Password reset for unknown user");
        return Ok(Flash::error(Redirect::to("/forgot"), "Invalid username"));
    }

    let verified = verify_security_answer(
        db,
        username,
        &form.security_question,
        &form.security_answer,
    )
    .await?;

    let Some(user) = verified else {
        warn!(username = %username, "Security question or answer mismatch");
        return Ok(Flash::error(
            Redirect::to("/forgot"),
            "Security question or answer is incorrect",
        ));
    };

    let Some(password_hash) = get_password_hash(db, user.id).await? else {
        return Err(AppError::NotFound(format!("User with id {} not found in database", user.id)));
    };

    cookies.add_private(
        Cookie::build((RESET_COOKIE, ResetGrant::issue(user.id, &password_hash).encode()))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::minutes(RESET_WINDOW_MINUTES)),
    );

    Ok(Flash::success(
        Redirect::to("/reset"),
        "Answer accepted, choose a new password",
    ))
}

/// The reset grant in the cookie jar, provided it is inside the reset window
/// and the password has not changed since it was issued. Stale grants are
/// dropped from the jar.
async fn reset_grant(
    cookies: &CookieJar<'_>,
    db: &Pool<Sqlite>,
) -> Result<Option<ResetGrant>, AppError> {
    let grant = cookies
        .get_private(RESET_COOKIE)
        .and_then(|cookie| ResetGrant::decode(cookie.value()))
        .filter(|grant| grant.is_fresh(Utc::now().timestamp()));

    let Some(grant) = grant else {
        cookies.remove_private(RESET_COOKIE);
        return Ok(None);
    };

    let current_hash = get_password_hash(db, grant.user_id).await?;
    if !current_hash.is_some_and(|hash| grant.matches(&hash)) {
        warn!(user_id = grant.user_id, "Stale password reset grant");
        cookies.remove_private(RESET_COOKIE);
        return Ok(None);
    }

    Ok(Some(grant))
}

#[get("/reset")]
pub async fn reset(
    cookies: &CookieJar<'_>,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, Flash<Redirect>> {
    match reset_grant(cookies, db).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(Flash::error(Redirect::to("/forgot"), RESET_REQUIRED)),
        Err(e) => {
            e.log_and_record("Reset grant lookup");
            return Err(Flash::error(Redirect::to("/forgot"), RESET_REQUIRED));
        }
    }

    Ok(Template::render(
        "reset",
        context! {
            title: "Reset password",
            flash: flash_context(flash),
            current_route: "reset",
        },
    ))
}

#[post("/reset", data = "<form>")]
pub async fn process_reset(
    form: Form<ResetForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    let Some(grant) = reset_grant(cookies, db).await? else {
        return Ok(Flash::error(Redirect::to("/forgot"), RESET_REQUIRED));
    };
    let user_id = grant.user_id;

    if let Err(errors) = form.validate() {
        let message = flash_message(&errors, &ResetForm::FIELD_ORDER);
        return Ok(Flash::error(Redirect::to("/reset"), message));
    }

    update_user_password(db, user_id, &form.password).await?;
    cookies.remove_private(RESET_COOKIE);
    info!(user_id, "Password reset");

    Ok(Flash::success(
        Redirect::to("/login"),
        "Password updated, please log in",
    ))
}
