use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::{context, Template};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::auth::User;
use crate::db::{find_matching_restaurants, get_latest_preference, insert_preference};
use crate::error::AppError;
use crate::validation::{PreferenceForm, MISSING_FIELDS_MESSAGE};

pub const MAX_RECOMMENDATIONS: usize = 10;

pub const REGIONS: [&str; 6] = ["North", "South", "East", "West", "Central", "Anywhere"];
pub const BUDGETS: [&str; 3] = ["cheap", "medium", "expensive"];
pub const OCCASIONS: [&str; 5] = ["casual", "date", "family", "friends", "business"];
pub const CUISINES: [&str; 13] = [
    "japanese", "korean", "chinese", "thai", "indian", "italian", "western", "malay",
    "vietnamese", "mexican", "cafe", "local", "Any",
];
pub const DIETS: [&str; 5] = ["none", "vegetarian", "vegan", "halal", "gluten free"];
pub const VIBES: [&str; 5] = ["cozy", "lively", "quiet", "trendy", "family friendly"];

#[derive(Debug, Serialize)]
pub struct FlashContext {
    pub kind: String,
    pub message: String,
}

pub fn flash_context(flash: Option<FlashMessage<'_>>) -> Option<FlashContext> {
    flash.map(|f| FlashContext {
        kind: f.kind().to_string(),
        message: f.message().to_string(),
    })
}

#[get("/")]
pub fn index(user: Option<User>, flash: Option<FlashMessage<'_>>) -> Template {
    Template::render(
        "index",
        context! {
            title: "Makan Match",
            current_user: user,
            flash: flash_context(flash),
            current_route: "index",
        },
    )
}

#[get("/about")]
pub fn about(user: Option<User>) -> Template {
    Template::render(
        "about",
        context! {
            title: "About",
            current_user: user,
            current_route: "about",
        },
    )
}

#[get("/dashboard")]
pub async fn dashboard(
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    let latest = get_latest_preference(db, user.id).await?;

    Ok(Template::render(
        "dashboard",
        context! {
            title: "Dashboard",
            current_user: user,
            latest: latest,
            flash: flash_context(flash),
            current_route: "dashboard",
        },
    ))
}

#[get("/recommend")]
pub async fn recommend(
    user: User,
    flash: Option<FlashMessage<'_>>,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    let latest = get_latest_preference(db, user.id).await?;

    let restaurants = match &latest {
        Some(preference) => {
            find_matching_restaurants(db, preference, MAX_RECOMMENDATIONS).await?
        }
        None => Vec::new(),
    };

    Ok(Template::render(
        "recommend",
        context! {
            title: "Recommendations",
            current_user: user,
            latest: latest,
            restaurants: restaurants,
            regions: REGIONS,
            budgets: BUDGETS,
            occasions: OCCASIONS,
            cuisines: CUISINES,
            diets: DIETS,
            vibes: VIBES,
            flash: flash_context(flash),
            current_route: "recommend",
        },
    ))
}

#[post("/recommend", data = "<form>")]
pub async fn submit_preferences(
    user: User,
    form: Form<PreferenceForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Flash<Redirect>, AppError> {
    let preference = match form.validate_submission() {
        Ok(preference) => preference,
        Err(e) => {
            e.log_and_record("Preference submission");
            return Ok(Flash::error(
                Redirect::to("/recommend"),
                MISSING_FIELDS_MESSAGE,
            ));
        }
    };

    let id = insert_preference(db, user.id, &preference).await?;
    info!(user_id = user.id, preference_id = id, "Saved preferences");

    Ok(Flash::success(Redirect::to("/recommend"), "Preferences saved"))
}
