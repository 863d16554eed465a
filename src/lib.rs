#[macro_use]
extern crate rocket;

pub mod auth;
pub mod database;
pub mod db;
pub mod enrich;
pub mod env;
pub mod error;
pub mod models;
pub mod routes;
pub mod telemetry;
pub mod validation;
#[cfg(test)]
mod test;

use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use sqlx::SqlitePool;
use tracing::info;

use auth::{
    forgot, login, logout, process_forgot, process_login, process_register, process_reset,
    register, reset, unauthorized,
};
use env::Settings;
use routes::{about, dashboard, index, recommend, submit_preferences};
use telemetry::TelemetryFairing;

pub fn init_rocket(pool: SqlitePool, settings: Settings) -> Rocket<Build> {
    info!("Starting makan-match");

    rocket::build()
        .manage(pool)
        .manage(settings)
        .mount(
            "/",
            routes![
                index,
                about,
                register,
                process_register,
                login,
                process_login,
                logout,
                dashboard,
                forgot,
                process_forgot,
                reset,
                process_reset,
                recommend,
                submit_preferences,
            ],
        )
        .register("/", catchers![unauthorized])
        .attach(Template::fairing())
        .attach(TelemetryFairing)
}
