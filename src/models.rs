use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

pub const LIST_SEPARATOR: &str = ",";

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Preference {
    pub id: i64,
    pub user_id: i64,
    pub region: String,
    pub budget: String,
    pub occasion: String,
    pub cuisine: Vec<String>,
    pub diet: Vec<String>,
    pub vibe: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbPreference {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub region: Option<String>,
    pub budget: Option<String>,
    pub occasion: Option<String>,
    pub cuisine: Option<String>,
    pub diet: Option<String>,
    pub vibe: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbPreference> for Preference {
    fn from(db: DbPreference) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            region: db.region.unwrap_or_default(),
            budget: db.budget.unwrap_or_default(),
            occasion: db.occasion.unwrap_or_default(),
            cuisine: split_list(db.cuisine.as_deref()),
            diet: split_list(db.diet.as_deref()),
            vibe: split_list(db.vibe.as_deref()),
            created_at: db
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
        }
    }
}

/// A validated preference submission, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPreference {
    pub region: String,
    pub budget: String,
    pub occasion: String,
    pub cuisine: Vec<String>,
    pub diet: Vec<String>,
    pub vibe: Vec<String>,
}

pub fn join_list(values: &[String]) -> String {
    values.join(LIST_SEPARATOR)
}

pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub postal: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub cuisine: Option<String>,
    pub price_range: Option<String>,
    pub region: Option<String>,
    pub category: Option<String>,
    pub opening_hours: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub confidence: Option<String>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbRestaurant {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub postal: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub cuisine: Option<String>,
    pub price_range: Option<String>,
    pub region: Option<String>,
    pub category: Option<String>,
    pub opening_hours: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub confidence: Option<String>,
}

impl From<DbRestaurant> for Restaurant {
    fn from(db: DbRestaurant) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            address: db.address.unwrap_or_default(),
            postal: db.postal.unwrap_or_default(),
            latitude: db.latitude,
            longitude: db.longitude,
            cuisine: db.cuisine,
            price_range: db.price_range,
            region: db.region,
            category: db.category,
            opening_hours: db.opening_hours,
            phone: db.phone,
            website: db.website,
            confidence: db.confidence,
        }
    }
}

pub const RESTAURANT_COLUMNS: &str = "id, name, address, postal, latitude, longitude, cuisine, \
     price_range, region, category, opening_hours, phone, website, confidence";
