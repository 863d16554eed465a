/// A single forward-only schema step. The position in [`MIGRATIONS`] is the
/// version recorded in `PRAGMA user_version` once the step has been applied.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

impl Migration {
    const fn new(name: &'static str, sql: &'static str) -> Self {
        Self { name, sql }
    }
}

pub const MIGRATIONS: &[Migration] = &[
    Migration::new(
        "create_core_tables",
        r#"
CREATE TABLE IF NOT EXISTS neighborhoods (
    id INTEGER PRIMARY KEY,
    name TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS restaurants (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    address TEXT,
    neighborhood_id INTEGER,
    price_range TEXT,
    avg_rating REAL,
    FOREIGN KEY (neighborhood_id) REFERENCES neighborhoods (id)
);

CREATE TABLE IF NOT EXISTS cuisines (
    id INTEGER PRIMARY KEY,
    name TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS restaurant_cuisines (
    restaurant_id INTEGER,
    cuisine_id INTEGER,
    PRIMARY KEY (restaurant_id, cuisine_id)
);

CREATE TABLE IF NOT EXISTS vibes (
    id INTEGER PRIMARY KEY,
    vibe TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS restaurant_vibes (
    restaurant_id INTEGER,
    vibe_id INTEGER,
    PRIMARY KEY (restaurant_id, vibe_id)
);

CREATE TABLE IF NOT EXISTS menu_items (
    id INTEGER PRIMARY KEY,
    restaurant_id INTEGER,
    item_name TEXT NOT NULL,
    price REAL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS recommended_items (
    id INTEGER PRIMARY KEY,
    restaurant_id INTEGER,
    menu_item_id INTEGER
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY,
    user_id INTEGER,
    restaurant_id INTEGER,
    rating INTEGER CHECK (rating >= 1 AND rating <= 5),
    review_text TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
"#,
    ),
    Migration::new(
        "add_security_question_to_users",
        r#"
ALTER TABLE users ADD COLUMN security_question TEXT NOT NULL DEFAULT '';
ALTER TABLE users ADD COLUMN security_answer TEXT NOT NULL DEFAULT '';
"#,
    ),
    Migration::new(
        "create_preferences",
        r#"
CREATE TABLE IF NOT EXISTS preferences (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    region TEXT NOT NULL,
    budget TEXT NOT NULL,
    occasion TEXT NOT NULL,
    cuisine TEXT NOT NULL,
    diet TEXT NOT NULL,
    vibe TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users (id)
);

CREATE INDEX IF NOT EXISTS idx_preferences_user ON preferences (user_id, id);
"#,
    ),
    Migration::new(
        "add_restaurant_location_columns",
        r#"
ALTER TABLE restaurants ADD COLUMN license_name TEXT;
ALTER TABLE restaurants ADD COLUMN unit_no TEXT;
ALTER TABLE restaurants ADD COLUMN level TEXT;
ALTER TABLE restaurants ADD COLUMN postal TEXT;
ALTER TABLE restaurants ADD COLUMN latitude REAL;
ALTER TABLE restaurants ADD COLUMN longitude REAL;
"#,
    ),
    Migration::new(
        "add_restaurant_enrichment_columns",
        r#"
ALTER TABLE restaurants ADD COLUMN cuisine TEXT;
ALTER TABLE restaurants ADD COLUMN region TEXT;
ALTER TABLE restaurants ADD COLUMN category TEXT;
ALTER TABLE restaurants ADD COLUMN raw_properties TEXT;
ALTER TABLE restaurants ADD COLUMN osm_id TEXT;
ALTER TABLE restaurants ADD COLUMN osm_type TEXT;
ALTER TABLE restaurants ADD COLUMN osm_status TEXT;
ALTER TABLE restaurants ADD COLUMN confidence TEXT;
ALTER TABLE restaurants ADD COLUMN opening_hours TEXT;
ALTER TABLE restaurants ADD COLUMN phone TEXT;
ALTER TABLE restaurants ADD COLUMN website TEXT;
ALTER TABLE restaurants ADD COLUMN takeaway TEXT;
ALTER TABLE restaurants ADD COLUMN delivery TEXT;
ALTER TABLE restaurants ADD COLUMN outdoor_seating TEXT;
ALTER TABLE restaurants ADD COLUMN wheelchair TEXT;
ALTER TABLE restaurants ADD COLUMN diet_vegetarian TEXT;
ALTER TABLE restaurants ADD COLUMN diet_vegan TEXT;
ALTER TABLE restaurants ADD COLUMN diet_halal TEXT;

CREATE INDEX IF NOT EXISTS idx_restaurants_pending_osm ON restaurants (osm_status, cuisine);
"#,
    ),
    Migration::new(
        "create_user_sessions",
        r#"
CREATE TABLE IF NOT EXISTS user_sessions (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    username TEXT NOT NULL,
    token TEXT NOT NULL UNIQUE,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    expires_at TIMESTAMP NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users (id)
);
"#,
    ),
];

pub fn latest_version() -> i64 {
    MIGRATIONS.len() as i64
}
