#[cfg(test)]
pub mod test_utils {
    use crate::database::{connect_options, run_migrations};
    use crate::db::create_user;
    use crate::env::{OverpassSettings, Settings};
    use crate::error::AppError;
    use crate::init_rocket;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;
    use std::time::Duration;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";
    pub static STANDARD_QUESTION: &str = "First pet?";
    pub static STANDARD_ANSWER: &str = "Mochi";

    pub struct TestUser {
        pub username: String,
        pub password: String,
        pub security_question: String,
        pub security_answer: String,
    }

    pub struct TestRestaurant {
        pub name: String,
        pub latitude: Option<f64>,
        pub longitude: Option<f64>,
        pub cuisine: Option<String>,
        pub region: Option<String>,
        pub price_range: Option<String>,
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        restaurants: Vec<TestRestaurant>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                password: STANDARD_PASSWORD.to_string(),
                security_question: STANDARD_QUESTION.to_string(),
                security_answer: STANDARD_ANSWER.to_string(),
            });
            self
        }

        pub fn restaurant_at(mut self, name: &str, latitude: f64, longitude: f64) -> Self {
            self.restaurants.push(TestRestaurant {
                name: name.to_string(),
                latitude: Some(latitude),
                longitude: Some(longitude),
                cuisine: None,
                region: None,
                price_range: None,
            });
            self
        }

        pub fn restaurant_without_location(mut self, name: &str) -> Self {
            self.restaurants.push(TestRestaurant {
                name: name.to_string(),
                latitude: None,
                longitude: None,
                cuisine: None,
                region: None,
                price_range: None,
            });
            self
        }

        pub fn classified_restaurant(
            mut self,
            name: &str,
            cuisine: &str,
            region: &str,
            price_range: &str,
        ) -> Self {
            self.restaurants.push(TestRestaurant {
                name: name.to_string(),
                latitude: Some(1.30),
                longitude: Some(103.85),
                cuisine: Some(cuisine.to_string()),
                region: Some(region.to_string()),
                price_range: Some(price_range.to_string()),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .parse_filters("debug")
                    .is_test(true)
                    .try_init();
            });

            let pool = memory_pool().await?;
            run_migrations(&pool).await?;

            let mut user_id_map = HashMap::new();
            for user in &self.users {
                let id = create_user(
                    &pool,
                    &user.username,
                    &user.password,
                    &user.security_question,
                    &user.security_answer,
                )
                .await?;
                user_id_map.insert(user.username.clone(), id);
            }

            let mut restaurant_id_map = HashMap::new();
            for restaurant in &self.restaurants {
                let id = sqlx::query(
                    "INSERT INTO restaurants (name, latitude, longitude, cuisine, region, price_range)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(&restaurant.name)
                .bind(restaurant.latitude)
                .bind(restaurant.longitude)
                .bind(&restaurant.cuisine)
                .bind(&restaurant.region)
                .bind(&restaurant.price_range)
                .execute(&pool)
                .await?
                .last_insert_rowid();
                restaurant_id_map.insert(restaurant.name.clone(), id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                restaurant_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub restaurant_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn restaurant_id(&self, name: &str) -> Option<i64> {
            self.restaurant_id_map.get(name).copied()
        }
    }

    /// Every connection to `sqlite::memory:` is its own database, so the pool
    /// is pinned to a single connection that never gets recycled.
    pub async fn memory_pool() -> Result<Pool<Sqlite>, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options("sqlite::memory:")?)
            .await?;
        Ok(pool)
    }

    pub fn test_settings() -> Settings {
        Settings {
            database_url: "sqlite::memory:".to_string(),
            session_ttl_hours: 24,
            overpass: fast_overpass_settings(),
        }
    }

    pub fn fast_overpass_settings() -> OverpassSettings {
        OverpassSettings {
            request_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
            ..OverpassSettings::default()
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .user("alice")
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, Pool<Sqlite>) {
        let pool = test_db.pool.clone();
        let rocket = init_rocket(test_db.pool, test_settings());
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");
        (client, pool)
    }

    /// A client that keeps no cookie jar, so every cookie is attached by hand.
    pub async fn setup_untracked_client(test_db: TestDb) -> (Client, Pool<Sqlite>) {
        let pool = test_db.pool.clone();
        let rocket = init_rocket(test_db.pool, test_settings());
        let client = Client::untracked(rocket)
            .await
            .expect("valid rocket instance");
        (client, pool)
    }

    pub fn location(response: &rocket::local::asynchronous::LocalResponse<'_>) -> Option<String> {
        response.headers().get_one("Location").map(String::from)
    }

    pub async fn login_test_user(client: &Client, username: &str, password: &str) -> Status {
        let response = client
            .post("/login")
            .header(ContentType::Form)
            .body(format!("username={}&password={}", username, password))
            .dispatch()
            .await;
        response.status()
    }

    pub async fn count_rows(pool: &Pool<Sqlite>, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .expect("count query")
    }
}
