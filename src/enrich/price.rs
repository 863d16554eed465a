use once_cell::sync::Lazy;
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument};

use super::text::normalize_cuisine;
use crate::error::AppError;

/// Budget bands, inclusive on both ends, tried in order.
pub const BUDGET_BANDS: [(&str, u32, u32); 3] = [
    ("cheap", 0, 15),
    ("medium", 15, 40),
    ("expensive", 40, 999),
];

/// Typical spend per head in SGD.
pub const CUISINE_AVERAGE_PRICE: [(&str, u32); 12] = [
    ("japanese", 30),
    ("korean", 22),
    ("chinese", 25),
    ("thai", 23),
    ("indian", 17),
    ("italian", 28),
    ("western", 20),
    ("malay", 10),
    ("vietnamese", 22),
    ("mexican", 23),
    ("cafe", 22),
    ("local", 8),
];

pub fn budget_band(price: u32) -> Option<&'static str> {
    BUDGET_BANDS
        .iter()
        .find(|(_, min, max)| *min <= price && price <= *max)
        .map(|(band, _, _)| *band)
}

static CUISINE_BUDGET: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    CUISINE_AVERAGE_PRICE
        .iter()
        .filter_map(|(cuisine, price)| budget_band(*price).map(|band| (*cuisine, band)))
        .collect()
});

/// Maps a free-form cuisine string to a budget band. The first cuisine key
/// found as a substring decides.
pub fn classify_price(cuisine: &str) -> Option<&'static str> {
    let cleaned = normalize_cuisine(cuisine);
    CUISINE_BUDGET
        .iter()
        .find(|(key, _)| cleaned.contains(*key))
        .map(|(_, band)| *band)
}

#[instrument(skip(pool))]
pub async fn assign_prices(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Assigning price ranges");

    let rows = sqlx::query_as::<_, (i64, String, Option<String>)>(
        "SELECT id, name, cuisine FROM restaurants ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut tx = pool.begin().await?;
    let mut count = 0;

    for (id, name, cuisine) in rows {
        let Some(band) = cuisine.as_deref().and_then(classify_price) else {
            continue;
        };

        sqlx::query("UPDATE restaurants SET price_range = ? WHERE id = ?")
            .bind(band)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        debug!(restaurant = %name, price_range = band, "Updated price range");
        count += 1;
    }

    tx.commit().await?;
    info!("{} restaurants have been enriched with prices", count);

    Ok(count)
}
