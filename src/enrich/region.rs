use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;

pub const COUNTRY_REGION: &str = "Singapore";
pub const UNKNOWN_REGION: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.lat_min <= lat && lat <= self.lat_max && self.lon_min <= lon && lon <= self.lon_max
    }
}

pub const COUNTRY_BOX: BoundingBox = BoundingBox {
    lat_min: 1.13,
    lat_max: 1.45,
    lon_min: 103.69,
    lon_max: 104.01,
};

/// Named boxes overlap; they are checked in this order and the first hit wins.
pub const REGION_BOXES: [(&str, BoundingBox); 5] = [
    (
        "North",
        BoundingBox {
            lat_min: 1.35,
            lat_max: 1.45,
            lon_min: 103.69,
            lon_max: 103.90,
        },
    ),
    (
        "South",
        BoundingBox {
            lat_min: 1.25,
            lat_max: 1.32,
            lon_min: 103.80,
            lon_max: 103.87,
        },
    ),
    (
        "East",
        BoundingBox {
            lat_min: 1.30,
            lat_max: 1.40,
            lon_min: 103.90,
            lon_max: 104.01,
        },
    ),
    (
        "West",
        BoundingBox {
            lat_min: 1.30,
            lat_max: 1.38,
            lon_min: 103.69,
            lon_max: 103.80,
        },
    ),
    (
        "Central",
        BoundingBox {
            lat_min: 1.25,
            lat_max: 1.35,
            lon_min: 103.75,
            lon_max: 103.90,
        },
    ),
];

pub fn assign_region(lat: f64, lon: f64) -> &'static str {
    for (region, bounds) in REGION_BOXES.iter() {
        if bounds.contains(lat, lon) {
            return *region;
        }
    }

    if COUNTRY_BOX.contains(lat, lon) {
        return COUNTRY_REGION;
    }

    UNKNOWN_REGION
}

/// Writes a region onto every restaurant. Returns the number of rows updated.
#[instrument(skip(pool))]
pub async fn assign_regions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Assigning regions");

    let rows = sqlx::query_as::<_, (i64, Option<f64>, Option<f64>)>(
        "SELECT id, latitude, longitude FROM restaurants ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut tx = pool.begin().await?;
    let mut updated = 0;

    for (id, lat, lon) in rows {
        let region = match (lat, lon) {
            (Some(lat), Some(lon)) => assign_region(lat, lon),
            _ => UNKNOWN_REGION,
        };

        updated += sqlx::query("UPDATE restaurants SET region = ? WHERE id = ?")
            .bind(region)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }

    tx.commit().await?;
    info!(updated, "Region assigning complete");

    Ok(updated)
}
