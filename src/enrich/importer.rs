use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::error::AppError;

const MISSING: &str = "N.A";

static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("valid row regex"));
static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<th\b[^>]*>(.*?)</th>").expect("valid header regex"));
static CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("valid cell regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#([0-9]+)|#[xX]([0-9a-fA-F]+)|(nbsp|lt|gt|quot|apos|amp));")
        .expect("valid entity regex")
});

#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    #[serde(default)]
    pub coordinates: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedRestaurant {
    pub name: String,
    pub license_name: String,
    pub address: String,
    pub unit_no: String,
    pub level: String,
    pub postal: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

fn cell_text(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, "");
    decode_entities(&stripped).trim().to_string()
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let code = if let Some(dec) = caps.get(1) {
                dec.as_str().parse::<u32>().ok()
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok()
            } else {
                None
            };

            match (code, caps.get(3).map(|m| m.as_str())) {
                (Some(160), _) | (_, Some("nbsp")) => " ".to_string(),
                (Some(code), _) => char::from_u32(code)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string()),
                (None, Some("lt")) => "<".to_string(),
                (None, Some("gt")) => ">".to_string(),
                (None, Some("quot")) => "\"".to_string(),
                (None, Some("apos")) => "'".to_string(),
                (None, Some("amp")) => "&".to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Reads `<tr><th>KEY</th><td>VALUE</td></tr>` rows out of a feature
/// description. Rows without exactly one header and one cell are skipped.
pub fn parse_attribute_table(description: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();

    for row in ROW_RE.captures_iter(description) {
        let body = &row[1];
        let headers: Vec<_> = HEADER_RE.captures_iter(body).collect();
        let cells: Vec<_> = CELL_RE.captures_iter(body).collect();

        if let ([header], [cell]) = (headers.as_slice(), cells.as_slice()) {
            attributes.insert(cell_text(&header[1]), cell_text(&cell[1]));
        }
    }

    attributes
}

impl ImportedRestaurant {
    pub fn from_feature(feature: &Feature) -> Self {
        let description = feature
            .properties
            .get("Description")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let attributes = parse_attribute_table(description);

        let attr = |key: &str| {
            attributes
                .get(key)
                .cloned()
                .unwrap_or_else(|| MISSING.to_string())
        };

        let address = ["BLK_HOUSE", "STR_NAME", "UNIT_NO"]
            .iter()
            .filter_map(|key| attributes.get(*key))
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        let coordinates = feature
            .geometry
            .as_ref()
            .map(|g| g.coordinates.as_slice())
            .unwrap_or_default();
        let coordinate = |index: usize| coordinates.get(index).and_then(|v| v.as_f64());

        Self {
            name: attr("BUSINESS_NAME"),
            license_name: attr("LIC_NAME"),
            address,
            unit_no: attr("UNIT_NO"),
            level: attr("LEVEL_NO"),
            postal: attr("POSTCODE"),
            longitude: coordinate(0),
            latitude: coordinate(1),
        }
    }
}

pub fn parse_feature_collection(json: &str) -> Result<Vec<ImportedRestaurant>, AppError> {
    let collection: FeatureCollection = serde_json::from_str(json)?;
    Ok(collection
        .features
        .iter()
        .map(ImportedRestaurant::from_feature)
        .collect())
}

#[instrument(skip(pool, restaurants))]
pub async fn insert_restaurants(
    pool: &Pool<Sqlite>,
    restaurants: &[ImportedRestaurant],
) -> Result<u64, AppError> {
    let mut tx = pool.begin().await?;

    for restaurant in restaurants {
        sqlx::query(
            "INSERT INTO restaurants
             (name, license_name, address, unit_no, level, postal, longitude, latitude)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&restaurant.name)
        .bind(&restaurant.license_name)
        .bind(&restaurant.address)
        .bind(&restaurant.unit_no)
        .bind(&restaurant.level)
        .bind(&restaurant.postal)
        .bind(restaurant.longitude)
        .bind(restaurant.latitude)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(restaurants.len() as u64)
}

/// Imports one GeoJSON file of eating establishments.
#[instrument(skip(pool))]
pub async fn import_geojson(pool: &Pool<Sqlite>, path: &Path) -> Result<u64, AppError> {
    info!("Importing eating establishments");

    let json = std::fs::read_to_string(path).map_err(|e| {
        AppError::Import(format!("Could not read {}: {}", path.display(), e))
    })?;
    let restaurants = parse_feature_collection(&json)?;

    let without_coordinates = restaurants
        .iter()
        .filter(|r| r.latitude.is_none() || r.longitude.is_none())
        .count();
    if without_coordinates > 0 {
        warn!(without_coordinates, "Some features have no coordinates");
    }

    let imported = insert_restaurants(pool, &restaurants).await?;
    info!(imported, "Imported eating establishments");

    Ok(imported)
}
