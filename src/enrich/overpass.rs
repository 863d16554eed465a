use std::collections::BTreeMap;

use reqwest::Client;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::cuisine::{infer_cuisine, normalize_cuisine_tag};
use super::text::name_similarity;
use crate::env::OverpassSettings;
use crate::error::AppError;

pub const STATUS_MATCHED: &str = "matched";
pub const STATUS_NO_MATCH: &str = "no_match";
pub const STATUS_ERROR: &str = "error";

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const AMENITY_FILTER: &str = r#"["amenity"~"^(restaurant|cafe|fast_food|food_court)$"]"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Cuisine came from the OSM `cuisine` tag.
    High,
    /// Matched an OSM element but the cuisine was inferred from the name.
    Medium,
    /// No OSM match; cuisine inferred from the name.
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct OsmCenter {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OsmElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<OsmCenter>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl OsmElement {
    /// Nodes carry their own position; ways and relations only a center.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.center, self.lat, self.lon) {
            (Some(center), _, _) => Some((center.lat, center.lon)),
            (None, Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.tags.get("name").map(String::as_str)
    }

    fn tag(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.tags.get(*key))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .map(String::from)
    }
}

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OsmElement>,
}

pub fn build_query(lat: f64, lon: f64, radius_m: u32) -> String {
    format!(
        "[out:json][timeout:25];\n(\n  node(around:{r},{lat},{lon}){f};\n  way(around:{r},{lat},{lon}){f};\n  relation(around:{r},{lat},{lon}){f};\n);\nout center tags;",
        r = radius_m,
        lat = lat,
        lon = lon,
        f = AMENITY_FILTER,
    )
}

/// Great-circle distance in metres.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Nearest element whose name is similar enough to `name`.
pub fn select_candidate<'a>(
    elements: &'a [OsmElement],
    name: &str,
    lat: f64,
    lon: f64,
    threshold: f64,
) -> Option<&'a OsmElement> {
    elements
        .iter()
        .filter_map(|element| {
            let candidate_name = element.name()?;
            let (el_lat, el_lon) = element.position()?;
            let similarity = name_similarity(name, candidate_name);
            debug!(candidate = candidate_name, similarity, "Scored candidate");
            (similarity > threshold).then(|| (element, haversine_m(lat, lon, el_lat, el_lon)))
        })
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(element, _)| element)
}

/// Anything that can list points of interest around a coordinate.
#[rocket::async_trait]
pub trait PoiSource: Send + Sync {
    async fn nearby(&self, lat: f64, lon: f64, radius_m: u32)
        -> Result<Vec<OsmElement>, AppError>;
}

pub struct OverpassClient {
    client: Client,
    url: String,
}

impl OverpassClient {
    pub fn new(settings: &OverpassSettings) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: settings.url.clone(),
        })
    }
}

#[rocket::async_trait]
impl PoiSource for OverpassClient {
    #[instrument(skip(self))]
    async fn nearby(
        &self,
        lat: f64,
        lon: f64,
        radius_m: u32,
    ) -> Result<Vec<OsmElement>, AppError> {
        let query = build_query(lat, lon, radius_m);

        let response = self
            .client
            .post(&self.url)
            .form(&[("data", query)])
            .send()
            .await?
            .error_for_status()?;

        let body: OverpassResponse = response.json().await?;
        debug!(elements = body.elements.len(), "Overpass response");

        Ok(body.elements)
    }
}

#[derive(Debug, sqlx::FromRow, Clone)]
pub struct PendingRestaurant {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// What a lookup decided for one restaurant.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Matched(OsmElement),
    NoMatch,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub processed: u64,
    pub matched: u64,
    pub no_match: u64,
    pub failed: u64,
}

/// Queries around the restaurant, doubling the radius while nothing comes
/// back, up to the configured cap.
pub async fn lookup<S: PoiSource + ?Sized>(
    source: &S,
    restaurant: &PendingRestaurant,
    settings: &OverpassSettings,
) -> Result<LookupOutcome, AppError> {
    let mut radius = settings.initial_radius_m;

    loop {
        let elements = source
            .nearby(restaurant.latitude, restaurant.longitude, radius)
            .await?;

        if !elements.is_empty() || radius >= settings.max_radius_m {
            let chosen = select_candidate(
                &elements,
                &restaurant.name,
                restaurant.latitude,
                restaurant.longitude,
                settings.similarity_threshold,
            );
            return Ok(match chosen {
                Some(element) => LookupOutcome::Matched(element.clone()),
                None => LookupOutcome::NoMatch,
            });
        }

        radius = radius.saturating_mul(2).min(settings.max_radius_m);
        debug!(radius, "No elements, widening search");
        tokio::time::sleep(settings.request_delay).await;
    }
}

#[instrument(skip(pool))]
pub async fn pending_restaurants(
    pool: &Pool<Sqlite>,
    after_id: i64,
    limit: i64,
) -> Result<Vec<PendingRestaurant>, AppError> {
    let rows = sqlx::query_as::<_, PendingRestaurant>(
        "SELECT id, name, latitude, longitude FROM restaurants
         WHERE cuisine IS NULL
           AND latitude IS NOT NULL
           AND longitude IS NOT NULL
           AND (osm_status IS NULL OR osm_status = ?)
           AND id > ?
         ORDER BY id
         LIMIT ?",
    )
    .bind(STATUS_ERROR)
    .bind(after_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn record_match(
    pool: &Pool<Sqlite>,
    restaurant: &PendingRestaurant,
    element: &OsmElement,
) -> Result<Confidence, AppError> {
    let (cuisine, confidence) = match element
        .tags
        .get("cuisine")
        .and_then(|tag| normalize_cuisine_tag(tag))
    {
        Some(cuisine) => (cuisine, Confidence::High),
        None => (infer_cuisine(&restaurant.name).to_string(), Confidence::Medium),
    };

    let raw_properties = serde_json::to_string(&element.tags)
        .map_err(|e| AppError::Internal(format!("Could not serialise tags: {}", e)))?;

    sqlx::query(
        "UPDATE restaurants SET
            cuisine = ?, confidence = ?, osm_status = ?, osm_id = ?, osm_type = ?,
            raw_properties = ?, opening_hours = ?, phone = ?, website = ?,
            takeaway = ?, delivery = ?, outdoor_seating = ?, wheelchair = ?,
            diet_vegetarian = ?, diet_vegan = ?, diet_halal = ?
         WHERE id = ?",
    )
    .bind(cuisine)
    .bind(confidence.as_str())
    .bind(STATUS_MATCHED)
    .bind(element.id.to_string())
    .bind(&element.kind)
    .bind(raw_properties)
    .bind(element.tag(&["opening_hours"]))
    .bind(element.tag(&["phone", "contact:phone"]))
    .bind(element.tag(&["website", "contact:website"]))
    .bind(element.tag(&["takeaway"]))
    .bind(element.tag(&["delivery"]))
    .bind(element.tag(&["outdoor_seating"]))
    .bind(element.tag(&["wheelchair"]))
    .bind(element.tag(&["diet:vegetarian"]))
    .bind(element.tag(&["diet:vegan"]))
    .bind(element.tag(&["diet:halal"]))
    .bind(restaurant.id)
    .execute(pool)
    .await?;

    Ok(confidence)
}

async fn record_no_match(pool: &Pool<Sqlite>, restaurant: &PendingRestaurant) -> Result<(), AppError> {
    sqlx::query("UPDATE restaurants SET cuisine = ?, confidence = ?, osm_status = ? WHERE id = ?")
        .bind(infer_cuisine(&restaurant.name))
        .bind(Confidence::Low.as_str())
        .bind(STATUS_NO_MATCH)
        .bind(restaurant.id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn record_failure(pool: &Pool<Sqlite>, restaurant: &PendingRestaurant) -> Result<(), AppError> {
    sqlx::query("UPDATE restaurants SET osm_status = ? WHERE id = ?")
        .bind(STATUS_ERROR)
        .bind(restaurant.id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Enriches restaurants that still lack a cuisine. Rows are walked in id
/// order; each lookup is retried after a fixed delay up to `max_retries`
/// times before the row is marked `error` for the next run.
#[instrument(skip(pool, source, settings))]
pub async fn enrich_from_overpass<S: PoiSource + ?Sized>(
    pool: &Pool<Sqlite>,
    source: &S,
    settings: &OverpassSettings,
    max_batches: Option<usize>,
) -> Result<EnrichmentSummary, AppError> {
    info!("Starting Overpass enrichment");

    let mut summary = EnrichmentSummary::default();
    let mut last_id = 0;
    let mut batches = 0;

    loop {
        if max_batches.is_some_and(|max| batches >= max) {
            break;
        }

        let batch = pending_restaurants(pool, last_id, settings.batch_size).await?;
        if batch.is_empty() {
            break;
        }
        batches += 1;
        info!(batch = batches, size = batch.len(), "Processing batch");

        for restaurant in &batch {
            last_id = restaurant.id;
            summary.processed += 1;

            let mut attempt = 0;
            loop {
                match lookup(source, restaurant, settings).await {
                    Ok(LookupOutcome::Matched(element)) => {
                        let confidence = record_match(pool, restaurant, &element).await?;
                        info!(
                            restaurant = %restaurant.name,
                            osm_id = element.id,
                            confidence = confidence.as_str(),
                            "Matched"
                        );
                        summary.matched += 1;
                        break;
                    }
                    Ok(LookupOutcome::NoMatch) => {
                        record_no_match(pool, restaurant).await?;
                        info!(restaurant = %restaurant.name, "No match, cuisine inferred");
                        summary.no_match += 1;
                        break;
                    }
                    Err(e) => {
                        e.log_and_record(&format!("Overpass lookup for restaurant {}", restaurant.id));
                        if attempt >= settings.max_retries {
                            warn!(restaurant = %restaurant.name, "Giving up after retries");
                            record_failure(pool, restaurant).await?;
                            summary.failed += 1;
                            break;
                        }
                        attempt += 1;
                        warn!(attempt, delay = ?settings.retry_delay, "Retrying");
                        tokio::time::sleep(settings.retry_delay).await;
                    }
                }
            }

            tokio::time::sleep(settings.request_delay).await;
        }
    }

    info!(
        processed = summary.processed,
        matched = summary.matched,
        no_match = summary.no_match,
        failed = summary.failed,
        "Overpass enrichment complete"
    );

    Ok(summary)
}
