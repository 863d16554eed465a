#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    use crate::enrich::overpass::{
        build_query, haversine_m, lookup, pending_restaurants, select_candidate, LookupOutcome,
        OsmCenter, OsmElement, OverpassResponse, PendingRestaurant, STATUS_ERROR, STATUS_MATCHED,
        STATUS_NO_MATCH,
    };
    use crate::enrich::{enrich_from_overpass, PoiSource};
    use crate::error::AppError;
    use crate::test::test_utils::{fast_overpass_settings, TestDbBuilder, TestDb};
    use rocket::tokio;

    /// Replays canned responses and records every radius it was asked for.
    /// Once the script runs out it keeps answering with an empty list.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Vec<OsmElement>, AppError>>>,
        radii: Mutex<Vec<u32>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<OsmElement>, AppError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                radii: Mutex::new(Vec::new()),
            }
        }

        fn radii(&self) -> Vec<u32> {
            self.radii.lock().unwrap().clone()
        }
    }

    #[rocket::async_trait]
    impl PoiSource for ScriptedSource {
        async fn nearby(
            &self,
            _lat: f64,
            _lon: f64,
            radius_m: u32,
        ) -> Result<Vec<OsmElement>, AppError> {
            self.radii.lock().unwrap().push(radius_m);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn node(id: i64, name: &str, lat: f64, lon: f64, extra: &[(&str, &str)]) -> OsmElement {
        let mut tags = BTreeMap::new();
        tags.insert("name".to_string(), name.to_string());
        for (key, value) in extra {
            tags.insert(key.to_string(), value.to_string());
        }
        OsmElement {
            kind: "node".to_string(),
            id,
            lat: Some(lat),
            lon: Some(lon),
            center: None,
            tags,
        }
    }

    fn outage() -> Result<Vec<OsmElement>, AppError> {
        Err(AppError::ExternalService("504 Gateway Timeout".to_string()))
    }

    async fn single_restaurant(name: &str) -> (TestDb, i64) {
        let test_db = TestDbBuilder::new()
            .restaurant_at(name, 1.3000, 103.8500)
            .build()
            .await
            .expect("test db");
        let id = test_db.restaurant_id(name).unwrap();
        (test_db, id)
    }

    #[derive(sqlx::FromRow, Debug)]
    struct EnrichedRow {
        cuisine: Option<String>,
        confidence: Option<String>,
        osm_status: Option<String>,
        osm_id: Option<String>,
        osm_type: Option<String>,
        opening_hours: Option<String>,
        phone: Option<String>,
        diet_halal: Option<String>,
    }

    async fn enriched_row(test_db: &TestDb, id: i64) -> EnrichedRow {
        sqlx::query_as::<_, EnrichedRow>(
            "SELECT cuisine, confidence, osm_status, osm_id, osm_type, opening_hours, phone, diet_halal
             FROM restaurants WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&test_db.pool)
        .await
        .expect("restaurant row")
    }

    #[test]
    fn test_response_parsing_and_positions() {
        let body = r#"{
            "version": 0.6,
            "elements": [
                {"type": "node", "id": 1, "lat": 1.3, "lon": 103.85, "tags": {"name": "A"}},
                {"type": "way", "id": 2, "center": {"lat": 1.31, "lon": 103.86}, "tags": {"name": "B"}},
                {"type": "relation", "id": 3}
            ]
        }"#;

        let response: OverpassResponse = serde_json::from_str(body).unwrap();

        assert_eq!(response.elements.len(), 3);
        assert_eq!(response.elements[0].position(), Some((1.3, 103.85)));
        assert_eq!(response.elements[1].kind, "way");
        assert_eq!(
            response.elements[1].center,
            Some(OsmCenter { lat: 1.31, lon: 103.86 })
        );
        assert_eq!(response.elements[1].position(), Some((1.31, 103.86)));
        assert_eq!(response.elements[2].position(), None);
        assert_eq!(response.elements[2].name(), None);
    }

    #[test]
    fn test_build_query_mentions_radius_and_point() {
        let query = build_query(1.3, 103.85, 40);

        assert!(query.starts_with("[out:json]"));
        assert!(query.contains("node(around:40,1.3,103.85)"));
        assert!(query.contains("way(around:40,1.3,103.85)"));
        assert!(query.contains("restaurant|cafe|fast_food|food_court"));
        assert!(query.trim_end().ends_with("out center tags;"));
    }

    #[test]
    fn test_haversine() {
        assert!(haversine_m(1.3, 103.85, 1.3, 103.85) < 1e-6);
        // One thousandth of a degree of latitude is about 111 metres.
        let d = haversine_m(1.300, 103.85, 1.301, 103.85);
        assert!((d - 111.2).abs() < 1.0, "distance was {}", d);
    }

    #[test]
    fn test_select_candidate_prefers_nearest_similar_name() {
        let elements = vec![
            node(1, "Burger King", 1.30001, 103.85001, &[]),
            node(2, "Ramen Ya", 1.30050, 103.85050, &[]),
            node(3, "RAMEN-YA", 1.30010, 103.85010, &[]),
            OsmElement {
                tags: BTreeMap::new(),
                ..node(4, "", 1.3, 103.85, &[])
            },
        ];

        let chosen = select_candidate(&elements, "Ramen Ya", 1.3, 103.85, 0.6);
        assert_eq!(chosen.map(|e| e.id), Some(3));

        assert!(select_candidate(&elements, "Din Tai Fung", 1.3, 103.85, 0.6).is_none());
        assert!(select_candidate(&[], "Ramen Ya", 1.3, 103.85, 0.6).is_none());
    }

    #[tokio::test]
    async fn test_lookup_widens_radius_until_results() {
        let settings = fast_overpass_settings();
        let source = ScriptedSource::new(vec![
            Ok(vec![]),
            Ok(vec![]),
            Ok(vec![node(7, "Ramen Ya", 1.3, 103.85, &[])]),
        ]);
        let restaurant = PendingRestaurant {
            id: 1,
            name: "Ramen Ya".to_string(),
            latitude: 1.3,
            longitude: 103.85,
        };

        let outcome = lookup(&source, &restaurant, &settings).await.unwrap();

        assert!(matches!(outcome, LookupOutcome::Matched(ref e) if e.id == 7));
        assert_eq!(source.radii(), vec![20, 40, 80]);
    }

    #[tokio::test]
    async fn test_lookup_stops_at_max_radius() {
        let settings = fast_overpass_settings();
        let source = ScriptedSource::default();
        let restaurant = PendingRestaurant {
            id: 1,
            name: "Ramen Ya".to_string(),
            latitude: 1.3,
            longitude: 103.85,
        };

        let outcome = lookup(&source, &restaurant, &settings).await.unwrap();

        assert_eq!(outcome, LookupOutcome::NoMatch);
        assert_eq!(source.radii(), vec![20, 40, 80]);
    }

    #[tokio::test]
    async fn test_lookup_does_not_widen_when_candidates_are_dissimilar() {
        let settings = fast_overpass_settings();
        let source = ScriptedSource::new(vec![Ok(vec![node(9, "Burger King", 1.3, 103.85, &[])])]);
        let restaurant = PendingRestaurant {
            id: 1,
            name: "Ramen Ya".to_string(),
            latitude: 1.3,
            longitude: 103.85,
        };

        let outcome = lookup(&source, &restaurant, &settings).await.unwrap();

        assert_eq!(outcome, LookupOutcome::NoMatch);
        assert_eq!(source.radii(), vec![20]);
    }

    #[tokio::test]
    async fn test_match_with_cuisine_tag_is_high_confidence() {
        let (test_db, id) = single_restaurant("Ramen Ya").await;
        let source = ScriptedSource::new(vec![Ok(vec![node(
            42,
            "Ramen Ya",
            1.3,
            103.85,
            &[
                ("cuisine", "Japanese;Ramen"),
                ("opening_hours", "Mo-Su 11:00-22:00"),
                ("contact:phone", "+65 6123 4567"),
                ("diet:halal", "no"),
            ],
        )])]);

        let summary = enrich_from_overpass(&test_db.pool, &source, &fast_overpass_settings(), None)
            .await
            .unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.matched, 1);

        let row = enriched_row(&test_db, id).await;
        assert_eq!(row.cuisine.as_deref(), Some("japanese, ramen"));
        assert_eq!(row.confidence.as_deref(), Some("high"));
        assert_eq!(row.osm_status.as_deref(), Some(STATUS_MATCHED));
        assert_eq!(row.osm_id.as_deref(), Some("42"));
        assert_eq!(row.osm_type.as_deref(), Some("node"));
        assert_eq!(row.opening_hours.as_deref(), Some("Mo-Su 11:00-22:00"));
        assert_eq!(row.phone.as_deref(), Some("+65 6123 4567"));
        assert_eq!(row.diet_halal.as_deref(), Some("no"));
    }

    #[tokio::test]
    async fn test_match_without_cuisine_tag_is_medium_confidence() {
        let (test_db, id) = single_restaurant("Ramen Ya").await;
        let source = ScriptedSource::new(vec![Ok(vec![node(5, "Ramen Ya", 1.3, 103.85, &[])])]);

        enrich_from_overpass(&test_db.pool, &source, &fast_overpass_settings(), None)
            .await
            .unwrap();

        let row = enriched_row(&test_db, id).await;
        assert_eq!(row.cuisine.as_deref(), Some("japanese"));
        assert_eq!(row.confidence.as_deref(), Some("medium"));
        assert_eq!(row.osm_status.as_deref(), Some(STATUS_MATCHED));
    }

    #[tokio::test]
    async fn test_no_match_infers_cuisine_with_low_confidence() {
        let (test_db, id) = single_restaurant("Golden Spoon").await;
        let source = ScriptedSource::default();

        let summary = enrich_from_overpass(&test_db.pool, &source, &fast_overpass_settings(), None)
            .await
            .unwrap();

        assert_eq!(summary.no_match, 1);
        assert_eq!(source.radii(), vec![20, 40, 80]);

        let row = enriched_row(&test_db, id).await;
        assert_eq!(row.cuisine.as_deref(), Some("unknown"));
        assert_eq!(row.confidence.as_deref(), Some("low"));
        assert_eq!(row.osm_status.as_deref(), Some(STATUS_NO_MATCH));
        assert_eq!(row.osm_id, None);
    }

    #[tokio::test]
    async fn test_failure_is_retried_then_succeeds() {
        let (test_db, id) = single_restaurant("Ramen Ya").await;
        let source = ScriptedSource::new(vec![
            outage(),
            Ok(vec![node(5, "Ramen Ya", 1.3, 103.85, &[("cuisine", "ramen")])]),
        ]);

        let summary = enrich_from_overpass(&test_db.pool, &source, &fast_overpass_settings(), None)
            .await
            .unwrap();

        assert_eq!(summary.matched, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(source.radii(), vec![20, 20]);
        assert_eq!(
            enriched_row(&test_db, id).await.osm_status.as_deref(),
            Some(STATUS_MATCHED)
        );
    }

    #[tokio::test]
    async fn test_persistent_failure_marks_error_and_is_picked_up_again() {
        let (test_db, id) = single_restaurant("Ramen Ya").await;
        let mut settings = fast_overpass_settings();
        settings.max_retries = 2;
        let source = ScriptedSource::new(vec![outage(), outage(), outage()]);

        let summary = enrich_from_overpass(&test_db.pool, &source, &settings, None)
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(source.radii().len(), 3);

        let row = enriched_row(&test_db, id).await;
        assert_eq!(row.osm_status.as_deref(), Some(STATUS_ERROR));
        assert_eq!(row.cuisine, None);

        let pending = pending_restaurants(&test_db.pool, 0, 10).await.unwrap();
        assert_eq!(pending.iter().map(|p| p.id).collect::<Vec<_>>(), vec![id]);
    }

    #[tokio::test]
    async fn test_settled_rows_are_not_processed_again() {
        let test_db = TestDbBuilder::new()
            .restaurant_at("Ramen Ya", 1.3, 103.85)
            .restaurant_at("Golden Spoon", 1.31, 103.86)
            .restaurant_without_location("Nowhere Noodles")
            .classified_restaurant("Sushi Tei", "japanese", "Central", "medium")
            .build()
            .await
            .unwrap();

        let pending = pending_restaurants(&test_db.pool, 0, 10).await.unwrap();
        let names: Vec<&str> = pending.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ramen Ya", "Golden Spoon"]);

        let first = enrich_from_overpass(
            &test_db.pool,
            &ScriptedSource::default(),
            &fast_overpass_settings(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(first.processed, 2);

        let second = enrich_from_overpass(
            &test_db.pool,
            &ScriptedSource::default(),
            &fast_overpass_settings(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(second.processed, 0);
    }

    #[tokio::test]
    async fn test_batches_follow_id_order_and_respect_limit() {
        let test_db = TestDbBuilder::new()
            .restaurant_at("One", 1.3, 103.85)
            .restaurant_at("Two", 1.3, 103.85)
            .restaurant_at("Three", 1.3, 103.85)
            .build()
            .await
            .unwrap();
        let mut settings = fast_overpass_settings();
        settings.batch_size = 2;

        let summary = enrich_from_overpass(&test_db.pool, &ScriptedSource::default(), &settings, Some(1))
            .await
            .unwrap();
        assert_eq!(summary.processed, 2);

        let remaining = pending_restaurants(&test_db.pool, 0, 10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "Three");
    }
}
