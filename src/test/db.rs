#[cfg(test)]
mod tests {
    use crate::db::{
        authenticate_user, create_user, duplicate_username, find_matching_restaurants,
        find_user_by_username, get_latest_preference, insert_preference, update_user_password,
        verify_security_answer,
    };
    use crate::error::AppError;
    use crate::models::NewPreference;
    use crate::test::test_utils::{
        create_standard_test_db, count_rows, TestDbBuilder, STANDARD_ANSWER, STANDARD_PASSWORD,
        STANDARD_QUESTION,
    };
    use rocket::tokio;

    fn preference(region: &str, budget: &str, cuisine: &[&str]) -> NewPreference {
        NewPreference {
            region: region.to_string(),
            budget: budget.to_string(),
            occasion: "casual".to_string(),
            cuisine: cuisine.iter().map(|c| c.to_string()).collect(),
            diet: vec!["none".to_string()],
            vibe: vec!["cozy".to_string(), "quiet".to_string()],
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let test_db = create_standard_test_db().await;

        let result = create_user(&test_db.pool, "alice", "another", "q", "a").await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(count_rows(&test_db.pool, "users").await, 1);
    }

    #[tokio::test]
    async fn test_password_is_hashed_and_verified() {
        let test_db = create_standard_test_db().await;

        let stored: String =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE username = 'alice'")
                .fetch_one(&test_db.pool)
                .await
                .unwrap();
        assert_ne!(stored, STANDARD_PASSWORD);

        let user = authenticate_user(&test_db.pool, "alice", STANDARD_PASSWORD)
            .await
            .unwrap();
        assert_eq!(user.map(|u| u.username), Some("alice".to_string()));

        assert!(authenticate_user(&test_db.pool, "alice", "wrong")
            .await
            .unwrap()
            .is_none());
        assert!(authenticate_user(&test_db.pool, "nobody", STANDARD_PASSWORD)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_security_answer_is_case_insensitive() {
        let test_db = create_standard_test_db().await;

        let verified = verify_security_answer(
            &test_db.pool,
            "alice",
            &STANDARD_QUESTION.to_uppercase(),
            &format!("  {}  ", STANDARD_ANSWER.to_lowercase()),
        )
        .await
        .unwrap();
        assert!(verified.is_some());

        let wrong_answer =
            verify_security_answer(&test_db.pool, "alice", STANDARD_QUESTION, "Biscuit")
                .await
                .unwrap();
        assert!(wrong_answer.is_none());

        let blank_answer = verify_security_answer(&test_db.pool, "alice", STANDARD_QUESTION, " ")
            .await
            .unwrap();
        assert!(blank_answer.is_none());
    }

    #[tokio::test]
    async fn test_update_password() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("alice").unwrap();

        update_user_password(&test_db.pool, user_id, "fresh-password")
            .await
            .unwrap();

        assert!(authenticate_user(&test_db.pool, "alice", "fresh-password")
            .await
            .unwrap()
            .is_some());
        assert!(authenticate_user(&test_db.pool, "alice", STANDARD_PASSWORD)
            .await
            .unwrap()
            .is_none());

        let missing = update_user_password(&test_db.pool, 9999, "x").await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_user_by_username() {
        let test_db = create_standard_test_db().await;

        let user = find_user_by_username(&test_db.pool, "alice")
            .await
            .unwrap()
            .expect("alice exists");
        assert_eq!(user.security_question, STANDARD_QUESTION);

        assert!(find_user_by_username(&test_db.pool, "bob")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_latest_preference_is_most_recent_submission() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("alice").unwrap();

        assert!(get_latest_preference(&test_db.pool, user_id)
            .await
            .unwrap()
            .is_none());

        insert_preference(&test_db.pool, user_id, &preference("North", "cheap", &["thai"]))
            .await
            .unwrap();
        let second_id = insert_preference(
            &test_db.pool,
            user_id,
            &preference("East", "medium", &["japanese", "korean"]),
        )
        .await
        .unwrap();

        let latest = get_latest_preference(&test_db.pool, user_id)
            .await
            .unwrap()
            .expect("latest preference");

        assert_eq!(latest.id, second_id);
        assert_eq!(latest.region, "East");
        assert_eq!(latest.cuisine, vec!["japanese", "korean"]);
        assert_eq!(latest.vibe, vec!["cozy", "quiet"]);
        assert_eq!(count_rows(&test_db.pool, "preferences").await, 2);
    }

    #[tokio::test]
    async fn test_preferences_are_per_user() {
        let test_db = TestDbBuilder::new()
            .user("alice")
            .user("bob")
            .build()
            .await
            .unwrap();
        let alice = test_db.user_id("alice").unwrap();
        let bob = test_db.user_id("bob").unwrap();

        insert_preference(&test_db.pool, alice, &preference("West", "cheap", &["indian"]))
            .await
            .unwrap();

        assert!(get_latest_preference(&test_db.pool, bob)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_matching_restaurants() {
        let test_db = TestDbBuilder::new()
            .user("alice")
            .classified_restaurant("Sushi Tei", "japanese, sushi", "Central", "medium")
            .classified_restaurant("Ramen Keisuke", "japanese", "East", "medium")
            .classified_restaurant("Seoul Garden", "korean", "Central", "medium")
            .classified_restaurant("Omakase Bar", "japanese", "Central", "expensive")
            .build()
            .await
            .unwrap();
        let user_id = test_db.user_id("alice").unwrap();

        insert_preference(
            &test_db.pool,
            user_id,
            &preference("Central", "Medium", &["Japanese"]),
        )
        .await
        .unwrap();
        let latest = get_latest_preference(&test_db.pool, user_id)
            .await
            .unwrap()
            .unwrap();

        let names: Vec<String> = find_matching_restaurants(&test_db.pool, &latest, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Sushi Tei"]);

        insert_preference(
            &test_db.pool,
            user_id,
            &preference("Anywhere", "medium", &["Any"]),
        )
        .await
        .unwrap();
        let anywhere = get_latest_preference(&test_db.pool, user_id)
            .await
            .unwrap()
            .unwrap();

        let names: Vec<String> = find_matching_restaurants(&test_db.pool, &anywhere, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Ramen Keisuke", "Seoul Garden"]);
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_duplicate_username() {
        let test_db = create_standard_test_db().await;

        let err = sqlx::query(
            "INSERT INTO users (username, password_hash, security_question, security_answer)
             VALUES ('alice', 'x', 'q', 'a')",
        )
        .execute(&test_db.pool)
        .await
        .expect_err("second alice violates UNIQUE");

        match duplicate_username(err, "alice") {
            AppError::Validation(msg) => assert!(msg.contains("already exists")),
            other => panic!("expected validation error, got {:?}", other),
        }

        let err = sqlx::query("INSERT INTO missing_table VALUES (1)")
            .execute(&test_db.pool)
            .await
            .expect_err("table does not exist");
        assert!(matches!(
            duplicate_username(err, "alice"),
            AppError::Database(_)
        ));
    }
}
