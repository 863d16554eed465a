use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use super::text::{best_bucket, normalize_name};
use crate::error::AppError;

pub const DEFAULT_CATEGORY: &str = "Restaurant";

pub const CATEGORY_KEYWORDS: [(&str, &[&str]); 9] = [
    (
        "Hawker",
        &[
            "hawker", "food centre", "food center", "coffeeshop", "coffee shop",
            "kopitiam", "kopi tiam", "zi char", "zichar", "tze char",
            "kway chap", "economic rice", "mixed rice", "cai fan",
            "chicken rice", "char siew", "roast pork", "duck rice",
            "bak kut teh", "laksa", "ban mian", "mee hoon kueh",
            "fishball", "fish ball", "hokkien mee", "fried kway teow",
            "carrot cake", "fried carrot cake", "roti prata", "prata",
            "satay", "mee siam", "mee rebus", "nasi padang", "nasi lemak",
            "yong tau foo", "yong tau fu",
        ],
    ),
    (
        "Cafe",
        &[
            "cafe", "coffee", "espresso", "cold brew", "latte", "flat white",
            "mocha", "brunch", "all-day breakfast", "toast", "sourdough",
            "roastery", "beans", "matcha latte", "tea house", "tea bar",
            "croissant cafe", "bistro cafe", "concept cafe",
        ],
    ),
    (
        "Dessert",
        &[
            "dessert", "gelato", "ice cream", "froyo", "frozen yogurt", "popsicle",
            "shaved ice", "bingsu", "parfait", "waffle", "pancake", "crepe",
            "milkshake", "tiramisu", "brownie", "acai", "sorbet",
            "snow ice", "mango sago", "yuzu sorbet",
        ],
    ),
    (
        "Bubble Tea",
        &[
            "bubble tea", "boba", "milk tea", "fruit tea", "pearl",
            "tiger sugar", "brown sugar milk", "tea shop", "tea studio",
            "cheese tea", "macchiato tea", "each a cup",
        ],
    ),
    (
        "Fast Food",
        &[
            "fried chicken", "burger", "double cheeseburger", "fries",
            "chicken wrap", "fish burger", "pizza", "sub", "nuggets",
            "hot dog", "cheeseburger", "family meal",
            "express", "quick bites", "takeaway only",
        ],
    ),
    (
        "Bakery",
        &[
            "bakery", "bread", "pastry", "patisserie", "boulangerie",
            "cake shop", "cake", "muffin", "tart", "croissant",
            "sourdough bakery", "loaf", "toast shop", "bagel",
            "artisan bread", "danish",
        ],
    ),
    (
        "Food Court",
        &[
            "food court", "food junction", "food republic",
            "kopitiam", "the kitchen", "the food market",
        ],
    ),
    (
        "Supermarket Food",
        &[
            "supermarket", "ready to eat", "ready meal",
            "bento", "heat-and-eat", "pre-packed meal",
            "don don donki", "donki", "fairprice", "ntuc",
            "shokupan", "salad bowl", "microwave meal",
        ],
    ),
    (
        "Restaurant",
        &[
            "restaurant", "kitchen", "grill", "smokehouse", "steakhouse",
            "izakaya", "trattoria", "osteria", "cantina", "bistro",
            "hotpot", "bbq", "korean bbq", "yakitori", "ramen", "sushi",
            "dining", "house", "family restaurant", "chophouse",
            "thai", "indian", "korean", "japanese", "vietnamese",
            "turkish", "middle eastern", "greek", "mexican", "peranakan",
        ],
    ),
];

/// Highest keyword score wins, ties to the earlier category. Names with no
/// keyword hit fall back to [`DEFAULT_CATEGORY`]; blank names are not
/// classified at all.
pub fn classify_category(name: &str) -> Option<&'static str> {
    if name.trim().is_empty() {
        return None;
    }

    let text = normalize_name(name);
    Some(best_bucket(&text, &CATEGORY_KEYWORDS).unwrap_or(DEFAULT_CATEGORY))
}

#[instrument(skip(pool))]
pub async fn assign_categories(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Assigning categories");

    let rows = sqlx::query_as::<_, (i64, Option<String>)>(
        "SELECT id, name FROM restaurants ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut tx = pool.begin().await?;
    let mut updated = 0;

    for (id, name) in rows {
        let Some(category) = name.as_deref().and_then(classify_category) else {
            continue;
        };

        updated += sqlx::query("UPDATE restaurants SET category = ? WHERE id = ?")
            .bind(category)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }

    tx.commit().await?;
    info!(updated, "Completed assigning categories");

    Ok(updated)
}
