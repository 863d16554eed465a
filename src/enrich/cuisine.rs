use super::text::{best_bucket, normalize_name};

pub const UNKNOWN_CUISINE: &str = "unknown";

/// Name keywords per cuisine. Labels line up with the price table so an
/// inferred cuisine can be priced.
pub const CUISINE_KEYWORDS: [(&str, &[&str]); 12] = [
    (
        "japanese",
        &[
            "japanese", "ramen", "sushi", "izakaya", "yakitori", "udon", "soba",
            "donburi", "tempura", "katsu", "teppanyaki", "omakase", "sashimi",
            "tonkatsu", "yakiniku", "takoyaki",
        ],
    ),
    (
        "korean",
        &[
            "korean", "kimchi", "bibimbap", "bulgogi", "tteokbokki", "soju",
            "k bbq", "jjigae",
        ],
    ),
    (
        "chinese",
        &[
            "chinese", "dim sum", "dumpling", "xiao long bao", "szechuan", "sichuan",
            "hotpot", "hot pot", "mala", "zi char", "zichar", "tze char", "cantonese",
            "teochew", "hainanese", "noodle house", "wanton", "char siew",
        ],
    ),
    (
        "thai",
        &["thai", "tom yum", "pad thai", "mookata", "som tam", "bangkok"],
    ),
    (
        "indian",
        &[
            "indian", "prata", "biryani", "briyani", "tandoori", "masala", "naan",
            "curry house", "dosa", "thosai", "chettinad", "punjabi",
        ],
    ),
    (
        "italian",
        &[
            "italian", "pizza", "pizzeria", "pasta", "trattoria", "osteria",
            "ristorante", "gelato", "risotto",
        ],
    ),
    (
        "western",
        &[
            "western", "burger", "steak", "grill", "bistro", "diner", "fish and chips",
            "bbq", "smokehouse", "brasserie",
        ],
    ),
    (
        "malay",
        &[
            "malay", "nasi", "mee rebus", "mee siam", "satay", "rendang", "ayam",
            "padang", "halal kitchen", "warung",
        ],
    ),
    (
        "vietnamese",
        &["vietnamese", "pho", "banh mi", "saigon", "hanoi", "bun bo"],
    ),
    (
        "mexican",
        &["mexican", "taco", "burrito", "quesadilla", "cantina", "nachos"],
    ),
    (
        "cafe",
        &[
            "cafe", "coffee", "espresso", "roastery", "brunch", "bakery", "patisserie",
        ],
    ),
    (
        "local",
        &[
            "hawker", "kopitiam", "coffeeshop", "chicken rice", "laksa", "bak kut teh",
            "kway teow", "hokkien mee", "carrot cake", "yong tau foo", "economic rice",
            "mixed rice", "fishball", "fish ball", "ban mian",
        ],
    ),
];

/// Guesses a cuisine from a restaurant name. Highest keyword count wins, ties
/// go to the earlier cuisine; no hit gives [`UNKNOWN_CUISINE`].
pub fn infer_cuisine(name: &str) -> &'static str {
    let text = normalize_name(name);
    if text.is_empty() {
        return UNKNOWN_CUISINE;
    }
    best_bucket(&text, &CUISINE_KEYWORDS).unwrap_or(UNKNOWN_CUISINE)
}

/// Normalises an OSM `cuisine` tag such as `Japanese;Sushi` into
/// `japanese, sushi`. Blank tags give `None`.
pub fn normalize_cuisine_tag(tag: &str) -> Option<String> {
    let parts: Vec<String> = tag
        .split(';')
        .map(|part| part.trim().to_lowercase().replace('_', " "))
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
