//! Offline jobs that fill and enrich the `restaurants` table.
//!
//! Every job is independent and can be re-run: region, price and category
//! overwrite their column, the importer appends, and the Overpass job only
//! picks up rows it has not settled yet.

pub mod category;
pub mod cuisine;
pub mod importer;
pub mod overpass;
pub mod price;
pub mod region;
pub mod text;

pub use category::{assign_categories, classify_category};
pub use cuisine::infer_cuisine;
pub use importer::import_geojson;
pub use overpass::{enrich_from_overpass, OverpassClient, PoiSource};
pub use price::{assign_prices, classify_price};
pub use region::{assign_region, assign_regions};
