mod db;
mod overpass;
pub mod utils;

pub use utils::test_utils;
