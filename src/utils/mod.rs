pub mod constants;
pub mod csv_utils;
pub mod url_utils;

pub use constants::*;
pub use csv_utils::{URL_COLUMN, column_index, url_rows};
pub use url_utils::{extract_item_id, url_hash};
