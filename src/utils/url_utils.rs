//! URL helpers for product detail pages.

use md5::{Digest, Md5};
use url::Url;

/// Extract the item identifier from the `id` query parameter.
///
/// Returns `None` when the URL does not parse or carries no `id`. Only the
/// first `id` value counts when the parameter is repeated.
#[must_use]
pub fn extract_item_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Stable key for a job, the lowercase hex MD5 of the full URL.
#[must_use]
pub fn url_hash(url: &str) -> String {
    hex::encode(Md5::digest(url.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_item_id() {
        assert_eq!(
            extract_item_id("https://www.goofish.com/item?id=894551126004"),
            Some("894551126004".to_string())
        );
        assert_eq!(
            extract_item_id("https://www.goofish.com/item?spm=a21ybx.home&id=42&categoryId=7"),
            Some("42".to_string())
        );
        assert_eq!(
            extract_item_id("https://www.goofish.com/item?id=1&id=2"),
            Some("1".to_string())
        );
    }

    #[test]
    fn test_extract_item_id_missing() {
        assert_eq!(extract_item_id("https://www.goofish.com/item"), None);
        assert_eq!(extract_item_id("https://www.goofish.com/item?itemId=5"), None);
        assert_eq!(extract_item_id("https://www.goofish.com/item?id="), None);
        assert_eq!(extract_item_id("not a url"), None);
    }

    #[test]
    fn test_url_hash_is_md5_hex() {
        // md5("") is a well-known constant
        assert_eq!(url_hash(""), "d41d8cd98f00b204e9800998ecf8427e");
        let hash = url_hash("https://www.goofish.com/item?id=1");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, url_hash("https://www.goofish.com/item?id=1"));
        assert_ne!(hash, url_hash("https://www.goofish.com/item?id=2"));
    }
}
