//! Product record extraction from a successful detail response
//!
//! Fields are read leniently: the gateway sends ids and counters as either
//! strings or numbers depending on the item, and a missing field leaves the
//! record partial rather than failing it. Only a missing or empty `itemDO`
//! block is an error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized product detail
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ProductRecord {
    pub item_id: String,
    pub category_id: String,
    pub title: String,
    pub images: Vec<String>,
    pub sold_price: String,
    pub browse_count: Option<u64>,
    pub want_count: Option<u64>,
    pub collect_count: Option<u64>,
    pub quantity: Option<u64>,
    /// Listing creation time, epoch milliseconds
    pub gmt_create: Option<i64>,
    pub seller_id: String,
    pub url: String,
}

/// The response carried no product block
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("EMPTY_PRODUCT")]
pub struct EmptyProduct;

/// Extract a [`ProductRecord`] from a detail response body
///
/// # Errors
///
/// Returns [`EmptyProduct`] when `data.itemDO` is missing, not an object, or
/// empty.
pub fn parse_product(body: &Value, url: &str) -> Result<ProductRecord, EmptyProduct> {
    let data = body.get("data");
    let item = data
        .and_then(|d| d.get("itemDO"))
        .and_then(Value::as_object)
        .filter(|item| !item.is_empty())
        .ok_or(EmptyProduct)?;

    let track = data.and_then(|d| d.get("trackParams")).and_then(Value::as_object);
    let seller = data.and_then(|d| d.get("sellerDO")).and_then(Value::as_object);

    let mut item_id = text(track, "itemId");
    if item_id.is_empty() {
        item_id = text(Some(item), "itemId");
    }

    Ok(ProductRecord {
        item_id,
        category_id: text(track, "categoryId"),
        title: text(Some(item), "title"),
        images: images(item),
        sold_price: text(Some(item), "soldPrice"),
        browse_count: count(item, "browseCnt"),
        want_count: count(item, "wantCnt"),
        collect_count: count(item, "collectCnt"),
        quantity: count(item, "quantity"),
        gmt_create: timestamp(item, "gmtCreate"),
        seller_id: text(seller, "sellerId"),
        url: url.to_string(),
    })
}

fn text(obj: Option<&Map<String, Value>>, key: &str) -> String {
    match obj.and_then(|o| o.get(key)) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn count(obj: &Map<String, Value>, key: &str) -> Option<u64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn timestamp(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn images(item: &Map<String, Value>) -> Vec<String> {
    item.get("imageInfos")
        .and_then(Value::as_array)
        .map(|infos| {
            infos
                .iter()
                .filter_map(|info| info.get("photoSearchUrl").and_then(Value::as_str))
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URL: &str = "https://www.goofish.com/item?id=42";

    fn full_body() -> Value {
        json!({
            "ret": ["SUCCESS::调用成功"],
            "data": {
                "trackParams": {"itemId": "42", "categoryId": 50023914},
                "itemDO": {
                    "title": "  Vintage camera ",
                    "soldPrice": "120",
                    "browseCnt": 10,
                    "wantCnt": "3",
                    "collectCnt": 1,
                    "quantity": 1,
                    "gmtCreate": 1_700_000_000_000_i64,
                    "imageInfos": [
                        {"photoSearchUrl": "https://img/a.jpg"},
                        {"url": "no-search-url"},
                        {"photoSearchUrl": "https://img/b.jpg"}
                    ]
                },
                "sellerDO": {"sellerId": 777}
            }
        })
    }

    #[test]
    fn test_parse_full_product() {
        let record = parse_product(&full_body(), URL).expect("product");
        assert_eq!(record.item_id, "42");
        assert_eq!(record.category_id, "50023914");
        assert_eq!(record.title, "Vintage camera");
        assert_eq!(record.images, vec!["https://img/a.jpg", "https://img/b.jpg"]);
        assert_eq!(record.sold_price, "120");
        assert_eq!(record.browse_count, Some(10));
        assert_eq!(record.want_count, Some(3));
        assert_eq!(record.collect_count, Some(1));
        assert_eq!(record.quantity, Some(1));
        assert_eq!(record.gmt_create, Some(1_700_000_000_000));
        assert_eq!(record.seller_id, "777");
        assert_eq!(record.url, URL);
    }

    #[test]
    fn test_partial_product_is_kept() {
        let body = json!({"data": {"itemDO": {"title": "Only a title"}}});
        let record = parse_product(&body, URL).expect("partial product");
        assert_eq!(record.title, "Only a title");
        assert!(record.item_id.is_empty());
        assert!(record.images.is_empty());
        assert_eq!(record.browse_count, None);
    }

    #[test]
    fn test_item_id_falls_back_to_item_block() {
        let body = json!({"data": {"itemDO": {"itemId": 9, "title": "x"}}});
        assert_eq!(parse_product(&body, URL).expect("product").item_id, "9");
    }

    #[test]
    fn test_missing_or_empty_item_block() {
        for body in [
            json!({}),
            json!({"data": {}}),
            json!({"data": {"itemDO": {}}}),
            json!({"data": {"itemDO": null}}),
            json!({"data": {"itemDO": []}}),
        ] {
            assert_eq!(parse_product(&body, URL), Err(EmptyProduct), "{body}");
        }
    }

    #[test]
    fn test_serialized_field_names() {
        let record = parse_product(&full_body(), URL).expect("product");
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["ITEM_ID"], "42");
        assert_eq!(value["SELLER_ID"], "777");
        assert_eq!(value["IMAGES"][1], "https://img/b.jpg");
        assert_eq!(value["URL"], URL);
    }
}
