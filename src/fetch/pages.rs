// src/fetch/pages.rs

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::transport::{get_json_with_retry, RetryPolicy, Transport};
use crate::error::FetchError;

/// The `{page, pages}` header of a paged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub page: u64,
    pub pages: u64,
}

impl PageMeta {
    /// Read `page`/`pages` as numbers or numeric strings; absent values read as 1.
    pub fn from_value(meta: &Value) -> Self {
        let read = |key: &str| {
            meta.get(key)
                .and_then(|v| match v {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                })
                .unwrap_or(1)
        };
        Self {
            page: read("page"),
            pages: read("pages"),
        }
    }

    pub fn is_last(&self) -> bool {
        self.page >= self.pages
    }
}

/// Split a `[metadata, items, ...]` body. `None` means "no data".
fn split_page(url: &str, body: Value) -> Option<(PageMeta, Vec<Value>)> {
    let Value::Array(mut parts) = body else {
        warn!(%url, "response is not a JSON array; treating as no data");
        return None;
    };
    if parts.len() < 2 {
        if let Some(message) = parts.first().and_then(|m| m.get("message")) {
            warn!(%url, %message, "source API returned an error envelope");
        }
        return None;
    }
    let items = match parts.swap_remove(1) {
        Value::Array(items) => items,
        _ => Vec::new(),
    };
    Some((PageMeta::from_value(&parts[0]), items))
}

/// Fetch every page of a paged collection and return the items in page order.
///
/// Stops on an empty or missing items section, on a response that has no
/// items section at all, or once the reported page reaches the page count.
#[instrument(level = "info", skip(transport, policy, params))]
pub fn fetch_all_pages<T: Transport + ?Sized>(
    transport: &T,
    policy: &RetryPolicy,
    url: &str,
    params: &[(&str, String)],
    per_page: usize,
) -> Result<Vec<Value>, FetchError> {
    let mut out = Vec::new();
    let mut page: u64 = 1;

    loop {
        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("per_page", per_page.to_string()));
        query.push(("page", page.to_string()));

        let body = get_json_with_retry(transport, policy, url, &query)?;
        let Some((meta, items)) = split_page(url, body) else {
            debug!(page, "no data section; stopping");
            break;
        };
        if items.is_empty() {
            debug!(page, "empty page; stopping");
            break;
        }

        debug!(page = meta.page, pages = meta.pages, items = items.len(), "page received");
        out.extend(items);

        if meta.is_last() {
            break;
        }
        page += 1;
    }

    info!(items = out.len(), pages = page, "pagination complete");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{Reply, ScriptedTransport};
    use serde_json::json;
    use std::time::Duration;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    fn page(n: u64, pages: u64, items: Value) -> Reply {
        Reply::Json(json!([{ "page": n, "pages": pages, "per_page": 2 }, items]))
    }

    #[test]
    fn collects_all_pages_in_order() {
        let t = ScriptedTransport::new().on(
            "/things",
            vec![
                page(1, 3, json!([{"id": 1}, {"id": 2}])),
                page(2, 3, json!([{"id": 3}])),
                page(3, 3, json!([{"id": 4}, {"id": 5}])),
            ],
        );
        let items =
            fetch_all_pages(&t, &fast(), "http://api/things", &[("format", "json".into())], 2)
                .unwrap();
        let ids: Vec<i64> = items.iter().map(|v| v["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let calls = t.calls();
        assert_eq!(calls.len(), 3);
        let pages: Vec<&str> = calls.iter().map(|c| c.param("page").unwrap()).collect();
        assert_eq!(pages, vec!["1", "2", "3"]);
        assert!(calls.iter().all(|c| c.param("per_page") == Some("2")));
        assert!(calls.iter().all(|c| c.param("format") == Some("json")));
    }

    #[test]
    fn empty_items_stop_regardless_of_metadata() {
        let t = ScriptedTransport::new().on(
            "/things",
            vec![page(1, 5, json!([{"id": 1}])), page(2, 5, json!([]))],
        );
        let items = fetch_all_pages(&t, &fast(), "http://api/things", &[], 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(t.call_count(), 2);
    }

    #[test]
    fn null_items_and_short_responses_mean_no_data() {
        let t = ScriptedTransport::new().on("/a", vec![page(1, 1, Value::Null)]);
        assert!(fetch_all_pages(&t, &fast(), "http://api/a", &[], 10)
            .unwrap()
            .is_empty());

        let envelope = json!([{ "message": [{ "id": "120", "value": "Invalid value" }] }]);
        let t = ScriptedTransport::new().on("/b", vec![Reply::Json(envelope)]);
        assert!(fetch_all_pages(&t, &fast(), "http://api/b", &[], 10)
            .unwrap()
            .is_empty());
        assert_eq!(t.call_count(), 1);
    }

    #[test]
    fn string_metadata_is_accepted() {
        let meta = PageMeta::from_value(&json!({ "page": "2", "pages": "2" }));
        assert_eq!(meta, PageMeta { page: 2, pages: 2 });
        assert!(meta.is_last());
        assert_eq!(PageMeta::from_value(&json!({})), PageMeta { page: 1, pages: 1 });
    }

    #[test]
    fn fetch_failure_propagates() {
        let t = ScriptedTransport::new().on("/things", vec![Reply::Status(500)]);
        let err = fetch_all_pages(&t, &fast(), "http://api/things", &[], 10).unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { attempts: 2, .. }));
    }
}
