//! Key-driven walks over search-service responses.
//!
//! Responses have no fixed schema, so both walks treat the payload as a
//! tree of maps, sequences and scalars. Depth is bounded explicitly.

use serde_json::Value;

use crate::error::{Result, RollupError};

pub const DEFAULT_MAX_DEPTH: usize = 64;

fn too_deep(max_depth: usize) -> RollupError {
    RollupError::Parse(format!("record nested deeper than {} levels", max_depth))
}

/// Every value stored under `key`, in discovery order.
///
/// A matched value is collected as-is and not searched further.
pub fn collect_values<'a>(data: &'a Value, key: &str, max_depth: usize) -> Result<Vec<&'a Value>> {
    fn walk<'a>(
        data: &'a Value,
        key: &str,
        depth: usize,
        max_depth: usize,
        out: &mut Vec<&'a Value>,
    ) -> Result<()> {
        if depth > max_depth {
            return Err(too_deep(max_depth));
        }
        match data {
            Value::Object(map) => {
                for (k, v) in map {
                    if k == key {
                        out.push(v);
                    } else {
                        walk(v, key, depth + 1, max_depth, out)?;
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    walk(item, key, depth + 1, max_depth, out)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    let mut out = Vec::new();
    walk(data, key, 0, max_depth, &mut out)?;
    Ok(out)
}

/// String values stored under `key`. Non-string values are skipped.
pub fn collect_strings(data: &Value, key: &str, max_depth: usize) -> Result<Vec<String>> {
    Ok(collect_values(data, key, max_depth)?
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            other => {
                tracing::debug!(action = "skip", component = "fqdn_extractor", value = %other, "Non-string field value");
                None
            }
        })
        .collect())
}

/// The value under `key` closest to the end of the payload.
///
/// Maps are searched in key order, sequences from the back, so for a
/// search response this lands on the last hit's `sort` array.
pub fn find_last_value<'a>(data: &'a Value, key: &str, max_depth: usize) -> Result<Option<&'a Value>> {
    fn walk<'a>(data: &'a Value, key: &str, depth: usize, max_depth: usize) -> Result<Option<&'a Value>> {
        if depth > max_depth {
            return Err(too_deep(max_depth));
        }
        match data {
            Value::Object(map) => {
                for (k, v) in map {
                    if k == key {
                        return Ok(Some(v));
                    }
                    if v.is_object() || v.is_array() {
                        if let Some(found) = walk(v, key, depth + 1, max_depth)? {
                            return Ok(Some(found));
                        }
                    }
                }
                Ok(None)
            }
            Value::Array(items) => {
                for item in items.iter().rev() {
                    if let Some(found) = walk(item, key, depth + 1, max_depth)? {
                        return Ok(Some(found));
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    walk(data, key, 0, max_depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page() -> Value {
        json!({
            "pit_id": "abc",
            "hits": {
                "total": {"value": 2},
                "hits": [
                    {"_source": {"dns": {"fqdn": "a.example.com"}}, "sort": ["2024-01-01T00:00:00Z", 1]},
                    {"_source": {"dns": {"fqdn": "b.example.com"}}, "sort": ["2024-01-01T00:00:05Z", 2]}
                ]
            }
        })
    }

    #[test]
    fn collects_in_discovery_order() {
        let data = page();
        let values = collect_strings(&data, "fqdn", DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(values, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn skips_non_string_values() {
        let data = json!([{"fqdn": 7}, {"fqdn": "x.example.org"}, {"fqdn": null}]);
        assert_eq!(collect_values(&data, "fqdn", 8).unwrap().len(), 3);
        assert_eq!(collect_strings(&data, "fqdn", 8).unwrap(), vec!["x.example.org"]);
    }

    #[test]
    fn matched_value_is_not_descended() {
        let data = json!({"fqdn": {"fqdn": "inner"}});
        let values = collect_values(&data, "fqdn", 8).unwrap();
        assert_eq!(values.len(), 1);
        assert!(values[0].is_object());
    }

    #[test]
    fn finds_cursor_of_last_hit() {
        let data = page();
        let cursor = find_last_value(&data, "sort", DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(cursor, Some(&json!(["2024-01-01T00:00:05Z", 2])));
    }

    #[test]
    fn empty_page_has_no_cursor() {
        let data = json!({"hits": {"total": {"value": 0}, "hits": []}});
        assert_eq!(find_last_value(&data, "sort", DEFAULT_MAX_DEPTH).unwrap(), None);
    }

    #[test]
    fn depth_guard_returns_parse_error() {
        let mut data = json!("leaf");
        for _ in 0..20 {
            data = json!([data]);
        }
        assert!(matches!(
            collect_values(&data, "fqdn", 10),
            Err(RollupError::Parse(_))
        ));
        assert!(matches!(
            find_last_value(&data, "sort", 10),
            Err(RollupError::Parse(_))
        ));
        assert!(collect_values(&data, "fqdn", 32).is_ok());
    }
}
