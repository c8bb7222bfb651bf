use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::domain::{is_countable_name, parse_count};
use crate::error::Result;
use crate::files;
use crate::stats::{AggregatedRow, MappingRow, Provider, ReferenceRow};

/// Reverse → forward lookup table. Later pairs replace earlier ones.
pub fn build_mapping(pairs: &[MappingRow]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|pair| (pair.reverse.clone(), pair.forward.clone()))
        .collect()
}

/// Swaps the name column of every mapped row for its forward name.
pub fn replace_names(rows: &mut [Vec<String>], mapping: &HashMap<String, String>) -> usize {
    let mut replaced = 0;
    for row in rows.iter_mut() {
        if let Some(name) = row.first_mut() {
            if let Some(forward) = mapping.get(name.as_str()) {
                *name = forward.clone();
                replaced += 1;
            }
        }
    }
    replaced
}

/// Sums the count column per name, in first-seen order.
///
/// A row without a count column is one occurrence. Names too short to be
/// meaningful are dropped after summing.
pub fn count_daily(rows: &[Vec<String>]) -> Vec<AggregatedRow> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, u64> = HashMap::new();

    for (line, row) in rows.iter().enumerate() {
        let Some(name) = row.first() else {
            continue;
        };
        let count = match row.get(1) {
            None => 1,
            Some(field) => match parse_count(field) {
                Some(count) => count,
                None => {
                    warn!(action = "skip", component = "daily_count", line = line + 1, name = %name, field = %field, "Count is not a number");
                    continue;
                }
            },
        };
        match totals.get_mut(name) {
            Some(total) => *total = total.saturating_add(count),
            None => {
                order.push(name.clone());
                totals.insert(name.clone(), count);
            }
        }
    }

    order
        .into_iter()
        .filter(|name| is_countable_name(name))
        .map(|name| {
            let count = totals.get(&name).copied().unwrap_or_default();
            AggregatedRow {
                name,
                count,
                provider: None,
            }
        })
        .collect()
}

/// Parses reference rows. The last column is the match key and the first
/// two are the provider name and id. Rows with fewer than two columns or
/// an empty key are skipped.
pub fn parse_reference(rows: Vec<Vec<String>>) -> Vec<ReferenceRow> {
    let mut reference = Vec::with_capacity(rows.len());
    for (line, mut row) in rows.into_iter().enumerate() {
        if row.len() < 2 {
            warn!(action = "skip", component = "reference_table", line = line + 1, "Reference row has fewer than two columns");
            continue;
        }
        let match_key = row.last().cloned().unwrap_or_default();
        if match_key.is_empty() {
            warn!(action = "skip", component = "reference_table", line = line + 1, "Reference row has an empty match key");
            continue;
        }
        row.truncate(2);
        let id = row.pop().unwrap_or_default();
        let name = row.pop().unwrap_or_default();
        reference.push(ReferenceRow {
            provider: Provider { name, id },
            match_key,
        });
    }
    reference
}

pub fn load_reference(path: &Path) -> Result<Vec<ReferenceRow>> {
    let start_time = Instant::now();
    let reference = parse_reference(files::read_rows(path)?);
    info!(
        action = "loaded",
        component = "reference_table",
        file_path = ?path,
        rows = reference.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Loaded reference table"
    );
    Ok(reference)
}

/// The first reference row, in table order, whose key occurs in `name`.
pub fn match_provider<'a>(name: &str, reference: &'a [ReferenceRow]) -> Option<&'a Provider> {
    reference
        .iter()
        .find(|r| name.contains(r.match_key.as_str()))
        .map(|r| &r.provider)
}

pub fn attach_providers(rows: &mut [AggregatedRow], reference: &[ReferenceRow]) -> usize {
    let mut matched = 0;
    for row in rows.iter_mut() {
        row.provider = match_provider(&row.name, reference).cloned();
        if row.provider.is_some() {
            matched += 1;
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    fn reference(rows: &[&[&str]]) -> Vec<ReferenceRow> {
        parse_reference(rows.iter().map(|r| row(r)).collect())
    }

    #[test]
    fn later_pairs_overwrite_earlier() {
        let mapping = build_mapping(&[
            MappingRow {
                reverse: "1.0.0.10.in-addr.arpa".into(),
                forward: "old.example.com.".into(),
            },
            MappingRow {
                reverse: "1.0.0.10.in-addr.arpa".into(),
                forward: "new.example.com.".into(),
            },
        ]);
        assert_eq!(mapping["1.0.0.10.in-addr.arpa"], "new.example.com.");
    }

    #[test]
    fn replaces_only_mapped_names() {
        let mapping = HashMap::from([(
            "10.1.1.1.in-addr.arpa".to_string(),
            "host1.example.com.".to_string(),
        )]);
        let mut rows = vec![row(&["10.1.1.1.in-addr.arpa", "4"]), row(&["www.example.com", "2"])];
        assert_eq!(replace_names(&mut rows, &mapping), 1);
        assert_eq!(rows[0], row(&["host1.example.com.", "4"]));
        assert_eq!(rows[1], row(&["www.example.com", "2"]));
    }

    #[test]
    fn counts_sum_per_name_and_drop_short_names() {
        let rows = vec![
            row(&["www.example.com", "2"]),
            row(&["abc", "50"]),
            row(&["api.example.com"]),
            row(&["www.example.com", "5"]),
            row(&["api.example.com", "oops"]),
        ];
        let counted = count_daily(&rows);
        assert_eq!(
            counted,
            vec![
                AggregatedRow {
                    name: "www.example.com".into(),
                    count: 7,
                    provider: None
                },
                AggregatedRow {
                    name: "api.example.com".into(),
                    count: 1,
                    provider: None
                },
            ]
        );
    }

    #[test]
    fn first_matching_reference_row_wins() {
        let table = reference(&[
            &["Generic Cloud", "S0", "cloud"],
            &["Acme Cloud", "S1", "acme.cloud"],
        ]);
        assert_eq!(
            match_provider("cdn.acme.cloud", &table).map(|p| p.id.as_str()),
            Some("S0")
        );
        assert_eq!(match_provider("www.example.com", &table), None);
    }

    #[test]
    fn attaches_two_columns() {
        let table = reference(&[&["Acme", "S1", "internal", "acme.net"]]);
        let mut rows = vec![
            AggregatedRow {
                name: "mail.acme.net".into(),
                count: 3,
                provider: None,
            },
            AggregatedRow {
                name: "mail.other.org".into(),
                count: 1,
                provider: None,
            },
        ];
        assert_eq!(attach_providers(&mut rows, &table), 1);
        assert_eq!(rows[0].to_record(), row(&["mail.acme.net", "3", "Acme", "S1"]));
        assert_eq!(rows[1].to_record(), row(&["mail.other.org", "1"]));
    }

    #[test]
    fn malformed_reference_rows_are_skipped() {
        let table = reference(&[&["only-one"], &["Acme", "S1", ""], &["Acme", "acme.net"]]);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].match_key, "acme.net");
        assert_eq!(table[0].provider.id, "acme.net");
    }
}
