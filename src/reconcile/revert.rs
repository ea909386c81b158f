use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::models::{HistoryLookup, HistoryRecord, PantryItem, QuantityUpdate, RevertRequest, RevertReport, RevertedItem};

#[derive(Debug, Clone, PartialEq)]
pub struct RevertPlan {
    pub report: RevertReport,
    pub updates: Vec<QuantityUpdate>,
}

impl HistoryLookup {
    /// An explicit transaction id wins; otherwise the lookup is by recency
    /// inside `minutes_ago` (or the default window). A window reaching past
    /// the representable range means "any time".
    pub fn from_request(request: &RevertRequest, now: DateTime<Utc>, default_window_minutes: i64) -> Self {
        if let Some(id) = request.transaction_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return HistoryLookup::TransactionId(id.to_string());
        }
        let minutes = request.minutes_ago.unwrap_or(default_window_minutes).max(0);
        let since = Duration::try_minutes(minutes)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        HistoryLookup::Recent {
            recipe_name: request
                .recipe_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            since,
        }
    }
}

/// Picks the record a lookup refers to. Reverted records are never returned,
/// which is what makes a second revert of the same id a not-found.
pub fn find_revertible<'a>(history: &'a [HistoryRecord], lookup: &HistoryLookup) -> Option<&'a HistoryRecord> {
    let mut live = history.iter().filter(|record| !record.is_reverted());
    match lookup {
        HistoryLookup::TransactionId(id) => live.find(|record| &record.transaction_id == id),
        HistoryLookup::Recent { recipe_name, since } => live
            .filter(|record| record.created_at >= *since)
            .filter(|record| {
                recipe_name
                    .as_ref()
                    .map_or(true, |name| record.recipe_name.trim().eq_ignore_ascii_case(name))
            })
            .max_by_key(|record| record.created_at),
    }
}

/// Replays a record's entries backwards over the current pantry.
///
/// An item still holding the quantity the completion left behind gets its
/// previous quantity back verbatim; an item changed since then gets the
/// delta re-added instead. Deleted items are skipped.
pub fn plan_revert(record: &HistoryRecord, snapshot: &[PantryItem]) -> RevertPlan {
    let mut working = snapshot.to_vec();
    let mut skipped = Vec::new();

    for entry in record.entries.iter().rev() {
        let Some(index) = working.iter().position(|item| item.id == entry.item_id) else {
            warn!(item_id = %entry.item_id, item = %entry.item_name, "item no longer in pantry; skipping");
            if !skipped.contains(&entry.item_name) {
                skipped.push(entry.item_name.clone());
            }
            continue;
        };

        let item = &mut working[index];
        item.quantity = if item.quantity.to_bits() == entry.new_quantity.to_bits() {
            entry.previous_quantity
        } else {
            (item.quantity - entry.delta).max(0.0)
        };
    }

    // report in the order the completion touched the items
    let mut touched: Vec<usize> = Vec::new();
    for entry in &record.entries {
        if let Some(index) = working.iter().position(|item| item.id == entry.item_id) {
            if !touched.contains(&index) {
                touched.push(index);
            }
        }
    }

    let reverted_items: Vec<RevertedItem> = touched
        .iter()
        .map(|&index| RevertedItem {
            item_id: working[index].id.clone(),
            item_name: working[index].name.clone(),
            quantity_restored: working[index].quantity - snapshot[index].quantity,
            new_quantity: working[index].quantity,
            unit: working[index].unit.clone(),
        })
        .collect();
    let updates = touched
        .iter()
        .map(|&index| QuantityUpdate {
            item_id: working[index].id.clone(),
            new_quantity: working[index].quantity,
        })
        .collect();

    let mut message = format!(
        "Reverted recipe '{}': restored {} pantry item(s)",
        record.recipe_name,
        reverted_items.len()
    );
    if !skipped.is_empty() {
        message.push_str(&format!(" ({} no longer in pantry)", skipped.len()));
    }

    RevertPlan {
        report: RevertReport {
            message,
            transaction_id: record.transaction_id.clone(),
            recipe_name: record.recipe_name.clone(),
            reverted_items,
            skipped_items: skipped,
        },
        updates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistoryEntry;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 18, 30, 0).unwrap()
    }

    fn pantry_item(id: &str, quantity: f64) -> PantryItem {
        PantryItem {
            id: id.to_string(),
            name: id.to_uppercase(),
            quantity,
            unit: "g".to_string(),
            acquired_at: now() - Duration::days(3),
            expires_at: None,
        }
    }

    fn entry(id: &str, previous: f64, new: f64) -> HistoryEntry {
        HistoryEntry {
            item_id: id.to_string(),
            item_name: id.to_uppercase(),
            unit: "g".to_string(),
            previous_quantity: previous,
            new_quantity: new,
            delta: new - previous,
        }
    }

    fn record(id: &str, recipe: &str, minutes_old: i64, entries: Vec<HistoryEntry>) -> HistoryRecord {
        HistoryRecord {
            transaction_id: id.to_string(),
            user_id: "user-1".to_string(),
            recipe_name: recipe.to_string(),
            created_at: now() - Duration::minutes(minutes_old),
            entries,
            reverted_at: None,
        }
    }

    #[test]
    fn test_exact_restore_when_untouched() {
        let previous = 453.592;
        let new = previous - 146.408;
        let rec = record("tx", "Pasta", 1, vec![entry("pasta", previous, new)]);
        let plan = plan_revert(&rec, &[pantry_item("pasta", new)]);

        assert_eq!(plan.updates[0].new_quantity.to_bits(), previous.to_bits());
        assert_eq!(plan.report.reverted_items[0].new_quantity, previous);
    }

    #[test]
    fn test_delta_reapplied_when_item_changed_since() {
        let rec = record("tx", "Soup", 1, vec![entry("stock", 1000.0, 500.0)]);
        // user added 250 ml after cooking
        let plan = plan_revert(&rec, &[pantry_item("stock", 750.0)]);
        assert_eq!(plan.updates[0].new_quantity, 1250.0);
        assert_eq!(plan.report.reverted_items[0].quantity_restored, 500.0);
    }

    #[test]
    fn test_repeated_item_replayed_backwards() {
        let rec = record("tx", "Salad", 1, vec![entry("oil", 100.0, 40.0), entry("oil", 40.0, 0.0)]);
        let plan = plan_revert(&rec, &[pantry_item("oil", 0.0)]);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].new_quantity, 100.0);
        assert_eq!(plan.report.reverted_items[0].quantity_restored, 100.0);
    }

    #[test]
    fn test_deleted_items_skipped() {
        let rec = record("tx", "Cake", 1, vec![entry("flour", 500.0, 0.0), entry("sugar", 200.0, 100.0)]);
        let plan = plan_revert(&rec, &[pantry_item("sugar", 100.0)]);
        assert_eq!(plan.report.skipped_items, vec!["FLOUR"]);
        assert_eq!(plan.report.reverted_items.len(), 1);
        assert!(plan.report.message.contains("1 no longer in pantry"));
    }

    #[test]
    fn test_lookup_by_id_ignores_reverted() {
        let mut reverted = record("tx-1", "Pasta", 5, vec![]);
        reverted.reverted_at = Some(now());
        let history = vec![reverted, record("tx-2", "Pasta", 2, vec![])];

        let by_id = |id: &str| find_revertible(&history, &HistoryLookup::TransactionId(id.to_string()));
        assert!(by_id("tx-1").is_none());
        assert_eq!(by_id("tx-2").map(|r| r.transaction_id.as_str()), Some("tx-2"));
        assert!(by_id("tx-3").is_none());
    }

    #[test]
    fn test_lookup_by_recency_and_window() {
        let history = vec![
            record("old", "Pasta", 90, vec![]),
            record("recent", "pasta ", 10, vec![]),
            record("other", "Curry", 5, vec![]),
        ];
        let request = |recipe: Option<&str>, minutes: Option<i64>| RevertRequest {
            user_id: "user-1".to_string(),
            recipe_name: recipe.map(str::to_string),
            minutes_ago: minutes,
            transaction_id: None,
        };
        let find = |req: RevertRequest| {
            let lookup = HistoryLookup::from_request(&req, now(), 60);
            find_revertible(&history, &lookup).map(|r| r.transaction_id.clone())
        };

        assert_eq!(find(request(Some("PASTA"), None)), Some("recent".to_string()));
        assert_eq!(find(request(Some("Pasta"), Some(5))), None);
        assert_eq!(find(request(Some("Pasta"), Some(120))), Some("recent".to_string()));
        assert_eq!(find(request(None, None)), Some("other".to_string()));
        assert_eq!(find(request(Some("Tacos"), None)), None);
    }

    #[test]
    fn test_huge_window_covers_all_history() {
        let history = vec![record("ancient", "Pasta", 60 * 24 * 365 * 50, vec![])];
        for minutes in [i64::MAX, 1_000_000_000_000] {
            let req = RevertRequest {
                user_id: "user-1".to_string(),
                recipe_name: Some("Pasta".to_string()),
                minutes_ago: Some(minutes),
                transaction_id: None,
            };
            let lookup = HistoryLookup::from_request(&req, now(), 60);
            assert_eq!(
                lookup,
                HistoryLookup::Recent { recipe_name: Some("Pasta".to_string()), since: DateTime::<Utc>::MIN_UTC }
            );
            assert_eq!(find_revertible(&history, &lookup).map(|r| r.transaction_id.as_str()), Some("ancient"));
        }

        let from_default = HistoryLookup::from_request(&RevertRequest::default(), now(), i64::MAX);
        assert!(matches!(from_default, HistoryLookup::Recent { since, .. } if since == DateTime::<Utc>::MIN_UTC));
    }

    #[test]
    fn test_transaction_id_takes_precedence() {
        let req = RevertRequest {
            user_id: "u".to_string(),
            recipe_name: Some("Pasta".to_string()),
            minutes_ago: Some(5),
            transaction_id: Some(" tx-9 ".to_string()),
        };
        assert_eq!(
            HistoryLookup::from_request(&req, now(), 60),
            HistoryLookup::TransactionId("tx-9".to_string())
        );
    }
}
