use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

use crate::models::PantryItem;

const ID_COL: &str = "id";
const NAME_COL: &str = "name";
const QUANTITY_COL: &str = "quantity";
const UNIT_COL: &str = "unit";
const ACQUIRED_COL: &str = "acquired_at";
const EXPIRES_COL: &str = "expires_at";

/// Accepts RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid timestamp '{}'", raw))?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow::anyhow!("invalid timestamp '{}'", raw))
}

/// Reads pantry items from a CSV with the columns
/// `id,name,quantity,unit,acquired_at,expires_at`.
///
/// Only `name` and `quantity` are required. A blank id gets a fresh UUID and a
/// blank `acquired_at` is taken as `imported_at`.
pub fn load_pantry_csv(csv_path: &Path, imported_at: DateTime<Utc>) -> Result<Vec<PantryItem>> {
    if !csv_path.exists() {
        return Err(anyhow::anyhow!("Pantry CSV file not found at: {:?}", csv_path));
    }

    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open pantry CSV file at {:?}", csv_path))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(file);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let name_idx = column(NAME_COL).ok_or_else(|| anyhow::anyhow!("Column '{}' not found", NAME_COL))?;
    let quantity_idx =
        column(QUANTITY_COL).ok_or_else(|| anyhow::anyhow!("Column '{}' not found", QUANTITY_COL))?;
    let id_idx = column(ID_COL);
    let unit_idx = column(UNIT_COL);
    let acquired_idx = column(ACQUIRED_COL);
    let expires_idx = column(EXPIRES_COL);

    let mut items = Vec::new();
    let mut seen_ids = HashSet::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read pantry row {}", row_index))?;
        let optional = |idx: Option<usize>| idx.and_then(|i| record.get(i)).filter(|v| !v.is_empty());

        let name = record.get(name_idx).unwrap_or_default().to_string();
        if name.is_empty() {
            continue;
        }

        let quantity = record
            .get(quantity_idx)
            .unwrap_or_default()
            .parse::<f64>()
            .with_context(|| format!("Row {}: invalid quantity for '{}'", row_index, name))?;
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(anyhow::anyhow!(
                "Row {}: quantity for '{}' must be a non-negative number, got {}",
                row_index,
                name,
                quantity
            ));
        }

        let acquired_at = match optional(acquired_idx) {
            Some(raw) => parse_timestamp(raw).with_context(|| format!("Row {}: acquired_at", row_index))?,
            None => imported_at,
        };
        let expires_at = optional(expires_idx)
            .map(parse_timestamp)
            .transpose()
            .with_context(|| format!("Row {}: expires_at", row_index))?;

        let id = optional(id_idx).map(str::to_string).unwrap_or_else(|| Uuid::new_v4().to_string());
        if !seen_ids.insert(id.clone()) {
            return Err(anyhow::anyhow!("Row {}: duplicate item id '{}'", row_index, id));
        }

        items.push(PantryItem {
            id,
            name,
            quantity,
            unit: optional(unit_idx).unwrap_or_default().to_string(),
            acquired_at,
            expires_at,
        });
    }

    if items.is_empty() {
        return Err(anyhow::anyhow!("No pantry items loaded from {:?}", csv_path));
    }

    Ok(items)
}
