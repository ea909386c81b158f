use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::path::Path;

use super::registry::{UnitCategory, UnitDefinition};

const SYMBOL_COL: &str = "symbol";
const CATEGORY_COL: &str = "category";
const FACTOR_COL: &str = "factor";
const ALIASES_COL: &str = "aliases";

/// Loads extra unit definitions from a CSV file with the columns
/// `symbol,category,factor,aliases`. Aliases are `|`-separated and optional.
pub fn load_unit_table(csv_path: &Path) -> Result<Vec<UnitDefinition>> {
    if !csv_path.exists() {
        return Err(anyhow::anyhow!("Unit table not found at: {:?}", csv_path));
    }

    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open unit table at {:?}", csv_path))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(file);

    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow::anyhow!("Column '{}' not found", name))
    };
    let symbol_idx = column(SYMBOL_COL)?;
    let category_idx = column(CATEGORY_COL)?;
    let factor_idx = column(FACTOR_COL)?;
    // Aliases are optional as a whole column.
    let aliases_idx = column(ALIASES_COL).ok();

    let mut definitions = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read unit row {}", row_index))?;

        let symbol = record.get(symbol_idx).unwrap_or_default().to_string();
        if symbol.is_empty() {
            continue;
        }
        let category = record
            .get(category_idx)
            .unwrap_or_default()
            .parse::<UnitCategory>()
            .map_err(|e: String| anyhow::anyhow!("Row {}: {}", row_index, e))?;
        let factor = record
            .get(factor_idx)
            .unwrap_or_default()
            .parse::<f64>()
            .with_context(|| format!("Row {}: invalid factor for unit '{}'", row_index, symbol))?;
        if !(factor.is_finite() && factor > 0.0) {
            return Err(anyhow::anyhow!(
                "Row {}: factor for unit '{}' must be positive, got {}",
                row_index,
                symbol,
                factor
            ));
        }
        let aliases = aliases_idx
            .and_then(|idx| record.get(idx))
            .map(|raw| {
                raw.split('|')
                    .map(str::trim)
                    .filter(|alias| !alias.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        definitions.push(UnitDefinition { symbol, category, factor, aliases });
    }

    if definitions.is_empty() {
        return Err(anyhow::anyhow!("No unit definitions loaded from {:?}", csv_path));
    }

    Ok(definitions)
}
