use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::ConversionError;

/// Symbol used when a requirement or pantry item carries no unit at all.
pub const COUNT_SYMBOL: &str = "each";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    /// Base unit: grams
    Mass,
    /// Base unit: milliliters
    Volume,
    /// Base unit: one item
    Count,
}

impl fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitCategory::Mass => "mass",
            UnitCategory::Volume => "volume",
            UnitCategory::Count => "count",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for UnitCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mass" | "weight" => Ok(UnitCategory::Mass),
            "volume" => Ok(UnitCategory::Volume),
            "count" => Ok(UnitCategory::Count),
            other => Err(format!("unknown unit category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDefinition {
    pub symbol: String,
    pub category: UnitCategory,
    /// Multiplier from this unit to the category base unit.
    pub factor: f64,
    pub aliases: Vec<String>,
}

impl UnitDefinition {
    pub fn new(symbol: &str, category: UnitCategory, factor: f64, aliases: &[&str]) -> Self {
        Self {
            symbol: symbol.to_string(),
            category,
            factor,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Canonical unit table with alias lookup.
///
/// Lookups are case-insensitive, ignore dots and repeated whitespace
/// ("fl. oz" == "fl oz"), and fall back to the singular form of a plural
/// ("Tablespoons" -> "tablespoon", "pinches" -> "pinch").
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    definitions: Vec<UnitDefinition>,
    index: HashMap<String, usize>,
}

impl UnitRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Metric and US customary mass/volume units plus the count units.
    pub fn standard() -> Self {
        use UnitCategory::*;

        let mut registry = Self::empty();
        registry.extend(vec![
            // Mass (grams)
            UnitDefinition::new("mg", Mass, 0.001, &["milligram", "milligramme"]),
            UnitDefinition::new("g", Mass, 1.0, &["gram", "gramme", "grm"]),
            UnitDefinition::new("kg", Mass, 1000.0, &["kilogram", "kilogramme", "kilo", "kgs"]),
            UnitDefinition::new("oz", Mass, 28.349523125, &["ounce", "ozs"]),
            UnitDefinition::new("lb", Mass, 453.59237, &["pound", "lbs"]),
            // Volume (milliliters)
            UnitDefinition::new("ml", Volume, 1.0, &["milliliter", "millilitre", "cc", "mls"]),
            UnitDefinition::new("cl", Volume, 10.0, &["centiliter", "centilitre"]),
            UnitDefinition::new("dl", Volume, 100.0, &["deciliter", "decilitre"]),
            UnitDefinition::new("l", Volume, 1000.0, &["liter", "litre", "lt", "ltr"]),
            UnitDefinition::new("tsp", Volume, 4.92892159375, &["teaspoon", "tspn", "tsps"]),
            UnitDefinition::new(
                "tbsp",
                Volume,
                14.78676478125,
                &["tablespoon", "tbs", "tbl", "tbsps", "tblsp"],
            ),
            UnitDefinition::new("pinch", Volume, 0.308057599609375, &[]),
            UnitDefinition::new("dash", Volume, 0.61611519921875, &[]),
            UnitDefinition::new("fl oz", Volume, 29.5735295625, &["fluid ounce", "floz", "fl ounce"]),
            UnitDefinition::new("cup", Volume, 236.5882365, &["c"]),
            UnitDefinition::new("pint", Volume, 473.176473, &["pt", "pts"]),
            UnitDefinition::new("quart", Volume, 946.352946, &["qt", "qts"]),
            UnitDefinition::new("gallon", Volume, 3785.411784, &["gal", "gals"]),
            // Count (items)
            UnitDefinition::new(
                COUNT_SYMBOL,
                Count,
                1.0,
                &[
                    "ea", "piece", "pc", "pcs", "whole", "item", "unit", "count", "x", "clove",
                    "slice", "can", "package", "pack", "bunch", "head", "stalk", "sprig",
                ],
            ),
            UnitDefinition::new("dozen", Count, 12.0, &["dz", "doz"]),
        ]);
        registry
    }

    /// Adds definitions, replacing any earlier definition with the same
    /// symbol and re-pointing aliases to the newest definition.
    pub fn extend(&mut self, definitions: impl IntoIterator<Item = UnitDefinition>) {
        for definition in definitions {
            let symbol_key = normalize_unit_text(&definition.symbol);
            let slot = match self.index.get(&symbol_key) {
                Some(&existing) if self.definitions[existing].symbol == definition.symbol => {
                    self.definitions[existing] = definition.clone();
                    existing
                }
                _ => {
                    self.definitions.push(definition.clone());
                    self.definitions.len() - 1
                }
            };
            self.index.insert(symbol_key, slot);
            for alias in &definition.aliases {
                self.index.insert(normalize_unit_text(alias), slot);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> &[UnitDefinition] {
        &self.definitions
    }

    /// Resolves free unit text. Blank text means "count/each".
    pub fn resolve(&self, unit_text: &str) -> Result<&UnitDefinition, ConversionError> {
        let key = normalize_unit_text(unit_text);
        let key = if key.is_empty() { COUNT_SYMBOL.to_string() } else { key };

        let singular_candidates = [
            Some(key.clone()),
            key.strip_suffix('s').map(str::to_string),
            key.strip_suffix("es").map(str::to_string),
        ];
        singular_candidates
            .iter()
            .flatten()
            .filter(|candidate| !candidate.is_empty())
            .find_map(|candidate| self.index.get(candidate))
            .map(|&slot| &self.definitions[slot])
            .ok_or_else(|| ConversionError::UnknownUnit(unit_text.trim().to_string()))
    }

    /// Same as [`resolve`](Self::resolve) with an absent unit treated as count.
    pub fn resolve_optional(&self, unit_text: Option<&str>) -> Result<&UnitDefinition, ConversionError> {
        self.resolve(unit_text.unwrap_or(""))
    }

    pub fn convert(&self, quantity: f64, from_unit: &str, to_unit: &str) -> Result<f64, ConversionError> {
        let from = self.resolve(from_unit)?;
        let to = self.resolve(to_unit)?;
        convert_between(quantity, from, to)
    }
}

/// Converts between two resolved definitions. Mass and volume never mix:
/// there is no density table on purpose.
pub fn convert_between(
    quantity: f64,
    from: &UnitDefinition,
    to: &UnitDefinition,
) -> Result<f64, ConversionError> {
    if !quantity.is_finite() {
        return Err(ConversionError::InvalidQuantity(quantity));
    }
    if from.category != to.category {
        return Err(ConversionError::IncompatibleCategory {
            from_unit: from.symbol.clone(),
            from: from.category,
            to_unit: to.symbol.clone(),
            to: to.category,
        });
    }
    if from.symbol == to.symbol {
        return Ok(quantity);
    }
    Ok(quantity * from.factor / to.factor)
}

pub fn normalize_unit_text(unit_text: &str) -> String {
    unit_text
        .to_lowercase()
        .replace('.', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders a quantity with at most two decimals and no trailing zeros.
pub fn format_quantity(quantity: f64) -> String {
    let rendered = format!("{:.2}", quantity);
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
