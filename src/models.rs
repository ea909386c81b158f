use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pantry entry as owned by the pantry store.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PantryItem {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    /// Empty means "each".
    #[serde(default)]
    pub unit: String,
    pub acquired_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// One line of a recipe as submitted for completion.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IngredientRequirement {
    pub ingredient_name: String,
    /// Absent means "use all available".
    #[serde(default)]
    pub quantity: Option<f64>,
    /// Absent means "count/each".
    #[serde(default)]
    pub unit: Option<String>,
}

impl IngredientRequirement {
    pub fn new(ingredient_name: &str, quantity: Option<f64>, unit: Option<&str>) -> Self {
        Self {
            ingredient_name: ingredient_name.to_string(),
            quantity,
            unit: unit.map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AllocationResult {
    pub ingredient_name: String,
    pub item_id: String,
    pub item_name: String,
    pub previous_quantity: f64,
    pub new_quantity: f64,
    pub used_quantity: f64,
    pub unit: String,
    /// e.g. "1 cup = 236.59 ml"; empty when no conversion happened.
    pub conversion_note: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InsufficientItem {
    pub ingredient_name: String,
    pub requested_quantity: f64,
    pub available_quantity: f64,
    pub shortage: f64,
    pub unit: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct CompletionReport {
    pub message: String,
    /// Null when nothing was mutated (no history record is kept then).
    pub transaction_id: Option<String>,
    pub updated_items: Vec<AllocationResult>,
    pub missing_items: Vec<String>,
    pub insufficient_items: Vec<InsufficientItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompleteRequest {
    pub user_id: String,
    pub recipe_name: String,
    pub ingredients: Vec<IngredientRequirement>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RevertRequest {
    pub user_id: String,
    #[serde(default)]
    pub recipe_name: Option<String>,
    #[serde(default)]
    pub minutes_ago: Option<i64>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RevertedItem {
    pub item_id: String,
    pub item_name: String,
    pub quantity_restored: f64,
    pub new_quantity: f64,
    pub unit: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RevertReport {
    pub message: String,
    pub transaction_id: String,
    pub recipe_name: String,
    pub reverted_items: Vec<RevertedItem>,
    /// Items deleted from the pantry since the completion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_items: Vec<String>,
}

/// Absolute quantity write for one pantry item.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QuantityUpdate {
    pub item_id: String,
    pub new_quantity: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryEntry {
    pub item_id: String,
    pub item_name: String,
    pub unit: String,
    pub previous_quantity: f64,
    pub new_quantity: f64,
    /// new - previous; negative for consumption.
    pub delta: f64,
}

/// Append-only record of one completion, replayed backwards on revert.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryRecord {
    pub transaction_id: String,
    pub user_id: String,
    pub recipe_name: String,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverted_at: Option<DateTime<Utc>>,
}

impl HistoryRecord {
    pub fn is_reverted(&self) -> bool {
        self.reverted_at.is_some()
    }
}

/// How a revert locates its history record.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryLookup {
    TransactionId(String),
    /// Most recent non-reverted record created at or after `since`,
    /// optionally restricted to one recipe (case-insensitive).
    Recent {
        recipe_name: Option<String>,
        since: DateTime<Utc>,
    },
}

impl std::fmt::Display for HistoryLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryLookup::TransactionId(id) => write!(f, "transaction {}", id),
            HistoryLookup::Recent { recipe_name: Some(name), since } => {
                write!(f, "recipe '{}' since {}", name, since.to_rfc3339())
            }
            HistoryLookup::Recent { recipe_name: None, since } => {
                write!(f, "any recipe since {}", since.to_rfc3339())
            }
        }
    }
}
