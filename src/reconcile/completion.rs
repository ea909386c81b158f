use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use super::allocator::{allocate, AllocationCandidate, AllocationOutcome, AllocationRequest};
use super::converter::{to_pantry_unit, ConvertedQuantity};
use crate::error::ConversionError;
use crate::ingredient_matcher::{IngredientMatcher, ScoredCandidate, SimilarityScorer};
use crate::models::{
    AllocationResult, CompletionReport, HistoryEntry, HistoryRecord, IngredientRequirement, InsufficientItem,
    PantryItem, QuantityUpdate,
};
use crate::units::{convert_between, format_quantity, UnitRegistry};

/// Everything a completion would change, computed without touching storage.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPlan {
    pub report: CompletionReport,
    /// Final quantity of every touched item, in first-touched order.
    pub updates: Vec<QuantityUpdate>,
    /// None when nothing was consumed.
    pub record: Option<HistoryRecord>,
}

pub struct CompletionInput<'a> {
    pub transaction_id: &'a str,
    pub user_id: &'a str,
    pub recipe_name: &'a str,
    pub requirements: &'a [IngredientRequirement],
    pub snapshot: &'a [PantryItem],
    pub now: DateTime<Utc>,
}

/// Runs matcher, converter and allocator for each ingredient against a
/// working copy of the snapshot. Later ingredients see what earlier ones
/// consumed. Nothing outside the returned plan is mutated.
pub struct CompletionPlanner<'a, S: SimilarityScorer> {
    registry: &'a UnitRegistry,
    matcher: &'a IngredientMatcher<S>,
}

// Mutable state threaded through the per-ingredient passes.
struct Working {
    items: Vec<PantryItem>,
    report: CompletionReport,
    entries: Vec<HistoryEntry>,
    touched: Vec<usize>,
}

impl<'a, S: SimilarityScorer> CompletionPlanner<'a, S> {
    pub fn new(registry: &'a UnitRegistry, matcher: &'a IngredientMatcher<S>) -> Self {
        Self { registry, matcher }
    }

    pub fn plan(&self, input: CompletionInput<'_>) -> CompletionPlan {
        let mut working = Working {
            items: input.snapshot.to_vec(),
            report: CompletionReport::default(),
            entries: Vec::new(),
            touched: Vec::new(),
        };

        for requirement in input.requirements {
            self.plan_ingredient(requirement, &mut working);
        }

        let Working { items, mut report, entries, touched } = working;

        let updates: Vec<QuantityUpdate> = touched
            .iter()
            .map(|&index| QuantityUpdate {
                item_id: items[index].id.clone(),
                new_quantity: items[index].quantity,
            })
            .collect();

        let record = if entries.is_empty() {
            None
        } else {
            report.transaction_id = Some(input.transaction_id.to_string());
            Some(HistoryRecord {
                transaction_id: input.transaction_id.to_string(),
                user_id: input.user_id.to_string(),
                recipe_name: input.recipe_name.to_string(),
                created_at: input.now,
                entries,
                reverted_at: None,
            })
        };
        report.message = completion_message(input.recipe_name, &report);

        CompletionPlan { report, updates, record }
    }

    fn plan_ingredient(&self, requirement: &IngredientRequirement, working: &mut Working) {
        let name = requirement.ingredient_name.trim();
        if name.is_empty() {
            working.report.warnings.push("Skipped an ingredient with an empty name".to_string());
            return;
        }

        let ranked = self.matcher.rank(name, &working.items);
        if ranked.is_empty() {
            debug!(ingredient = name, "no pantry item cleared the match threshold");
            working.report.missing_items.push(name.to_string());
            return;
        }
        debug!(ingredient = name, candidates = ranked.len(), "matched");

        match requirement.quantity {
            None => self.drain_best_match(name, &ranked, working),
            Some(quantity) if quantity == 0.0 => {
                debug!(ingredient = name, "zero quantity requested; nothing to consume");
            }
            Some(_) => self.allocate_quantity(name, requirement, &ranked, working),
        }
    }

    fn drain_best_match(&self, name: &str, ranked: &[ScoredCandidate], working: &mut Working) {
        let candidates: Vec<AllocationCandidate> = ranked
            .iter()
            .map(|scored| candidate_for(&working.items[scored.index], scored.index, 1.0))
            .collect();

        let outcome = allocate(AllocationRequest::UseAllAvailable, &candidates);
        if outcome.draws.is_empty() {
            working
                .report
                .warnings
                .push(format!("'{}' matched pantry items but none has any quantity left", name));
            return;
        }
        apply_outcome(name, &outcome, &HashMap::new(), working);
    }

    fn allocate_quantity(
        &self,
        name: &str,
        requirement: &IngredientRequirement,
        ranked: &[ScoredCandidate],
        working: &mut Working,
    ) {
        let mut candidates = Vec::new();
        let mut notes = HashMap::new();
        let mut common = None;
        let mut first_error: Option<ConversionError> = None;

        for scored in ranked {
            let item = &working.items[scored.index];
            let converted = self
                .registry
                .resolve(&item.unit)
                .and_then(|item_unit| Ok((item_unit, to_pantry_unit(self.registry, requirement, item)?)));
            let (item_unit, converted) = match converted {
                Ok(pair) => pair,
                Err(err) => {
                    debug!(ingredient = name, item = %item.name, error = %err, "candidate skipped");
                    first_error.get_or_insert(err);
                    continue;
                }
            };

            // The first convertible candidate fixes the common unit.
            let (common_unit, _) = *common.get_or_insert((item_unit, converted.quantity().unwrap_or(0.0)));
            let to_common = match convert_between(1.0, item_unit, common_unit) {
                Ok(factor) => factor,
                Err(err) => {
                    first_error.get_or_insert(err);
                    continue;
                }
            };

            if let ConvertedQuantity::Amount { note, .. } = converted {
                notes.insert(scored.index, note);
            }
            candidates.push(candidate_for(item, scored.index, to_common));
        }

        let Some((common_unit, required)) = common else {
            let reason = first_error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no convertible pantry item".to_string());
            working
                .report
                .warnings
                .push(format!("'{}' matched pantry items but cannot be measured against them: {}", name, reason));
            working.report.missing_items.push(name.to_string());
            return;
        };

        let outcome = allocate(AllocationRequest::Quantity(required), &candidates);
        apply_outcome(name, &outcome, &notes, working);

        if outcome.shortage > 0.0 {
            debug!(ingredient = name, shortage = outcome.shortage, unit = %common_unit.symbol, "insufficient");
            working.report.insufficient_items.push(InsufficientItem {
                ingredient_name: name.to_string(),
                requested_quantity: required,
                available_quantity: outcome.available,
                shortage: outcome.shortage,
                unit: common_unit.symbol.clone(),
            });
        }
    }
}

fn candidate_for(item: &PantryItem, index: usize, to_common: f64) -> AllocationCandidate {
    AllocationCandidate {
        index,
        item_id: item.id.clone(),
        quantity: item.quantity,
        to_common,
        acquired_at: item.acquired_at,
    }
}

fn apply_outcome(name: &str, outcome: &AllocationOutcome, notes: &HashMap<usize, String>, working: &mut Working) {
    for draw in outcome.draws.iter().filter(|draw| draw.used_quantity > 0.0) {
        let item = &mut working.items[draw.index];
        item.quantity = draw.new_quantity;

        working.report.updated_items.push(AllocationResult {
            ingredient_name: name.to_string(),
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            previous_quantity: draw.previous_quantity,
            new_quantity: draw.new_quantity,
            used_quantity: draw.used_quantity,
            unit: item.unit.clone(),
            conversion_note: notes.get(&draw.index).cloned().unwrap_or_default(),
        });
        working.entries.push(HistoryEntry {
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            unit: item.unit.clone(),
            previous_quantity: draw.previous_quantity,
            new_quantity: draw.new_quantity,
            delta: draw.new_quantity - draw.previous_quantity,
        });
        if !working.touched.contains(&draw.index) {
            working.touched.push(draw.index);
        }
    }
}

fn completion_message(recipe_name: &str, report: &CompletionReport) -> String {
    if report.updated_items.is_empty() {
        return format!("No pantry items were used for recipe '{}'", recipe_name);
    }

    let mut message = format!(
        "Completed recipe '{}': updated {} pantry item(s)",
        recipe_name,
        report.updated_items.len()
    );
    let mut partial = Vec::new();
    if !report.missing_items.is_empty() {
        partial.push(format!("{} missing", report.missing_items.len()));
    }
    if !report.insufficient_items.is_empty() {
        let shortages: Vec<String> = report
            .insufficient_items
            .iter()
            .map(|i| format!("{} short by {} {}", i.ingredient_name, format_quantity(i.shortage), i.unit))
            .collect();
        partial.push(shortages.join(", "));
    }
    if !partial.is_empty() {
        message.push_str(&format!(" (partially fulfilled: {})", partial.join("; ")));
    }
    message
}
