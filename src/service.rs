use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ReconcileError;
use crate::ingredient_matcher::{IngredientMatcher, SimilarityScorer, TokenOverlapScorer};
use crate::models::{
    CompleteRequest, CompletionReport, HistoryLookup, PantryItem, RevertReport, RevertRequest,
};
use crate::reconcile::{plan_revert, CompletionInput, CompletionPlanner};
use crate::store::ledger::first_duplicate_id;
use crate::store::{PantryStore, UnitOfWork};
use crate::units::UnitRegistry;

/// Runs completions and reverts against a pantry store.
///
/// Every call takes the user's unit of work for its whole duration, plans
/// over the snapshot it sees, and commits pantry and history in one step.
pub struct PantryReconciler<S: PantryStore, M: SimilarityScorer = TokenOverlapScorer> {
    store: S,
    registry: Arc<UnitRegistry>,
    matcher: IngredientMatcher<M>,
    revert_window_minutes: i64,
}

impl<S: PantryStore> PantryReconciler<S> {
    pub fn new(store: S, registry: Arc<UnitRegistry>, match_threshold: f64, revert_window_minutes: i64) -> Self {
        Self::with_matcher(store, registry, IngredientMatcher::new(match_threshold), revert_window_minutes)
    }
}

impl<S: PantryStore, M: SimilarityScorer> PantryReconciler<S, M> {
    pub fn with_matcher(
        store: S,
        registry: Arc<UnitRegistry>,
        matcher: IngredientMatcher<M>,
        revert_window_minutes: i64,
    ) -> Self {
        Self { store, registry, matcher, revert_window_minutes }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn complete(&self, request: CompleteRequest) -> Result<CompletionReport, ReconcileError> {
        validate_complete(&request)?;

        let mut tx = self.store.begin(&request.user_id).await?;
        let snapshot = tx.load_snapshot();
        let transaction_id = Uuid::new_v4().to_string();

        let planner = CompletionPlanner::new(&self.registry, &self.matcher);
        let plan = planner.plan(CompletionInput {
            transaction_id: &transaction_id,
            user_id: &request.user_id,
            recipe_name: &request.recipe_name,
            requirements: &request.ingredients,
            snapshot: &snapshot,
            now: Utc::now(),
        });

        let Some(record) = plan.record else {
            info!(
                user_id = %request.user_id,
                recipe = %request.recipe_name,
                missing = plan.report.missing_items.len(),
                "completion changed nothing"
            );
            return Ok(plan.report);
        };

        tx.apply_deltas(&plan.updates)?;
        tx.save_history(record)?;
        self.store.commit(tx).await?;

        info!(
            user_id = %request.user_id,
            recipe = %request.recipe_name,
            transaction_id = %transaction_id,
            updated = plan.report.updated_items.len(),
            missing = plan.report.missing_items.len(),
            insufficient = plan.report.insufficient_items.len(),
            "recipe completed"
        );
        Ok(plan.report)
    }

    pub async fn revert(&self, request: RevertRequest) -> Result<RevertReport, ReconcileError> {
        if request.user_id.trim().is_empty() {
            return Err(ReconcileError::InvalidRequest("user_id must not be empty".into()));
        }
        let now = Utc::now();
        let lookup = HistoryLookup::from_request(&request, now, self.revert_window_minutes);

        let mut tx = self.store.begin(&request.user_id).await?;
        let record = tx
            .find_history(&lookup)
            .ok_or_else(|| ReconcileError::TransactionNotFound { lookup: lookup.to_string() })?;
        debug!(
            user_id = tx.user_id(),
            transaction_id = %record.transaction_id,
            entries = record.entries.len(),
            "reverting completion"
        );

        let snapshot = tx.load_snapshot();
        let plan = plan_revert(&record, &snapshot);

        tx.apply_deltas(&plan.updates)?;
        tx.mark_reverted(&record.transaction_id, now)?;
        self.store.commit(tx).await?;

        info!(
            user_id = %request.user_id,
            recipe = %record.recipe_name,
            transaction_id = %record.transaction_id,
            restored = plan.report.reverted_items.len(),
            skipped = plan.report.skipped_items.len(),
            "completion reverted"
        );
        Ok(plan.report)
    }

    /// Current committed pantry for a user.
    pub async fn pantry(&self, user_id: &str) -> Result<Vec<PantryItem>, ReconcileError> {
        let tx = self.store.begin(user_id).await?;
        Ok(tx.load_snapshot())
    }

    /// Replaces a user's pantry; their completion history is kept.
    pub async fn import_pantry(&self, user_id: &str, items: Vec<PantryItem>) -> Result<usize, ReconcileError> {
        if user_id.trim().is_empty() {
            return Err(ReconcileError::InvalidRequest("user_id must not be empty".into()));
        }
        if let Some(item_id) = first_duplicate_id(&items) {
            return Err(ReconcileError::InvalidRequest(format!("duplicate pantry item id '{}'", item_id)));
        }
        let count = items.len();
        let mut tx = self.store.begin(user_id).await?;
        tx.replace_pantry(items)?;
        self.store.commit(tx).await?;
        info!(user_id, items = count, "pantry imported");
        Ok(count)
    }
}

fn validate_complete(request: &CompleteRequest) -> Result<(), ReconcileError> {
    if request.user_id.trim().is_empty() {
        return Err(ReconcileError::InvalidRequest("user_id must not be empty".into()));
    }
    for ingredient in &request.ingredients {
        if let Some(quantity) = ingredient.quantity {
            if !quantity.is_finite() || quantity < 0.0 {
                return Err(ReconcileError::InvalidRequest(format!(
                    "quantity for '{}' must be a non-negative number, got {}",
                    ingredient.ingredient_name, quantity
                )));
            }
        }
    }
    Ok(())
}
