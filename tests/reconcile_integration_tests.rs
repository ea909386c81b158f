use chrono::{Duration, Utc};
use pantry_reconcile::models::{CompleteRequest, IngredientRequirement, PantryItem, RevertRequest};
use pantry_reconcile::store::{JsonFileStore, MemoryStore, PantryStore, UnitOfWork};
use pantry_reconcile::units::UnitRegistry;
use pantry_reconcile::{PantryReconciler, ReconcileError};
use rand::Rng;
use std::sync::Arc;

const USER: &str = "user-1";
const TOLERANCE: f64 = 1e-9;

fn item(id: &str, name: &str, quantity: f64, unit: &str, days_old: i64) -> PantryItem {
    PantryItem {
        id: id.to_string(),
        name: name.to_string(),
        quantity,
        unit: unit.to_string(),
        acquired_at: Utc::now() - Duration::days(days_old),
        expires_at: None,
    }
}

fn request(recipe: &str, ingredients: Vec<IngredientRequirement>) -> CompleteRequest {
    CompleteRequest { user_id: USER.to_string(), recipe_name: recipe.to_string(), ingredients }
}

fn grams(name: &str, quantity: f64) -> IngredientRequirement {
    IngredientRequirement::new(name, Some(quantity), Some("g"))
}

async fn setup(items: Vec<PantryItem>) -> (MemoryStore, PantryReconciler<MemoryStore>) {
    let store = MemoryStore::new();
    store.seed(USER, items).await;
    let reconciler = PantryReconciler::new(store.clone(), Arc::new(UnitRegistry::standard()), 0.5, 60);
    (store, reconciler)
}

async fn quantity_of(store: &MemoryStore, id: &str) -> f64 {
    store
        .ledger(USER)
        .await
        .items
        .iter()
        .find(|item| item.id == id)
        .map(|item| item.quantity)
        .unwrap_or(f64::NAN)
}

#[tokio::test]
async fn test_partial_use_of_single_item() {
    let (store, reconciler) = setup(vec![item("pasta", "Pasta (Spaghetti)", 453.592, "g", 3)]).await;

    let report = reconciler.complete(request("Carbonara", vec![grams("pasta", 200.0)])).await.unwrap();

    assert_eq!(report.updated_items.len(), 1);
    let used = &report.updated_items[0];
    assert_eq!(used.previous_quantity, 453.592);
    assert!((used.new_quantity - 253.592).abs() < TOLERANCE);
    assert!((used.used_quantity - 200.0).abs() < TOLERANCE);
    assert!(report.missing_items.is_empty());
    assert!(report.insufficient_items.is_empty());
    assert!((quantity_of(&store, "pasta").await - 253.592).abs() < TOLERANCE);
}

#[tokio::test]
async fn test_oldest_item_drained_first() {
    let (store, reconciler) = setup(vec![
        item("pasta-new", "Pasta", 453.592, "g", 1),
        item("pasta-old", "Pasta", 453.592, "g", 10),
    ])
    .await;

    let report = reconciler.complete(request("Lasagne", vec![grams("pasta", 600.0)])).await.unwrap();

    assert_eq!(report.updated_items.len(), 2);
    let first = &report.updated_items[0];
    assert_eq!(first.item_id, "pasta-old");
    assert_eq!(first.new_quantity, 0.0);
    assert!((first.used_quantity - 453.592).abs() < TOLERANCE);

    let second = &report.updated_items[1];
    assert_eq!(second.item_id, "pasta-new");
    assert!((second.used_quantity - 146.408).abs() < TOLERANCE);
    assert!((second.new_quantity - 307.184).abs() < TOLERANCE);

    assert_eq!(quantity_of(&store, "pasta-old").await, 0.0);
}

#[tokio::test]
async fn test_shortage_reported_not_failed() {
    let (store, reconciler) = setup(vec![item("flour", "Flour", 907.185, "g", 2)]).await;

    let report = reconciler.complete(request("Bread", vec![grams("flour", 1000.0)])).await.unwrap();

    let used = &report.updated_items[0];
    assert!((used.used_quantity - 907.185).abs() < TOLERANCE);
    assert_eq!(used.new_quantity, 0.0);

    assert_eq!(report.insufficient_items.len(), 1);
    let short = &report.insufficient_items[0];
    assert_eq!(short.ingredient_name, "flour");
    assert!((short.shortage - 92.815).abs() < 1e-6);
    assert_eq!(short.unit, "g");
    assert!(report.transaction_id.is_some());
    assert_eq!(quantity_of(&store, "flour").await, 0.0);
}

#[tokio::test]
async fn test_unmatched_ingredient_is_missing_and_nothing_changes() {
    let (store, reconciler) = setup(vec![item("rice", "Basmati Rice", 1000.0, "g", 2)]).await;
    let before = store.ledger(USER).await;

    let report = reconciler
        .complete(request("Paella", vec![IngredientRequirement::new("saffron", Some(1.0), Some("g"))]))
        .await
        .unwrap();

    assert_eq!(report.missing_items, vec!["saffron"]);
    assert!(report.updated_items.is_empty());
    assert!(report.transaction_id.is_none());
    assert_eq!(store.ledger(USER).await, before);
}

#[tokio::test]
async fn test_revert_restores_bit_exact_quantities() {
    let originals: [(&str, f64); 3] = [("pasta-old", 453.592), ("pasta-new", 453.592), ("milk", 1000.0)];
    let (store, reconciler) = setup(vec![
        item("pasta-old", "Pasta", 453.592, "g", 10),
        item("pasta-new", "Pasta", 453.592, "g", 1),
        item("milk", "Whole Milk", 1000.0, "ml", 1),
    ])
    .await;

    let report = reconciler
        .complete(request(
            "Pasta Bake",
            vec![grams("pasta", 600.0), IngredientRequirement::new("milk", Some(1.5), Some("cups"))],
        ))
        .await
        .unwrap();
    let transaction_id = report.transaction_id.clone().unwrap();
    assert_eq!(report.updated_items.len(), 3);

    let revert = reconciler
        .revert(RevertRequest {
            user_id: USER.to_string(),
            transaction_id: Some(transaction_id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(revert.transaction_id, transaction_id);
    assert_eq!(revert.reverted_items.len(), 3);
    for (id, quantity) in originals {
        assert_eq!(quantity_of(&store, id).await.to_bits(), quantity.to_bits(), "item {}", id);
    }
}

#[tokio::test]
async fn test_double_revert_is_not_found() {
    let (store, reconciler) = setup(vec![item("eggs", "Eggs", 12.0, "each", 1)]).await;

    let report = reconciler
        .complete(request("Omelette", vec![IngredientRequirement::new("eggs", Some(3.0), None)]))
        .await
        .unwrap();
    let revert_request = RevertRequest {
        user_id: USER.to_string(),
        transaction_id: report.transaction_id.clone(),
        ..Default::default()
    };

    reconciler.revert(revert_request.clone()).await.unwrap();
    assert_eq!(quantity_of(&store, "eggs").await, 12.0);

    let second = reconciler.revert(revert_request).await;
    assert!(matches!(second, Err(ReconcileError::TransactionNotFound { .. })));
    assert_eq!(quantity_of(&store, "eggs").await, 12.0);
}

#[tokio::test]
async fn test_revert_by_recipe_name_picks_latest() {
    let (store, reconciler) = setup(vec![item("butter", "Butter", 250.0, "g", 1)]).await;

    reconciler.complete(request("Cookies", vec![grams("butter", 50.0)])).await.unwrap();
    reconciler.complete(request("Toast", vec![grams("butter", 10.0)])).await.unwrap();
    reconciler.complete(request("Cookies", vec![grams("butter", 40.0)])).await.unwrap();
    assert!((quantity_of(&store, "butter").await - 150.0).abs() < TOLERANCE);

    let revert = reconciler
        .revert(RevertRequest {
            user_id: USER.to_string(),
            recipe_name: Some("cookies".to_string()),
            minutes_ago: Some(5),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(revert.recipe_name, "Cookies");
    assert!((revert.reverted_items[0].quantity_restored - 40.0).abs() < TOLERANCE);
    assert!((quantity_of(&store, "butter").await - 190.0).abs() < TOLERANCE);

    let history = store.ledger(USER).await.history;
    assert_eq!(history.iter().filter(|record| record.is_reverted()).count(), 1);
}

#[tokio::test]
async fn test_revert_with_nothing_in_window() {
    let (_store, reconciler) = setup(vec![item("butter", "Butter", 250.0, "g", 1)]).await;

    let result = reconciler
        .revert(RevertRequest { user_id: USER.to_string(), recipe_name: Some("Cookies".into()), ..Default::default() })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("nothing to revert"));
}

#[tokio::test]
async fn test_revert_with_unbounded_window() {
    let (store, reconciler) = setup(vec![item("butter", "Butter", 250.0, "g", 1)]).await;
    reconciler.complete(request("Cookies", vec![grams("butter", 50.0)])).await.unwrap();

    let revert = reconciler
        .revert(RevertRequest {
            user_id: USER.to_string(),
            recipe_name: Some("Cookies".to_string()),
            minutes_ago: Some(i64::MAX),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(revert.recipe_name, "Cookies");
    assert_eq!(quantity_of(&store, "butter").await, 250.0);

    let again = reconciler
        .revert(RevertRequest { user_id: USER.to_string(), minutes_ago: Some(1_000_000_000_000), ..Default::default() })
        .await;
    assert!(again.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_concurrent_completions_do_not_lose_updates() {
    let (store, reconciler) = setup(vec![item("sugar", "Sugar", 100.0, "g", 1)]).await;
    let reconciler = Arc::new(reconciler);

    let mut handles = Vec::new();
    for n in 0..10 {
        let reconciler = Arc::clone(&reconciler);
        handles.push(tokio::spawn(async move {
            reconciler.complete(request(&format!("Tea {}", n), vec![grams("sugar", 10.0)])).await
        }));
    }
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert!(report.insufficient_items.is_empty());
    }

    assert!(quantity_of(&store, "sugar").await.abs() < 1e-6);
    assert_eq!(store.ledger(USER).await.history.len(), 10);
}

#[tokio::test]
async fn test_used_quantities_sum_to_requirement() {
    let mut rng = rand::thread_rng();

    for round in 0..50 {
        let count = rng.gen_range(1..6);
        let items: Vec<PantryItem> = (0..count)
            .map(|i| item(&format!("rice-{}", i), "Rice", rng.gen_range(0.0..500.0), "g", i as i64 + 1))
            .collect();
        let total: f64 = items.iter().map(|item| item.quantity).sum();
        let required = total * rng.gen_range(0.0..1.0);

        let (_store, reconciler) = setup(items).await;
        let report = reconciler.complete(request("Pilaf", vec![grams("rice", required)])).await.unwrap();

        let used: f64 = report.updated_items.iter().map(|result| result.used_quantity).sum();
        assert!((used - required).abs() < 1e-6, "round {}: used {} of {}", round, used, required);
        assert!(report.updated_items.iter().all(|result| result.new_quantity >= 0.0));
        assert!(report.insufficient_items.is_empty());
    }
}

#[tokio::test]
async fn test_json_file_store_revert_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pantry_state.json");
    let registry = Arc::new(UnitRegistry::standard());

    let transaction_id = {
        let store = JsonFileStore::open(&path).await.unwrap();
        let reconciler = PantryReconciler::new(store, Arc::clone(&registry), 0.5, 60);
        reconciler
            .import_pantry(USER, vec![item("oil", "Olive Oil", 750.0, "ml", 5)])
            .await
            .unwrap();
        let report = reconciler
            .complete(request("Salad", vec![IngredientRequirement::new("olive oil", Some(3.0), Some("tbsp"))]))
            .await
            .unwrap();
        assert!(report.updated_items[0].conversion_note.contains("tbsp"));
        report.transaction_id.unwrap()
    };

    let store = JsonFileStore::open(&path).await.unwrap();
    let reconciler = PantryReconciler::new(store, registry, 0.5, 60);
    reconciler
        .revert(RevertRequest { user_id: USER.to_string(), transaction_id: Some(transaction_id), ..Default::default() })
        .await
        .unwrap();

    let pantry = reconciler.pantry(USER).await.unwrap();
    assert_eq!(pantry[0].quantity.to_bits(), 750.0_f64.to_bits());
}

#[tokio::test]
async fn test_failed_commit_leaves_state_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pantry_state.json");
    let registry = Arc::new(UnitRegistry::standard());

    let store = JsonFileStore::open(&path).await.unwrap();
    let reconciler = PantryReconciler::new(store, Arc::clone(&registry), 0.5, 60);
    reconciler
        .import_pantry(USER, vec![item("rice", "Rice", 1000.0, "g", 3)])
        .await
        .unwrap();
    let first = reconciler.complete(request("Pilaf", vec![grams("rice", 200.0)])).await.unwrap();
    let on_disk_before = std::fs::read(&path).unwrap();

    // a directory where the temp file goes makes every write fail
    let blocker = dir.path().join("pantry_state.json.tmp");
    std::fs::create_dir(&blocker).unwrap();

    let failed = reconciler.complete(request("Risotto", vec![grams("rice", 300.0)])).await;
    assert!(matches!(failed, Err(ReconcileError::Storage(_))));

    let failed_revert = reconciler
        .revert(RevertRequest {
            user_id: USER.to_string(),
            transaction_id: first.transaction_id.clone(),
            ..Default::default()
        })
        .await;
    assert!(matches!(failed_revert, Err(ReconcileError::Storage(_))));

    {
        let tx = reconciler.store().begin(USER).await.unwrap();
        assert_eq!(tx.load_snapshot()[0].quantity, 800.0);
        let history = &tx.ledger().history;
        assert_eq!(history.len(), 1);
        assert_eq!(Some(&history[0].transaction_id), first.transaction_id.as_ref());
        assert!(!history[0].is_reverted());
    }

    assert_eq!(std::fs::read(&path).unwrap(), on_disk_before);
    std::fs::remove_dir(&blocker).unwrap();

    let reopened = JsonFileStore::open(&path).await.unwrap();
    let tx = reopened.begin(USER).await.unwrap();
    assert_eq!(tx.load_snapshot()[0].quantity, 800.0);
    assert_eq!(tx.ledger().history.len(), 1);
    assert!(!tx.ledger().history[0].is_reverted());
}
