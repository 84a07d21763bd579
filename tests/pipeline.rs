//! End-to-end pipeline tests against real SQLite stores in a temp dir.
//!
//! Everything runs offline: recipes come from a `StaticSource` and vectors
//! from the deterministic `HashEmbedder`.

use serde_json::{json, Value};
use tempfile::TempDir;

use larder::db;
use larder::migrate::{migrate_corpus, migrate_index};
use larder::sqlite_store::{SqliteCorpus, SqliteVectorIndex};
use larder_core::audit::{audit, drift};
use larder_core::embedding::HashEmbedder;
use larder_core::ingest::{ingest, IngestRequest};
use larder_core::models::{Goal, Nutrition, Recipe, SearchFilter};
use larder_core::normalize::normalize;
use larder_core::search::{search, search_detailed};
use larder_core::source::{RecipeSource, StaticSource};
use larder_core::store::{Corpus, UpsertOutcome, VectorIndex};

struct Env {
    _tmp: TempDir,
    corpus: SqliteCorpus,
    index: SqliteVectorIndex,
    embedder: HashEmbedder,
}

async fn setup() -> Env {
    let tmp = TempDir::new().unwrap();
    let corpus_pool = db::connect(&tmp.path().join("data/corpus.sqlite")).await.unwrap();
    let index_pool = db::connect(&tmp.path().join("data/index.sqlite")).await.unwrap();
    migrate_corpus(&corpus_pool).await.unwrap();
    migrate_index(&index_pool).await.unwrap();

    let embedder = HashEmbedder::new(128);
    Env {
        _tmp: tmp,
        corpus: SqliteCorpus::new(corpus_pool),
        index: SqliteVectorIndex::new(index_pool, "hash-128"),
        embedder,
    }
}

fn spoonacular(id: u64, title: &str, calories: f64, ingredients: &[&str]) -> Value {
    json!({
        "id": id,
        "title": title,
        "cuisines": ["Thai"],
        "summary": format!("A simple {}", title.to_lowercase()),
        "extendedIngredients": ingredients.iter().map(|i| json!({"name": i})).collect::<Vec<_>>(),
        "nutrition": {"nutrients": [
            {"name": "Calories", "amount": calories},
            {"name": "Protein", "amount": 30.0},
            {"name": "Carbohydrates", "amount": 40.0},
            {"name": "Fat", "amount": 12.0}
        ]}
    })
}

fn sources(payloads: Vec<Value>) -> Vec<Box<dyn RecipeSource>> {
    vec![Box::new(StaticSource::new("fixture", payloads))]
}

fn request(goal: Goal) -> IngestRequest<'static> {
    IngestRequest {
        goal,
        cuisine: None,
        limit: 50,
        embed_batch_size: 2,
    }
}

#[tokio::test]
async fn goal_filter_excludes_high_calorie_recipe() {
    let env = setup().await;
    let payloads = vec![
        spoonacular(1, "Green Curry", 300.0, &["chicken", "basil"]),
        spoonacular(2, "Massaman", 700.0, &["beef", "potato"]),
        spoonacular(3, "Larb", 450.0, &["pork", "mint"]),
    ];
    let report = ingest(
        &sources(payloads),
        &env.corpus,
        &env.index,
        &env.embedder,
        &request(Goal::ReduceIntake),
    )
    .await
    .unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.corpus_written(), 3);
    assert_eq!(report.index_written, 3);

    let out = search_detailed(
        &env.corpus,
        &env.index,
        &env.embedder,
        &SearchFilter::new(Goal::ReduceIntake, 10),
    )
    .await
    .unwrap();
    assert!(!out.used_fallback);
    assert!(out.recipes.len() <= 2);
    assert!(out.recipes.iter().all(|r| r.id != "spoon_2"));
    assert!(out.recipes.iter().all(|r| r.nutrition.calories < 600.0));
}

#[tokio::test]
async fn allergen_in_document_excludes_recipe() {
    let env = setup().await;
    let payloads = vec![
        spoonacular(10, "Satay Skewers", 350.0, &["chicken", "peanut sauce"]),
        spoonacular(11, "Tom Yum", 250.0, &["shrimp", "lemongrass"]),
    ];
    ingest(
        &sources(payloads),
        &env.corpus,
        &env.index,
        &env.embedder,
        &request(Goal::ReduceIntake),
    )
    .await
    .unwrap();

    let filter = SearchFilter::new(Goal::ReduceIntake, 10).with_allergens(["peanut"]);
    let got = search(&env.corpus, &env.index, &env.embedder, &filter)
        .await
        .unwrap();
    let ids: Vec<&str> = got.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["spoon_11"]);
}

#[tokio::test]
async fn corpus_only_recipe_is_reported_and_never_returned() {
    let env = setup().await;
    ingest(
        &sources(vec![spoonacular(20, "Pad Thai", 500.0, &["noodles"])]),
        &env.corpus,
        &env.index,
        &env.embedder,
        &request(Goal::ReduceIntake),
    )
    .await
    .unwrap();

    // Crash between phases: Corpus row written, vector never written.
    let r1 = Recipe {
        id: "R1".into(),
        name: "Orphaned Stew".into(),
        source: "spoonacular".into(),
        cuisine: "Thai".into(),
        description: String::new(),
        ingredients: vec!["noodles".into()],
        instructions: String::new(),
        nutrition: Nutrition::new(300.0, 30.0, 10.0, 5.0),
        tags: Default::default(),
        popularity_score: 0,
        created_at: 0,
        last_seen_at: 0,
    };
    env.corpus.upsert(&r1).await.unwrap();

    let report = audit(&env.corpus, &env.index).await.unwrap();
    assert_eq!(report.corpus_count, 2);
    assert_eq!(report.index_count, 1);
    assert!(!report.in_sync);
    assert_eq!(
        drift(&env.corpus, &env.index).await.unwrap().missing_from_index,
        vec!["R1"]
    );

    for goal in Goal::ALL {
        let got = search(&env.corpus, &env.index, &env.embedder, &SearchFilter::new(goal, 10))
            .await
            .unwrap();
        assert!(got.iter().all(|r| r.id != "R1"));
    }
}

#[tokio::test]
async fn reingest_keeps_first_content_and_stable_counts() {
    let env = setup().await;
    let first = vec![spoonacular(30, "Khao Soi", 550.0, &["egg noodles"])];
    ingest(&sources(first), &env.corpus, &env.index, &env.embedder, &request(Goal::Maintain))
        .await
        .unwrap();
    let before = env.corpus.get("spoon_30").await.unwrap().unwrap();

    let changed = vec![spoonacular(30, "Khao Soi (renamed)", 900.0, &["rice noodles"])];
    let report = ingest(&sources(changed), &env.corpus, &env.index, &env.embedder, &request(Goal::Maintain))
        .await
        .unwrap();
    assert_eq!(report.corpus_inserted, 0);
    assert_eq!(report.corpus_refreshed, 1);

    let after = env.corpus.get("spoon_30").await.unwrap().unwrap();
    assert_eq!(after.name, "Khao Soi");
    assert_eq!(after.nutrition.calories, 550.0);
    assert_eq!(after.ingredients, vec!["egg noodles"]);
    assert!(after.last_seen_at >= before.last_seen_at);
    assert_eq!(after.created_at, before.created_at);

    assert_eq!(env.corpus.count().await.unwrap(), 1);
    assert_eq!(env.index.count().await.unwrap(), 1);
    assert!(audit(&env.corpus, &env.index).await.unwrap().in_sync);

    let hits = env.index.query(&vec![0.5f32; 128], 5, None).await.unwrap();
    assert!(hits[0].document.contains("egg noodles"));
    assert_eq!(hits[0].metadata.calories, 550.0);
}

#[tokio::test]
async fn empty_index_search_is_empty() {
    let env = setup().await;
    let got = search(
        &env.corpus,
        &env.index,
        &env.embedder,
        &SearchFilter::new(Goal::BuildMuscle, 5),
    )
    .await
    .unwrap();
    assert!(got.is_empty());
}

#[tokio::test]
async fn sqlite_corpus_round_trips_recipe_fields() {
    let env = setup().await;
    let recipe = normalize(&json!({
        "id": 42,
        "title": "Tofu Bowl",
        "vegan": true,
        "extendedIngredients": [{"name": "tofu"}, {"name": "rice"}],
        "nutrition": {"nutrients": [{"name": "Protein", "amount": 31.0}]}
    }))
    .unwrap();

    assert_eq!(env.corpus.upsert(&recipe).await.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(env.corpus.upsert(&recipe).await.unwrap(), UpsertOutcome::Refreshed);

    let stored = env.corpus.get("spoon_42").await.unwrap().unwrap();
    assert_eq!(stored.ingredients, recipe.ingredients);
    assert_eq!(stored.tags, recipe.tags);
    assert!(stored.tags.contains("high-protein"));
    assert!(stored.created_at > 0);

    assert!(env.corpus.increment_popularity("spoon_42").await.unwrap());
    assert!(!env.corpus.increment_popularity("spoon_404").await.unwrap());
    let fetched = env
        .corpus
        .get_by_ids(&["spoon_42".to_string(), "spoon_404".to_string()])
        .await
        .unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].popularity_score, 1);
}

#[tokio::test]
async fn sqlite_index_rejects_mixed_dimension_batch_atomically() {
    let env = setup().await;
    let recipe = normalize(&spoonacular(50, "Soup", 200.0, &["leek"])).unwrap();
    let good = larder_core::document::vector_record(&recipe, "a".into(), vec![1.0, 0.0]);
    let mut bad = good.clone();
    bad.id = "spoon_51".into();
    bad.embedding = vec![1.0];

    assert!(env.index.upsert_batch(&[good, bad]).await.is_err());
    assert_eq!(env.index.count().await.unwrap(), 0);
}

#[tokio::test]
async fn sqlite_index_pushes_goal_filter_into_query() {
    let env = setup().await;
    let payloads = vec![
        spoonacular(60, "Light", 150.0, &["greens"]),
        spoonacular(61, "Regular", 450.0, &["rice"]),
    ];
    ingest(&sources(payloads), &env.corpus, &env.index, &env.embedder, &request(Goal::Maintain))
        .await
        .unwrap();

    let query = vec![0.0f32; 128];
    let filter = Goal::Maintain.metadata_filter();
    let hits = env.index.query(&query, 10, Some(&filter)).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["spoon_61"]);
    assert!(hits[0].document.contains("Ingredients: rice"));

    env.index.delete_all().await.unwrap();
    assert_eq!(env.index.count().await.unwrap(), 0);
}

#[tokio::test]
async fn reingest_cannot_move_recipe_past_filters() {
    let env = setup().await;
    let first = vec![
        spoonacular(7, "Noodle Bowl", 900.0, &["egg noodles"]),
        spoonacular(8, "Broth", 200.0, &["leek"]),
    ];
    ingest(&sources(first), &env.corpus, &env.index, &env.embedder, &request(Goal::Maintain))
        .await
        .unwrap();

    let changed = vec![spoonacular(7, "Noodle Bowl", 300.0, &["rice noodles"])];
    ingest(&sources(changed), &env.corpus, &env.index, &env.embedder, &request(Goal::Maintain))
        .await
        .unwrap();

    let out = search_detailed(
        &env.corpus,
        &env.index,
        &env.embedder,
        &SearchFilter::new(Goal::ReduceIntake, 10),
    )
    .await
    .unwrap();
    assert!(!out.used_fallback);
    let ids: Vec<&str> = out.recipes.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["spoon_8"]);

    let filter = SearchFilter::new(Goal::Maintain, 10).with_allergens(["egg"]);
    let got = search(&env.corpus, &env.index, &env.embedder, &filter)
        .await
        .unwrap();
    assert!(got.iter().all(|r| r.id != "spoon_7"));
}

#[tokio::test]
async fn search_with_other_embedder_width_fails() {
    let env = setup().await;
    ingest(
        &sources(vec![spoonacular(70, "Curry", 400.0, &["tofu"])]),
        &env.corpus,
        &env.index,
        &env.embedder,
        &request(Goal::Maintain),
    )
    .await
    .unwrap();

    let result = search(
        &env.corpus,
        &env.index,
        &HashEmbedder::new(32),
        &SearchFilter::new(Goal::Maintain, 5),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn index_opened_for_other_model_rejects_queries() {
    let env = setup().await;
    ingest(
        &sources(vec![spoonacular(71, "Curry", 400.0, &["tofu"])]),
        &env.corpus,
        &env.index,
        &env.embedder,
        &request(Goal::Maintain),
    )
    .await
    .unwrap();

    let pool = db::connect(&env._tmp.path().join("data/index.sqlite")).await.unwrap();
    let other = SqliteVectorIndex::new(pool, "other-128");
    assert!(other.query(&vec![0.5f32; 128], 5, None).await.is_err());
    assert_eq!(env.index.query(&vec![0.5f32; 128], 5, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_replace_all_is_atomic() {
    let env = setup().await;
    let recipe = normalize(&spoonacular(80, "Soup", 200.0, &["leek"])).unwrap();
    let old = larder_core::document::vector_record(&recipe, "old".into(), vec![1.0, 0.0]);
    env.index.upsert_batch(&[old.clone()]).await.unwrap();

    let mut bad = old.clone();
    bad.id = "spoon_81".into();
    bad.embedding = vec![1.0];
    assert!(env.index.replace_all(&[old.clone(), bad]).await.is_err());
    assert_eq!(env.index.ids().await.unwrap(), vec!["spoon_80"]);

    let mut fresh = old;
    fresh.id = "spoon_82".into();
    env.index.replace_all(&[fresh]).await.unwrap();
    assert_eq!(env.index.ids().await.unwrap(), vec!["spoon_82"]);
}
