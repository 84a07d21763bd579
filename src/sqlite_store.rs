//! SQLite-backed [`Corpus`] and [`VectorIndex`] implementations.
//!
//! Each store wraps its own [`SqlitePool`]; in a normal deployment the two
//! pools point at different database files. Vector similarity is
//! brute-force cosine over little-endian f32 BLOBs, with the goal predicate
//! pushed into the `WHERE` clause.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use larder_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use larder_core::models::{MetadataFilter, Nutrition, Recipe, RecipeMetadata, VectorRecord};
use larder_core::store::{rank_hits, Corpus, UpsertOutcome, VectorHit, VectorIndex};

use crate::config::Config;
use crate::db;

/// Both stores, opened from configuration.
pub struct Stores {
    pub corpus: SqliteCorpus,
    pub index: SqliteVectorIndex,
}

impl Stores {
    /// Connect to both databases. `model` is recorded on index writes.
    pub async fn open(config: &Config, model: &str) -> Result<Self> {
        let corpus = db::connect(&config.corpus.path).await?;
        let index = db::connect(&config.index.path).await?;
        Ok(Self {
            corpus: SqliteCorpus::new(corpus),
            index: SqliteVectorIndex::new(index, model),
        })
    }

    pub async fn close(self) {
        self.corpus.pool.close().await;
        self.index.pool.close().await;
    }
}

/// SQLite implementation of the [`Corpus`] trait over the `recipes` table.
pub struct SqliteCorpus {
    pool: SqlitePool,
}

impl SqliteCorpus {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const RECIPE_COLUMNS: &str = "id, name, source, cuisine, description, ingredients_json, \
     instructions, calories, protein, carbohydrates, fat, tags_json, popularity_score, \
     created_at, last_seen_at";

fn recipe_from_row(row: &SqliteRow) -> Result<Recipe> {
    let id: String = row.get("id");
    let ingredients_json: String = row.get("ingredients_json");
    let tags_json: String = row.get("tags_json");
    let popularity: i64 = row.get("popularity_score");

    Ok(Recipe {
        ingredients: serde_json::from_str(&ingredients_json)
            .with_context(|| format!("corrupt ingredients for recipe {}", id))?,
        tags: serde_json::from_str(&tags_json)
            .with_context(|| format!("corrupt tags for recipe {}", id))?,
        name: row.get("name"),
        source: row.get("source"),
        cuisine: row.get("cuisine"),
        description: row.get("description"),
        instructions: row.get("instructions"),
        nutrition: Nutrition {
            calories: row.get("calories"),
            protein: row.get("protein"),
            carbohydrates: row.get("carbohydrates"),
            fat: row.get("fat"),
        },
        popularity_score: popularity.max(0) as u64,
        created_at: row.get("created_at"),
        last_seen_at: row.get("last_seen_at"),
        id,
    })
}

#[async_trait]
impl Corpus for SqliteCorpus {
    async fn upsert(&self, recipe: &Recipe) -> Result<UpsertOutcome> {
        let now = chrono::Utc::now().timestamp();
        let ingredients_json = serde_json::to_string(&recipe.ingredients)?;
        let tags_json = serde_json::to_string(&recipe.tags)?;

        // Content is first-write-wins; a reimport only touches last_seen_at.
        let inserted = sqlx::query(
            r#"
            INSERT INTO recipes (id, name, source, cuisine, description, ingredients_json,
                                 instructions, calories, protein, carbohydrates, fat,
                                 tags_json, popularity_score, created_at, last_seen_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&recipe.id)
        .bind(&recipe.name)
        .bind(&recipe.source)
        .bind(&recipe.cuisine)
        .bind(&recipe.description)
        .bind(&ingredients_json)
        .bind(&recipe.instructions)
        .bind(recipe.nutrition.calories)
        .bind(recipe.nutrition.protein)
        .bind(recipe.nutrition.carbohydrates)
        .bind(recipe.nutrition.fat)
        .bind(&tags_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert recipe {}", recipe.id))?
        .rows_affected();

        if inserted > 0 {
            return Ok(UpsertOutcome::Inserted);
        }

        sqlx::query("UPDATE recipes SET last_seen_at = MAX(last_seen_at, ?) WHERE id = ?")
            .bind(now)
            .bind(&recipe.id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to refresh recipe {}", recipe.id))?;
        Ok(UpsertOutcome::Refreshed)
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Recipe>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM recipes WHERE id IN ({})",
            RECIPE_COLUMNS, placeholders
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(recipe_from_row).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<Recipe>> {
        let sql = format!("SELECT {} FROM recipes WHERE id = ?", RECIPE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(recipe_from_row).transpose()
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }

    async fn ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar("SELECT id FROM recipes ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn increment_popularity(&self, id: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE recipes SET popularity_score = popularity_score + 1 WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// SQLite implementation of the [`VectorIndex`] trait over the `vectors` table.
pub struct SqliteVectorIndex {
    pool: SqlitePool,
    /// Embedding model recorded alongside each row.
    model: String,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool, model: impl Into<String>) -> Self {
        Self {
            pool,
            model: model.into(),
        }
    }

    async fn write_records(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        records: &[VectorRecord],
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        for record in records {
            let m = &record.metadata;
            sqlx::query(
                r#"
                INSERT INTO vectors (id, model, dims, embedding, name, source, cuisine,
                                     calories, protein, carbohydrates, fat, tags,
                                     document, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    model = excluded.model,
                    dims = excluded.dims,
                    embedding = excluded.embedding,
                    name = excluded.name,
                    source = excluded.source,
                    cuisine = excluded.cuisine,
                    calories = excluded.calories,
                    protein = excluded.protein,
                    carbohydrates = excluded.carbohydrates,
                    fat = excluded.fat,
                    tags = excluded.tags,
                    document = excluded.document,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&record.id)
            .bind(&self.model)
            .bind(record.embedding.len() as i64)
            .bind(vec_to_blob(&record.embedding))
            .bind(&m.name)
            .bind(&m.source)
            .bind(&m.cuisine)
            .bind(m.calories)
            .bind(m.protein)
            .bind(m.carbohydrates)
            .bind(m.fat)
            .bind(m.tags.join(","))
            .bind(&record.document)
            .bind(now)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("failed to write vector {}", record.id))?;
        }

        Ok(())
    }
}

/// Every record in a batch must carry a non-empty vector of one width.
fn check_batch(records: &[VectorRecord]) -> Result<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let dims = first.embedding.len();
    if dims == 0 {
        bail!("empty embedding for {}", first.id);
    }
    if let Some(bad) = records.iter().find(|r| r.embedding.len() != dims) {
        bail!(
            "embedding dimension mismatch for {}: expected {}, got {}",
            bad.id,
            dims,
            bad.embedding.len()
        );
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert_batch(&self, records: &[VectorRecord]) -> Result<()> {
        check_batch(records)?;
        let mut tx = self.pool.begin().await?;
        self.write_records(&mut tx, records).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_all(&self, records: &[VectorRecord]) -> Result<()> {
        check_batch(records)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM vectors").execute(&mut *tx).await?;
        self.write_records(&mut tx, records).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>> {
        // Similarity is meaningless across models or widths.
        let foreign: Option<(String, i64)> = sqlx::query_as(
            "SELECT model, dims FROM vectors WHERE model != ? OR dims != ? LIMIT 1",
        )
        .bind(&self.model)
        .bind(embedding.len() as i64)
        .fetch_optional(&self.pool)
        .await?;
        if let Some((model, dims)) = foreign {
            bail!(
                "vector index holds {}-dim vectors from '{}' but the query uses {}-dim '{}'; \
                 run `larder embed rebuild` or switch back to the indexing model",
                dims,
                model,
                embedding.len(),
                self.model
            );
        }

        let mut sql = String::from(
            "SELECT id, embedding, name, source, cuisine, calories, protein, \
             carbohydrates, fat, tags, document FROM vectors",
        );
        // Field and operator come from closed enums, never from user input.
        if let Some(f) = filter {
            sql.push_str(&format!(" WHERE {} {} ?", f.field.as_str(), f.op.as_sql()));
        }

        let mut query = sqlx::query(&sql);
        if let Some(f) = filter {
            query = query.bind(f.value);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut hits: Vec<VectorHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let tags: String = row.get("tags");
                VectorHit {
                    id: row.get("id"),
                    score: cosine_similarity(embedding, &blob_to_vec(&blob)),
                    metadata: RecipeMetadata {
                        name: row.get("name"),
                        source: row.get("source"),
                        cuisine: row.get("cuisine"),
                        calories: row.get("calories"),
                        protein: row.get("protein"),
                        carbohydrates: row.get("carbohydrates"),
                        fat: row.get("fat"),
                        tags: tags
                            .split(',')
                            .filter(|t| !t.is_empty())
                            .map(str::to_string)
                            .collect(),
                    },
                    document: row.get("document"),
                }
            })
            .collect();

        rank_hits(&mut hits, k);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }

    async fn ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar("SELECT id FROM vectors ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn delete_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM vectors").execute(&self.pool).await?;
        Ok(())
    }
}
