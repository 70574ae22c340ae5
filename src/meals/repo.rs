use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::store::{ImageChange, Meal, MealPatch, MealStore, NewMeal, StoreError, StoreInfo};
use crate::db::is_unavailable;

/// Row in the `meals` table.
#[derive(Debug, Clone, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub name: String,
    pub protein: Vec<String>,
    pub veg_fruit: Vec<String>,
    pub carb: Vec<String>,
    pub other_ingredients: Vec<String>,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<MealRow> for Meal {
    fn from(r: MealRow) -> Self {
        Self {
            id: r.id.to_string(),
            name: r.name,
            protein: r.protein,
            veg_fruit: r.veg_fruit,
            carb: r.carb,
            other_ingredients: r.other_ingredients,
            image: r.image,
        }
    }
}

/// Meal records kept in Postgres. Deleted rows are only flagged `archived`.
#[derive(Clone)]
pub struct PgMealStore {
    db: PgPool,
}

impl PgMealStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound("meal not found".into()),
        sqlx::Error::PoolTimedOut => StoreError::Timeout(err.to_string()),
        e if is_unavailable(&e) => StoreError::Unavailable(e.to_string()),
        e => StoreError::Internal(anyhow::Error::new(e).context("meals query")),
    }
}

fn parse_id(id: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(id).map_err(|_| StoreError::NotFound(format!("invalid meal id {id}")))
}

#[async_trait]
impl MealStore for PgMealStore {
    async fn list(&self) -> Result<Vec<Meal>, StoreError> {
        let rows = sqlx::query_as::<_, MealRow>(
            r#"
            SELECT id, name, protein, veg_fruit, carb, other_ingredients, image, created_at
            FROM meals
            WHERE NOT archived AND name <> ''
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(store_error)?;
        Ok(rows.into_iter().map(Meal::from).collect())
    }

    async fn create(&self, meal: NewMeal) -> Result<String, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO meals (id, name, protein, veg_fruit, carb, other_ingredients, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(&meal.name)
        .bind(&meal.protein)
        .bind(&meal.veg_fruit)
        .bind(&meal.carb)
        .bind(&meal.other_ingredients)
        .bind(meal.image.as_deref().filter(|s| !s.is_empty()))
        .execute(&self.db)
        .await
        .map_err(store_error)?;
        Ok(id.to_string())
    }

    async fn update(&self, id: &str, patch: MealPatch) -> Result<Meal, StoreError> {
        let id = parse_id(id)?;
        let (touch_image, image) = match patch.image {
            ImageChange::Keep => (false, None),
            ImageChange::Clear => (true, None),
            ImageChange::Set(url) => (true, Some(url)),
        };
        let row = sqlx::query_as::<_, MealRow>(
            r#"
            UPDATE meals SET
                name = COALESCE($2, name),
                protein = COALESCE($3, protein),
                veg_fruit = COALESCE($4, veg_fruit),
                carb = COALESCE($5, carb),
                other_ingredients = COALESCE($6, other_ingredients),
                image = CASE WHEN $7 THEN $8 ELSE image END,
                updated_at = now()
            WHERE id = $1 AND NOT archived
            RETURNING id, name, protein, veg_fruit, carb, other_ingredients, image, created_at
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.protein)
        .bind(patch.veg_fruit)
        .bind(patch.carb)
        .bind(patch.other_ingredients)
        .bind(touch_image)
        .bind(image)
        .fetch_one(&self.db)
        .await
        .map_err(store_error)?;
        Ok(row.into())
    }

    async fn archive(&self, id: &str) -> Result<(), StoreError> {
        let id = parse_id(id)?;
        let res = sqlx::query("UPDATE meals SET archived = TRUE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(store_error)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("meal {id} not found")));
        }
        Ok(())
    }

    async fn describe(&self) -> Result<StoreInfo, StoreError> {
        let columns = sqlx::query_scalar::<_, String>(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_name = 'meals'
            ORDER BY ordinal_position
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(store_error)?;
        if columns.is_empty() {
            return Err(StoreError::NotFound("table `meals` does not exist".into()));
        }
        Ok(StoreInfo {
            id: "postgres".into(),
            title: "meals".into(),
            properties: columns,
        })
    }
}
