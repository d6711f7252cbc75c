use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

use super::{model::Preferences, repo_types::PreferencesRow};
use crate::{db::Database, error::AppResult};

/// Whether a save produced a new record or overwrote the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

#[async_trait]
pub trait PreferencesRepo: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Option<Preferences>>;
    /// Writes the whole record keyed by `user_id`; never creates a second row
    /// for the same user.
    async fn save(&self, prefs: &Preferences) -> AppResult<SaveOutcome>;
}

#[derive(Clone)]
pub struct PgPreferencesRepo {
    db: Database,
}

impl PgPreferencesRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PreferencesRepo for PgPreferencesRepo {
    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Option<Preferences>> {
        self.db.ensure_connected().await?;
        let row = sqlx::query_as::<_, PreferencesRow>(
            r#"
            SELECT id, user_id, selections, cooking_skill_level, meal_plan_frequency,
                   average_cooking_time, calorie_target, custom_ingredients,
                   special_instructions, updated_at
              FROM user_preferences
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row.map(Preferences::from))
    }

    async fn save(&self, prefs: &Preferences) -> AppResult<SaveOutcome> {
        self.db.ensure_connected().await?;
        // xmax is zero only for a freshly inserted tuple
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO user_preferences
                (id, user_id, selections, cooking_skill_level, meal_plan_frequency,
                 average_cooking_time, calorie_target, custom_ingredients,
                 special_instructions, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                selections           = EXCLUDED.selections,
                cooking_skill_level  = EXCLUDED.cooking_skill_level,
                meal_plan_frequency  = EXCLUDED.meal_plan_frequency,
                average_cooking_time = EXCLUDED.average_cooking_time,
                calorie_target       = EXCLUDED.calorie_target,
                custom_ingredients   = EXCLUDED.custom_ingredients,
                special_instructions = EXCLUDED.special_instructions,
                updated_at           = EXCLUDED.updated_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(prefs.id)
        .bind(prefs.user_id)
        .bind(Json(&prefs.selections))
        .bind(prefs.cooking_skill_level.as_ref().map(Json))
        .bind(prefs.meal_plan_frequency.as_ref().map(Json))
        .bind(prefs.average_cooking_time)
        .bind(prefs.calorie_target)
        .bind(&prefs.custom_ingredients)
        .bind(&prefs.special_instructions)
        .bind(prefs.updated_at)
        .fetch_one(self.db.pool())
        .await?;

        Ok(if inserted {
            SaveOutcome::Created
        } else {
            SaveOutcome::Updated
        })
    }
}
