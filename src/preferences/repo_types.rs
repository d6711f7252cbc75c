use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Preferences, SelectOption, Selections};

#[derive(Debug, FromRow)]
pub struct PreferencesRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub selections: Json<Selections>,
    pub cooking_skill_level: Option<Json<SelectOption>>,
    pub meal_plan_frequency: Option<Json<SelectOption>>,
    pub average_cooking_time: i32,
    pub calorie_target: i32,
    pub custom_ingredients: String,
    pub special_instructions: String,
    pub updated_at: OffsetDateTime,
}

impl From<PreferencesRow> for Preferences {
    fn from(r: PreferencesRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            selections: r.selections.0,
            cooking_skill_level: r.cooking_skill_level.map(|j| j.0),
            meal_plan_frequency: r.meal_plan_frequency.map(|j| j.0),
            average_cooking_time: r.average_cooking_time,
            calorie_target: r.calorie_target,
            custom_ingredients: r.custom_ingredients,
            special_instructions: r.special_instructions,
            updated_at: r.updated_at,
        }
    }
}
