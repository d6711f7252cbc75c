use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

pub const COOKING_TIME_RANGE: (i32, i32) = (5, 120);
pub const CALORIE_TARGET_RANGE: (i32, i32) = (500, 5000);
pub const DEFAULT_COOKING_TIME: i32 = 30;
pub const DEFAULT_CALORIE_TARGET: i32 = 2000;
pub const MAX_SPECIAL_INSTRUCTIONS: usize = 500;

/// One choice from a select box: machine value plus display label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Declares the multi-select categories once and derives both the stored
/// struct and its partial-update counterpart from the same field list.
macro_rules! selection_categories {
    ($($field:ident),* $(,)?) => {
        /// Multi-select category lists, persisted together as one JSON document.
        #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
        #[serde(rename_all = "camelCase", default)]
        pub struct Selections {
            $(pub $field: Vec<SelectOption>,)*
        }

        #[derive(Debug, Clone, Default, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct SelectionsPatch {
            $(#[serde(default)] pub $field: Option<Vec<SelectOption>>,)*
        }

        impl Selections {
            fn apply(&mut self, patch: SelectionsPatch) {
                $(if let Some(v) = patch.$field { self.$field = v; })*
            }
        }
    };
}

selection_categories!(
    // available ingredients
    proteins,
    vegetables,
    fruits,
    grains,
    dairy,
    herbs,
    spices,
    condiments,
    oils,
    // diet
    dietary_restrictions,
    allergies,
    preferred_cuisines,
    flavor_preferences,
    meal_types,
    cooking_methods,
    diet_goals,
);

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub selections: Selections,
    pub cooking_skill_level: Option<SelectOption>,
    pub meal_plan_frequency: Option<SelectOption>,
    pub average_cooking_time: i32,
    pub calorie_target: i32,
    pub custom_ingredients: String,
    pub special_instructions: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Partial update. Absent and `null` fields leave the stored value untouched;
/// unrecognised fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    #[serde(flatten)]
    pub selections: SelectionsPatch,
    #[serde(default)]
    pub cooking_skill_level: Option<SelectOption>,
    #[serde(default)]
    pub meal_plan_frequency: Option<SelectOption>,
    #[serde(default)]
    pub average_cooking_time: Option<i32>,
    #[serde(default)]
    pub calorie_target: Option<i32>,
    #[serde(default)]
    pub custom_ingredients: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

fn check_range(field: &str, value: Option<i32>, (min, max): (i32, i32)) -> Result<(), AppError> {
    match value {
        Some(v) if v < min || v > max => Err(AppError::validation(format!(
            "{field} must be between {min} and {max}"
        ))),
        _ => Ok(()),
    }
}

impl PreferencesPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        check_range("averageCookingTime", self.average_cooking_time, COOKING_TIME_RANGE)?;
        check_range("calorieTarget", self.calorie_target, CALORIE_TARGET_RANGE)?;
        if let Some(text) = &self.special_instructions {
            if text.chars().count() > MAX_SPECIAL_INSTRUCTIONS {
                return Err(AppError::validation(format!(
                    "specialInstructions must be at most {MAX_SPECIAL_INSTRUCTIONS} characters"
                )));
            }
        }
        Ok(())
    }
}

impl Preferences {
    /// Record with every field at its default.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            selections: Selections::default(),
            cooking_skill_level: None,
            meal_plan_frequency: None,
            average_cooking_time: DEFAULT_COOKING_TIME,
            calorie_target: DEFAULT_CALORIE_TARGET,
            custom_ingredients: String::new(),
            special_instructions: String::new(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Merges the supplied fields. The patch must already be validated.
    pub fn apply(&mut self, patch: PreferencesPatch) {
        self.selections.apply(patch.selections);
        if let Some(v) = patch.cooking_skill_level {
            self.cooking_skill_level = Some(v);
        }
        if let Some(v) = patch.meal_plan_frequency {
            self.meal_plan_frequency = Some(v);
        }
        if let Some(v) = patch.average_cooking_time {
            self.average_cooking_time = v;
        }
        if let Some(v) = patch.calorie_target {
            self.calorie_target = v;
        }
        if let Some(v) = patch.custom_ingredients {
            self.custom_ingredients = v;
        }
        if let Some(v) = patch.special_instructions {
            self.special_instructions = v;
        }
        self.updated_at = OffsetDateTime::now_utc();
    }

    /// The user-facing fields only, as sent to the completion model.
    pub fn prompt_snapshot(&self) -> Value {
        let mut v = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(obj) = v.as_object_mut() {
            for key in ["id", "userId", "updatedAt"] {
                obj.remove(key);
            }
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(v: Value) -> PreferencesPatch {
        serde_json::from_value(v).expect("patch should deserialize")
    }

    fn opt(value: &str, label: &str) -> SelectOption {
        SelectOption {
            value: value.into(),
            label: label.into(),
        }
    }

    #[test]
    fn defaults_match_form_defaults() {
        let p = Preferences::new(Uuid::new_v4());
        assert_eq!(p.average_cooking_time, 30);
        assert_eq!(p.calorie_target, 2000);
        assert!(p.selections.proteins.is_empty());
        assert!(p.cooking_skill_level.is_none());
    }

    #[test]
    fn patch_reads_camel_case_and_ignores_unknown_fields() {
        let p = patch(json!({
            "proteins": [{"value": "tofu", "label": "Tofu"}],
            "dietaryRestrictions": [{"value": "vegan", "label": "Vegan"}],
            "calorieTarget": 1800,
            "cookingSkillLevel": {"value": "beginner", "label": "Beginner"},
            "_id": "ignored"
        }));
        assert_eq!(p.selections.proteins, Some(vec![opt("tofu", "Tofu")]));
        assert_eq!(
            p.selections.dietary_restrictions,
            Some(vec![opt("vegan", "Vegan")])
        );
        assert_eq!(p.calorie_target, Some(1800));
        assert!(p.selections.fruits.is_none());
    }

    #[test]
    fn validation_bounds() {
        assert!(patch(json!({"calorieTarget": 5000})).validate().is_ok());
        assert!(patch(json!({"calorieTarget": 500})).validate().is_ok());
        assert!(patch(json!({"calorieTarget": 6000})).validate().is_err());
        assert!(patch(json!({"calorieTarget": 499})).validate().is_err());
        assert!(patch(json!({"averageCookingTime": 4})).validate().is_err());
        assert!(patch(json!({"averageCookingTime": 121})).validate().is_err());
        assert!(patch(json!({"averageCookingTime": 120})).validate().is_ok());

        let long = "x".repeat(MAX_SPECIAL_INSTRUCTIONS + 1);
        assert!(patch(json!({ "specialInstructions": long })).validate().is_err());
    }

    #[test]
    fn apply_only_touches_supplied_fields() {
        let mut p = Preferences::new(Uuid::new_v4());
        p.apply(patch(json!({
            "vegetables": [{"value": "spinach", "label": "Spinach"}],
            "averageCookingTime": 45,
            "customIngredients": "saffron"
        })));
        p.apply(patch(json!({ "calorieTarget": 2500, "vegetables": null })));

        assert_eq!(p.selections.vegetables, vec![opt("spinach", "Spinach")]);
        assert_eq!(p.average_cooking_time, 45);
        assert_eq!(p.calorie_target, 2500);
        assert_eq!(p.custom_ingredients, "saffron");
    }

    #[test]
    fn serializes_flat_camel_case() {
        let mut p = Preferences::new(Uuid::new_v4());
        p.selections.oils.push(opt("olive oil", "Olive Oil"));
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["oils"][0]["label"], "Olive Oil");
        assert_eq!(v["averageCookingTime"], 30);
        assert!(v["userId"].is_string());
        assert!(v["updatedAt"].is_string());
    }

    #[test]
    fn prompt_snapshot_drops_bookkeeping() {
        let p = Preferences::new(Uuid::new_v4());
        let v = p.prompt_snapshot();
        assert!(v.get("id").is_none());
        assert!(v.get("userId").is_none());
        assert!(v.get("updatedAt").is_none());
        assert_eq!(v["calorieTarget"], 2000);
    }
}
