use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{model::PreferencesPatch, repo::SaveOutcome};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct PreferencesQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SavePreferencesRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub patch: PreferencesPatch,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: &'static str,
}

impl From<SaveOutcome> for SaveResponse {
    fn from(outcome: SaveOutcome) -> Self {
        let message = match outcome {
            SaveOutcome::Created => "Preferences saved",
            SaveOutcome::Updated => "Preferences updated",
        };
        Self { message }
    }
}

pub fn parse_user_id(raw: Option<&str>) -> Result<Uuid, AppError> {
    raw.and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| AppError::validation("Invalid or missing user ID"))
}
