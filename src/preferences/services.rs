use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    model::{Preferences, PreferencesPatch},
    repo::{PreferencesRepo, SaveOutcome},
};
use crate::error::AppResult;

/// `None` for a user who has never saved preferences.
pub async fn read(repo: &dyn PreferencesRepo, user_id: Uuid) -> AppResult<Option<Preferences>> {
    repo.find_by_user(user_id).await
}

/// Creates the record from defaults plus the patch, or merges the patch into
/// the existing record. Bounds are checked before the store is touched.
#[instrument(skip(repo, patch))]
pub async fn upsert(
    repo: &dyn PreferencesRepo,
    user_id: Uuid,
    patch: PreferencesPatch,
) -> AppResult<SaveOutcome> {
    patch.validate()?;

    let mut prefs = repo
        .find_by_user(user_id)
        .await?
        .unwrap_or_else(|| Preferences::new(user_id));
    prefs.apply(patch);

    let outcome = repo.save(&prefs).await?;
    info!(?outcome, "preferences saved");
    Ok(outcome)
}
