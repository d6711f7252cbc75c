//! In-memory stand-ins for the Postgres repositories and the completion API.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use axum::{extract::FromRef, http::StatusCode};
use futures_util::{stream, StreamExt};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::{User, UserRepo},
    },
    chat::{
        client::{CompletionClient, TokenStream},
        dto::ChatMessage,
    },
    error::{AppError, AppResult},
    preferences::{
        model::Preferences,
        repo::{PreferencesRepo, SaveOutcome},
    },
    state::AppState,
};

#[derive(Default)]
pub struct MemoryUserRepo {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, name: &str, email: &str, password_hash: &str) -> AppResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: OffsetDateTime::now_utc(),
            last_login_at: None,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn touch_last_login(&self, id: Uuid) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        if let Some(u) = users.iter_mut().find(|u| u.id == id) {
            u.last_login_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPreferencesRepo {
    records: Mutex<HashMap<Uuid, Preferences>>,
}

impl MemoryPreferencesRepo {
    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl PreferencesRepo for MemoryPreferencesRepo {
    async fn find_by_user(&self, user_id: Uuid) -> AppResult<Option<Preferences>> {
        Ok(self.records.lock().unwrap().get(&user_id).cloned())
    }

    async fn save(&self, prefs: &Preferences) -> AppResult<SaveOutcome> {
        let previous = self
            .records
            .lock()
            .unwrap()
            .insert(prefs.user_id, prefs.clone());
        Ok(match previous {
            Some(_) => SaveOutcome::Updated,
            None => SaveOutcome::Created,
        })
    }
}

enum Script {
    Tokens(Vec<String>),
    Fail(StatusCode, String),
}

/// Replays a fixed answer and records every transcript it was sent.
pub struct ScriptedCompletions {
    script: Script,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedCompletions {
    pub fn tokens(tokens: &[&str]) -> Self {
        Self {
            script: Script::Tokens(tokens.iter().map(|t| t.to_string()).collect()),
            seen: Mutex::default(),
        }
    }

    pub fn failing(status: StatusCode, message: &str) -> Self {
        Self {
            script: Script::Fail(status, message.into()),
            seen: Mutex::default(),
        }
    }

    pub fn transcripts(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletions {
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> AppResult<TokenStream> {
        self.seen.lock().unwrap().push(messages);
        match &self.script {
            Script::Tokens(tokens) => Ok(stream::iter(tokens.clone().into_iter().map(Ok)).boxed()),
            Script::Fail(status, message) => Err(AppError::Upstream {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}

/// Fresh user id plus a valid access token for it.
pub fn session_for(state: &AppState) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let token = JwtKeys::from_ref(state).sign_access(user_id).unwrap();
    (user_id, token)
}
