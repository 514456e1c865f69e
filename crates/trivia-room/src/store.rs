//! Question set storage.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use trivia_protocol::TriviaId;

use crate::{Question, StoreError};

/// Most questions a trivia may hold.
pub const MAX_QUESTIONS: usize = 10;
/// Fewest options a question may offer.
pub const MIN_OPTIONS: usize = 2;
/// Most options a question may offer.
pub const MAX_OPTIONS: usize = 4;

/// A named, ordered question set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trivia {
    pub id: TriviaId,
    #[serde(default)]
    pub title: String,
    pub questions: Vec<Question>,
}

/// Source of question sets.
///
/// The room layer calls this once per game start, before anything in the
/// room changes, so a failing store leaves the room untouched.
pub trait TriviaStore: Send + Sync + 'static {
    /// Fetches the trivia with `id`.
    fn trivia(
        &self,
        id: &TriviaId,
    ) -> impl Future<Output = Result<Trivia, StoreError>> + Send;
}

/// Checks the shape rules every playable question set must meet.
///
/// 1 to [`MAX_QUESTIONS`] questions, each with non-empty text,
/// [`MIN_OPTIONS`] to [`MAX_OPTIONS`] options, and a correct answer that
/// names one of them.
pub fn validate_questions(questions: &[Question]) -> Result<(), StoreError> {
    if questions.is_empty() {
        return Err(StoreError::Malformed("question set is empty".into()));
    }
    if questions.len() > MAX_QUESTIONS {
        return Err(StoreError::Malformed(format!(
            "{} questions, at most {MAX_QUESTIONS} allowed",
            questions.len()
        )));
    }

    for (i, q) in questions.iter().enumerate() {
        let n = i + 1;
        if q.question.trim().is_empty() {
            return Err(StoreError::Malformed(format!(
                "question {n} has no text"
            )));
        }
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&q.options.len()) {
            return Err(StoreError::Malformed(format!(
                "question {n} has {} options, expected {MIN_OPTIONS} to {MAX_OPTIONS}",
                q.options.len()
            )));
        }
        if !q.options.iter().any(|opt| q.is_correct(opt)) {
            return Err(StoreError::Malformed(format!(
                "question {n} answer is not one of its options"
            )));
        }
    }
    Ok(())
}

/// In-memory [`TriviaStore`], typically loaded from a JSON file at
/// startup.
#[derive(Debug, Default)]
pub struct MemoryTriviaStore {
    trivias: RwLock<HashMap<TriviaId, Trivia>>,
}

impl MemoryTriviaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON array of trivias. Every entry is validated; one bad
    /// entry rejects the whole document.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let list: Vec<Trivia> = serde_json::from_str(json)?;
        let mut trivias = HashMap::with_capacity(list.len());
        for trivia in list {
            validate_questions(&trivia.questions).map_err(|err| {
                StoreError::Malformed(format!("trivia {}: {err}", trivia.id))
            })?;
            trivias.insert(trivia.id.clone(), trivia);
        }
        Ok(Self {
            trivias: RwLock::new(trivias),
        })
    }

    /// Reads and parses a trivia file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Adds or replaces a trivia after validating it.
    pub async fn insert(&self, trivia: Trivia) -> Result<(), StoreError> {
        validate_questions(&trivia.questions)?;
        self.trivias.write().await.insert(trivia.id.clone(), trivia);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.trivias.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.trivias.read().await.is_empty()
    }
}

impl TriviaStore for MemoryTriviaStore {
    async fn trivia(&self, id: &TriviaId) -> Result<Trivia, StoreError> {
        self.trivias
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}
