//! Room manager: creates, tracks, and routes requests to rooms.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use trivia_protocol::{
    PlayerId, PlayerSummary, RoomCode, RoomPhase, RoomSnapshot, TriviaId,
};

use crate::room::spawn_room;
use crate::{
    AnswerOutcome, Broadcaster, JoinOutcome, Question, RoomConfig, RoomError,
    RoomHandle, RoomInfo, StoreError, TriviaStore, validate_questions,
};

/// Registry of live rooms.
///
/// The map lock is only held to look up or insert a handle, never across
/// a call into a room, so a slow room cannot stall the others. All
/// per-room ordering comes from the room's own actor.
pub struct RoomManager<S: TriviaStore, B: Broadcaster> {
    rooms: RwLock<HashMap<RoomCode, RoomHandle>>,
    store: Arc<S>,
    broadcaster: Arc<B>,
    config: RoomConfig,
}

impl<S: TriviaStore, B: Broadcaster> RoomManager<S, B> {
    pub fn new(store: Arc<S>, broadcaster: Arc<B>, config: RoomConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            store,
            broadcaster,
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a room if none exists under `code` and returns its handle.
    ///
    /// Idempotent: an existing room is returned untouched, including its
    /// trivia assignment.
    pub async fn create_room(
        &self,
        code: RoomCode,
        trivia_id: Option<TriviaId>,
    ) -> RoomHandle {
        let mut rooms = self.rooms.write().await;
        if let Some(handle) = rooms.get(&code) {
            if !handle.is_closed() {
                return handle.clone();
            }
            tracing::warn!(room_id = %code, "replacing stopped room");
        }

        let handle = spawn_room(
            code.clone(),
            trivia_id.clone(),
            self.config.clone(),
            Arc::clone(&self.broadcaster),
        );
        rooms.insert(code.clone(), handle.clone());
        tracing::info!(
            room_id = %code,
            trivia_id = trivia_id.as_ref().map(TriviaId::as_str),
            rooms = rooms.len(),
            "room created"
        );
        handle
    }

    /// Adds a player to an existing room, or returns the existing record
    /// when the name is already there.
    pub async fn join_room(
        &self,
        code: &RoomCode,
        name: &str,
        is_admin: bool,
    ) -> Result<JoinOutcome, RoomError> {
        self.handle(code).await?.join(name, is_admin).await
    }

    /// Opens or closes a room for starting.
    pub async fn set_room_open(
        &self,
        code: &RoomCode,
        open: bool,
    ) -> Result<(), RoomError> {
        self.handle(code).await?.set_open(open).await
    }

    /// Starts a game with an explicit question set.
    pub async fn start_game(
        &self,
        code: &RoomCode,
        questions: Vec<Question>,
    ) -> Result<(), RoomError> {
        let handle = self.handle(code).await?;
        validate_questions(&questions)?;
        handle.start(questions).await
    }

    /// Starts a game with questions fetched from the store.
    ///
    /// `trivia_id` overrides the room's assigned trivia. The phase is
    /// checked before the fetch so a room that cannot start never costs a
    /// store round trip; the actor checks again when it applies the start.
    pub async fn start_game_from_store(
        &self,
        code: &RoomCode,
        trivia_id: Option<TriviaId>,
    ) -> Result<(), RoomError> {
        let handle = self.handle(code).await?;
        let info = handle.info().await?;
        match info.phase {
            RoomPhase::Open => {}
            RoomPhase::Created => {
                return Err(RoomError::RoomNotActive(code.clone()));
            }
            RoomPhase::InProgress | RoomPhase::Ended => {
                return Err(RoomError::GameAlreadyStarted(code.clone()));
            }
        }

        let trivia_id = trivia_id
            .or(info.trivia_id)
            .ok_or(StoreError::Unassigned)?;
        let trivia = self.store.trivia(&trivia_id).await.inspect_err(|err| {
            tracing::warn!(
                room_id = %code,
                %trivia_id,
                error = %err,
                "trivia load failed"
            );
        })?;
        validate_questions(&trivia.questions)?;

        tracing::debug!(
            room_id = %code,
            %trivia_id,
            questions = trivia.questions.len(),
            "trivia loaded"
        );
        handle.start(trivia.questions).await
    }

    /// Records an answer. `None` when the room is missing or the answer
    /// is ignored.
    pub async fn submit_answer(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
        answer: &str,
    ) -> Option<AnswerOutcome> {
        let handle = self.handle(code).await.ok()?;
        handle
            .submit_answer(player_id.clone(), answer)
            .await
            .ok()
            .flatten()
    }

    /// Advances the round by hand. `true` if a new round is showing.
    pub async fn next_round(&self, code: &RoomCode) -> bool {
        match self.handle(code).await {
            Ok(handle) => handle.next_round().await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Current ranking; empty when the room is missing.
    pub async fn ranking(&self, code: &RoomCode) -> Vec<PlayerSummary> {
        match self.handle(code).await {
            Ok(handle) => handle.ranking().await.unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Ends the game. `false` only when the room is missing.
    pub async fn end_game(&self, code: &RoomCode) -> bool {
        match self.handle(code).await {
            Ok(handle) => handle.end().await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Removes a player. Missing rooms and players are a no-op.
    pub async fn remove_player(&self, code: &RoomCode, player_id: &PlayerId) {
        if let Ok(handle) = self.handle(code).await {
            let _ = handle.leave(player_id.clone()).await;
        }
    }

    pub async fn snapshot(
        &self,
        code: &RoomCode,
    ) -> Result<RoomSnapshot, RoomError> {
        self.handle(code).await?.snapshot().await
    }

    pub async fn room_info(&self, code: &RoomCode) -> Result<RoomInfo, RoomError> {
        self.handle(code).await?.info().await
    }

    /// Shuts a room down and forgets it.
    pub async fn destroy_room(&self, code: &RoomCode) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .write()
            .await
            .remove(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;

        let _ = handle.shutdown().await;
        tracing::info!(room_id = %code, "room destroyed");
        Ok(())
    }

    /// Destroys rooms that have seen no command for `max_idle` and are
    /// not mid-game. Rooms whose actor is gone are dropped too. Returns
    /// the evicted codes.
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<RoomCode> {
        let handles: Vec<RoomHandle> =
            self.rooms.read().await.values().cloned().collect();

        let mut evicted = Vec::new();
        for handle in handles {
            let idle = match handle.info().await {
                Ok(info) => {
                    !info.phase.is_running() && info.idle_for >= max_idle
                }
                Err(_) => true,
            };
            if idle && self.destroy_room(handle.room_id()).await.is_ok() {
                evicted.push(handle.room_id().clone());
            }
        }

        if !evicted.is_empty() {
            tracing::info!(evicted = evicted.len(), "idle rooms evicted");
        }
        evicted
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn room_ids(&self) -> Vec<RoomCode> {
        self.rooms.read().await.keys().cloned().collect()
    }

    async fn handle(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }
}
