//! Room actor: an isolated Tokio task that owns one trivia room.
//!
//! The actor holds the room's [`RoomSession`] and its [`RoundTimer`] and
//! multiplexes the two in a single `select!` loop. Commands from the
//! outside and deadlines from the timer are handled one at a time, so a
//! round timeout can never race an answer or a manual advance.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use trivia_protocol::{
    PlayerId, PlayerSummary, Recipient, RoomCode, RoomPhase, RoomSnapshot,
    ServerEvent, TriviaId,
};
use trivia_timer::{Deadline, DeadlineKind, RoundTimer};

use crate::config::display_secs;
use crate::{
    AnswerOutcome, Broadcaster, JoinOutcome, Player, Question, RoomConfig,
    RoomError, RoomSession,
};

/// Commands sent to a room actor through its channel. Every variant
/// except `Shutdown` carries a reply channel.
pub(crate) enum RoomCommand {
    Join {
        name: String,
        is_admin: bool,
        reply: oneshot::Sender<Result<JoinOutcome, RoomError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Option<Player>>,
    },
    SetOpen {
        open: bool,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Start {
        questions: Vec<Question>,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Answer {
        player_id: PlayerId,
        answer: String,
        reply: oneshot::Sender<Option<AnswerOutcome>>,
    },
    NextRound {
        reply: oneshot::Sender<bool>,
    },
    End {
        reply: oneshot::Sender<bool>,
    },
    Ranking {
        reply: oneshot::Sender<Vec<PlayerSummary>>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

impl RoomCommand {
    /// Read-only commands do not count as room activity.
    fn is_query(&self) -> bool {
        matches!(
            self,
            Self::Ranking { .. } | Self::Snapshot { .. } | Self::Info { .. }
        )
    }
}

/// Room metadata, cheaper than a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomCode,
    pub trivia_id: Option<TriviaId>,
    pub phase: RoomPhase,
    /// Non-admin players.
    pub player_count: usize,
    pub max_players: usize,
    pub round: u32,
    pub total_rounds: u32,
    /// Time since the room last received a command.
    pub idle_for: Duration,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomCode {
        &self.room_id
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn join(
        &self,
        name: impl Into<String>,
        is_admin: bool,
    ) -> Result<JoinOutcome, RoomError> {
        let name = name.into();
        self.request(|reply| RoomCommand::Join {
            name,
            is_admin,
            reply,
        })
        .await?
    }

    pub async fn leave(
        &self,
        player_id: PlayerId,
    ) -> Result<Option<Player>, RoomError> {
        self.request(|reply| RoomCommand::Leave { player_id, reply })
            .await
    }

    pub async fn set_open(&self, open: bool) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::SetOpen { open, reply })
            .await?
    }

    pub async fn start(
        &self,
        questions: Vec<Question>,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Start { questions, reply })
            .await?
    }

    pub async fn submit_answer(
        &self,
        player_id: PlayerId,
        answer: impl Into<String>,
    ) -> Result<Option<AnswerOutcome>, RoomError> {
        let answer = answer.into();
        self.request(|reply| RoomCommand::Answer {
            player_id,
            answer,
            reply,
        })
        .await
    }

    pub async fn next_round(&self) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::NextRound { reply }).await
    }

    pub async fn end(&self) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::End { reply }).await
    }

    pub async fn ranking(&self) -> Result<Vec<PlayerSummary>, RoomError> {
        self.request(|reply| RoomCommand::Ranking { reply }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Info { reply }).await
    }

    /// Tells the room to stop. Pending deadlines are dropped.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct RoomActor<B: Broadcaster> {
    session: RoomSession,
    config: RoomConfig,
    timer: RoundTimer,
    broadcaster: Arc<B>,
    receiver: mpsc::Receiver<RoomCommand>,
    /// Answers are taken only while a question is on screen: not during
    /// the start countdown, not after the round closed.
    round_open: bool,
    last_activity: Instant,
}

impl<B: Broadcaster> RoomActor<B> {
    async fn run(mut self) {
        tracing::info!(room_id = %self.code(), "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !cmd.is_query() {
                        self.last_activity = Instant::now();
                    }
                    if !self.handle(cmd) {
                        break;
                    }
                }
                deadline = self.timer.wait() => self.on_deadline(deadline),
            }
        }

        tracing::info!(
            room_id = %self.code(),
            timer = ?self.timer.stats(),
            "room actor stopped"
        );
    }

    /// Applies one command. Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                name,
                is_admin,
                reply,
            } => {
                let result = self.handle_join(&name, is_admin);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                let removed = self.handle_leave(&player_id);
                let _ = reply.send(removed);
            }
            RoomCommand::SetOpen { open, reply } => {
                let result = self.handle_set_open(open);
                let _ = reply.send(result);
            }
            RoomCommand::Start { questions, reply } => {
                let result = self.handle_start(questions);
                let _ = reply.send(result);
            }
            RoomCommand::Answer {
                player_id,
                answer,
                reply,
            } => {
                let outcome = self.handle_answer(&player_id, &answer);
                let _ = reply.send(outcome);
            }
            RoomCommand::NextRound { reply } => {
                let advanced = self.handle_next_round();
                let _ = reply.send(advanced);
            }
            RoomCommand::End { reply } => {
                self.handle_end();
                let _ = reply.send(true);
            }
            RoomCommand::Ranking { reply } => {
                let _ = reply.send(self.session.ranking_summaries());
            }
            RoomCommand::Snapshot { reply } => {
                let mut snapshot = self.session.snapshot();
                // not on screen until `newRound` goes out
                if !self.round_open {
                    snapshot.current_question = None;
                }
                let _ = reply.send(snapshot);
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.code(), "room shutting down");
                self.timer.cancel();
                return false;
            }
        }
        true
    }

    fn handle_join(
        &mut self,
        name: &str,
        is_admin: bool,
    ) -> Result<JoinOutcome, RoomError> {
        let outcome = self.session.join(name, is_admin)?;
        if outcome.reconnected {
            tracing::info!(
                room_id = %self.code(),
                player_id = %outcome.player.id,
                "player reconnected"
            );
        } else {
            tracing::info!(
                room_id = %self.code(),
                player_id = %outcome.player.id,
                is_admin,
                players = self.session.non_admin_count(),
                "player joined"
            );
            self.broadcast(ServerEvent::PlayerJoined {
                player: outcome.player.summary(),
            });
        }
        Ok(outcome)
    }

    fn handle_leave(&mut self, player_id: &PlayerId) -> Option<Player> {
        let removed = self.session.remove_player(player_id)?;
        tracing::info!(
            room_id = %self.code(),
            %player_id,
            players = self.session.non_admin_count(),
            "player left"
        );
        self.broadcast(ServerEvent::PlayerLeft {
            player: removed.summary(),
        });
        if self.session.phase().is_running() && !removed.is_admin {
            self.broadcast_ranking();
            self.check_all_answered();
        }
        Some(removed)
    }

    fn handle_set_open(&mut self, open: bool) -> Result<(), RoomError> {
        if !self.session.set_open(open)? {
            return Ok(());
        }
        let room_id = self.code().clone();
        tracing::info!(%room_id, open, "room status changed");
        self.broadcast(if open {
            ServerEvent::RoomActivated { room_id }
        } else {
            ServerEvent::RoomDeactivated { room_id }
        });
        Ok(())
    }

    fn handle_start(
        &mut self,
        questions: Vec<Question>,
    ) -> Result<(), RoomError> {
        self.session.start(questions)?;
        tracing::info!(
            room_id = %self.code(),
            players = self.session.non_admin_count(),
            rounds = self.session.total_rounds(),
            "game starting"
        );

        let countdown = self.config.start_countdown;
        if countdown.is_zero() {
            self.begin_game();
        } else {
            self.broadcast(ServerEvent::Countdown {
                seconds: display_secs(countdown),
            });
            self.timer
                .arm(DeadlineKind::Countdown, self.session.round(), countdown);
        }
        Ok(())
    }

    fn handle_answer(
        &mut self,
        player_id: &PlayerId,
        answer: &str,
    ) -> Option<AnswerOutcome> {
        if !self.round_open {
            return None;
        }
        let outcome =
            self.session.submit_answer(player_id, answer, Instant::now())?;

        tracing::debug!(
            room_id = %self.code(),
            %player_id,
            round = self.session.round(),
            correct = outcome.correct,
            score = outcome.score,
            "answer recorded"
        );
        self.deliver(
            Recipient::Player(player_id.clone()),
            ServerEvent::AnswerSubmitted {
                correct: outcome.correct,
                score: outcome.score,
            },
        );
        self.broadcast_ranking();
        self.check_all_answered();
        Some(outcome)
    }

    /// Manual advance. During the start countdown this skips straight to
    /// the first question.
    fn handle_next_round(&mut self) -> bool {
        if !self.session.phase().is_running() {
            return false;
        }
        let in_countdown = self
            .timer
            .pending()
            .is_some_and(|d| d.kind == DeadlineKind::Countdown);
        if in_countdown {
            self.timer.cancel();
            self.begin_game();
            return true;
        }
        self.advance()
    }

    fn handle_end(&mut self) {
        let was_armed = self.timer.cancel().is_some();
        self.round_open = false;
        let changed = self.session.end();
        if changed || was_armed {
            tracing::info!(room_id = %self.code(), "game ended by operator");
            self.broadcast_game_ended();
        }
    }

    fn on_deadline(&mut self, deadline: Deadline) {
        let phase = self.session.phase();
        let current = self.session.round();
        if deadline.round != current {
            tracing::debug!(
                room_id = %self.code(),
                kind = ?deadline.kind,
                round = deadline.round,
                current,
                "stale deadline ignored"
            );
            return;
        }

        match deadline.kind {
            DeadlineKind::Countdown if phase.is_running() => self.begin_game(),
            DeadlineKind::RoundTimeout | DeadlineKind::AllAnswered
                if phase.is_running() =>
            {
                tracing::debug!(
                    room_id = %self.code(),
                    kind = ?deadline.kind,
                    round = current,
                    "round closed"
                );
                self.advance();
            }
            DeadlineKind::GameEnding if phase == RoomPhase::Ended => {
                tracing::info!(room_id = %self.code(), "game ended");
                self.broadcast_game_ended();
            }
            kind => {
                tracing::debug!(
                    room_id = %self.code(),
                    ?kind,
                    %phase,
                    "deadline no longer applies"
                );
            }
        }
    }

    /// Closes the current round and shows the next one, or starts the
    /// end sequence after the last round.
    fn advance(&mut self) -> bool {
        self.round_open = false;
        self.timer.cancel();
        if self.session.next_round() {
            self.begin_round();
            return true;
        }
        if self.session.phase() == RoomPhase::Ended {
            tracing::info!(
                room_id = %self.code(),
                rounds = self.session.total_rounds(),
                "last round closed"
            );
            self.broadcast(ServerEvent::GameEnding {
                countdown: display_secs(self.config.end_delay),
            });
            self.timer.arm(
                DeadlineKind::GameEnding,
                self.session.round(),
                self.config.end_delay,
            );
        }
        false
    }

    fn begin_game(&mut self) {
        self.broadcast(ServerEvent::GameStarted {
            total_rounds: self.session.total_rounds(),
        });
        self.begin_round();
    }

    fn begin_round(&mut self) {
        let Some(question) = self.session.current_question() else {
            return;
        };
        let event = ServerEvent::NewRound {
            round: self.session.round(),
            total_rounds: self.session.total_rounds(),
            question: question.question.clone(),
            options: question.options.clone(),
            timer_seconds: display_secs(self.config.round_time),
        };

        tracing::info!(
            room_id = %self.code(),
            round = self.session.round(),
            "round started"
        );
        self.broadcast(event);
        self.round_open = true;
        self.timer.arm(
            DeadlineKind::RoundTimeout,
            self.session.round(),
            self.config.round_time,
        );
    }

    fn check_all_answered(&mut self) {
        if self.round_open && self.session.all_answered() {
            self.timer.arm_if_sooner(
                DeadlineKind::AllAnswered,
                self.session.round(),
                self.config.settle_delay,
            );
        }
    }

    fn broadcast_ranking(&self) {
        self.broadcast(ServerEvent::RankingUpdated {
            ranking: self.session.ranking_summaries(),
        });
    }

    fn broadcast_game_ended(&self) {
        self.broadcast(ServerEvent::GameEnded {
            ranking: self.session.ranking_summaries(),
        });
    }

    fn broadcast(&self, event: ServerEvent) {
        self.deliver(Recipient::Room, event);
    }

    fn deliver(&self, to: Recipient, event: ServerEvent) {
        self.broadcaster.deliver(self.session.code(), to, event);
    }

    fn code(&self) -> &RoomCode {
        self.session.code()
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.code().clone(),
            trivia_id: self.session.trivia_id().cloned(),
            phase: self.session.phase(),
            player_count: self.session.non_admin_count(),
            max_players: self.session.max_players(),
            round: self.session.round(),
            total_rounds: self.session.total_rounds(),
            idle_for: self.last_activity.elapsed(),
        }
    }
}

/// Spawns a room actor and returns a handle to it.
///
/// The command channel is bounded by `config.channel_size`; callers wait
/// when a room falls behind.
pub(crate) fn spawn_room<B: Broadcaster>(
    room_id: RoomCode,
    trivia_id: Option<TriviaId>,
    config: RoomConfig,
    broadcaster: Arc<B>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);

    let actor = RoomActor {
        session: RoomSession::new(
            room_id.clone(),
            trivia_id,
            config.max_players,
        ),
        config,
        timer: RoundTimer::new(),
        broadcaster,
        receiver: rx,
        round_open: false,
        last_activity: Instant::now(),
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
