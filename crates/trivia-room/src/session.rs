//! The synchronous state machine for one trivia room.
//!
//! [`RoomSession`] knows nothing about tasks, channels or clocks; the
//! room actor owns one and feeds it commands and timestamps. Keeping it
//! pure lets every scoring and lifecycle rule be tested without a
//! runtime.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use trivia_protocol::{
    PlayerId, PlayerSummary, QuestionView, RoomCode, RoomPhase, RoomSnapshot,
    TriviaId,
};

use crate::{RoomError, StoreError};

/// Points for any correct answer.
pub const BASE_POINTS: u32 = 10;

/// Extra points for the first, second, third and fourth correct answer of
/// a round. Later correct answers earn no bonus.
pub const SPEED_BONUS: [u32; 4] = [5, 4, 3, 2];

const PLAYER_ID_LEN: usize = 8;
const PLAYER_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Speed bonus for a correct answer that follows `prior_correct` other
/// correct answers in the same round.
pub fn speed_bonus(prior_correct: usize) -> u32 {
    SPEED_BONUS.get(prior_correct).copied().unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// One multiple-choice question.
///
/// In trivia documents the correct option is stored under `answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "answer", alias = "correctAnswer")]
    pub correct_answer: String,
}

impl Question {
    /// Whether `answer` matches the correct option, ignoring surrounding
    /// whitespace and case.
    pub fn is_correct(&self, answer: &str) -> bool {
        normalize(answer) == normalize(&self.correct_answer)
    }

    /// The client-facing view, without the answer.
    pub fn view(&self) -> QuestionView {
        QuestionView {
            question: self.question.clone(),
            options: self.options.clone(),
        }
    }
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A participant in a room. Admins run the room and are never scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub is_admin: bool,
    /// When the player answered the current round, if they did.
    pub answered_at: Option<Instant>,
    pub answered_correct: bool,
}

impl Player {
    fn new(id: PlayerId, name: &str, is_admin: bool) -> Self {
        Self {
            id,
            name: name.to_owned(),
            score: 0,
            is_admin,
            answered_at: None,
            answered_correct: false,
        }
    }

    pub fn has_answered(&self) -> bool {
        self.answered_at.is_some()
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            score: self.score,
            is_admin: self.is_admin,
            has_answered: self.has_answered(),
        }
    }

    fn reset_answer(&mut self) {
        self.answered_at = None;
        self.answered_correct = false;
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub player: Player,
    /// The name was already in the room; the existing record is returned
    /// unchanged.
    pub reconnected: bool,
}

/// Result of an accepted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// The player's score after this answer.
    pub score: u32,
}

// ---------------------------------------------------------------------------
// RoomSession
// ---------------------------------------------------------------------------

/// State of one room: roster, phase, questions and the current round.
///
/// The current question is derived from the phase and round rather than
/// stored, so it is present exactly while a game runs.
#[derive(Debug, Clone)]
pub struct RoomSession {
    code: RoomCode,
    trivia_id: Option<TriviaId>,
    phase: RoomPhase,
    players: Vec<Player>,
    questions: Vec<Question>,
    /// 1-based while a game runs, 0 before the first start.
    round: u32,
    correct_this_round: usize,
    max_players: usize,
}

impl RoomSession {
    pub fn new(
        code: RoomCode,
        trivia_id: Option<TriviaId>,
        max_players: usize,
    ) -> Self {
        Self {
            code,
            trivia_id,
            phase: RoomPhase::Created,
            players: Vec::new(),
            questions: Vec::new(),
            round: 0,
            correct_this_round: 0,
            max_players,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn trivia_id(&self) -> Option<&TriviaId> {
        self.trivia_id.as_ref()
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn total_rounds(&self) -> u32 {
        self.questions.len() as u32
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    /// Players that count toward capacity and ranking.
    pub fn non_admin_count(&self) -> usize {
        self.players.iter().filter(|p| !p.is_admin).count()
    }

    /// The question being played, present only while the game runs.
    pub fn current_question(&self) -> Option<&Question> {
        if !self.phase.is_running() || self.round == 0 {
            return None;
        }
        self.questions.get(self.round as usize - 1)
    }

    /// Adds a player, or returns the existing record when the name is
    /// already in the room.
    ///
    /// Names are matched after trimming. Admins do not count toward
    /// capacity.
    pub fn join(
        &mut self,
        name: &str,
        is_admin: bool,
    ) -> Result<JoinOutcome, RoomError> {
        if self.phase.has_started() {
            return Err(RoomError::GameAlreadyStarted(self.code.clone()));
        }

        let name = name.trim();
        if let Some(existing) = self.players.iter().find(|p| p.name == name) {
            return Ok(JoinOutcome {
                player: existing.clone(),
                reconnected: true,
            });
        }

        if !is_admin && self.non_admin_count() >= self.max_players {
            return Err(RoomError::RoomFull(self.code.clone()));
        }

        let player = Player::new(self.generate_player_id(), name, is_admin);
        self.players.push(player.clone());
        Ok(JoinOutcome {
            player,
            reconnected: false,
        })
    }

    /// Opens (`true`) or closes (`false`) the room for starting.
    ///
    /// Returns whether the phase changed. Fails once a game has started.
    pub fn set_open(&mut self, open: bool) -> Result<bool, RoomError> {
        let target = if open { RoomPhase::Open } else { RoomPhase::Created };
        if self.phase == target {
            return Ok(false);
        }
        if !self.phase.can_transition_to(target) {
            return Err(RoomError::GameAlreadyStarted(self.code.clone()));
        }
        self.phase = target;
        Ok(true)
    }

    /// Starts the game with `questions`, showing round 1.
    ///
    /// Nothing changes on failure.
    pub fn start(&mut self, questions: Vec<Question>) -> Result<(), RoomError> {
        match self.phase {
            RoomPhase::Open => {}
            RoomPhase::Created => {
                return Err(RoomError::RoomNotActive(self.code.clone()));
            }
            RoomPhase::InProgress | RoomPhase::Ended => {
                return Err(RoomError::GameAlreadyStarted(self.code.clone()));
            }
        }
        if questions.is_empty() {
            return Err(
                StoreError::Malformed("question set is empty".into()).into()
            );
        }

        self.questions = questions;
        self.round = 1;
        self.phase = RoomPhase::InProgress;
        self.reset_answers();
        Ok(())
    }

    /// Records a player's answer to the current round.
    ///
    /// Returns `None` when the answer is ignored: no game running,
    /// unknown player, admin, or the player already answered this round.
    pub fn submit_answer(
        &mut self,
        player_id: &PlayerId,
        answer: &str,
        now: Instant,
    ) -> Option<AnswerOutcome> {
        let correct = self.current_question()?.is_correct(answer);
        let prior_correct = self.correct_this_round;

        let player = self.players.iter_mut().find(|p| &p.id == player_id)?;
        if player.is_admin || player.has_answered() {
            return None;
        }

        player.answered_at = Some(now);
        player.answered_correct = correct;
        if correct {
            player.score += BASE_POINTS + speed_bonus(prior_correct);
        }
        let score = player.score;

        if correct {
            self.correct_this_round += 1;
        }
        Some(AnswerOutcome { correct, score })
    }

    /// Whether every non-admin player has answered the current round.
    ///
    /// False while no game runs or when there are no non-admin players.
    pub fn all_answered(&self) -> bool {
        if self.current_question().is_none() {
            return false;
        }
        let mut contestants = self.players.iter().filter(|p| !p.is_admin).peekable();
        contestants.peek().is_some() && contestants.all(Player::has_answered)
    }

    /// Moves to the next round, or ends the game after the last one.
    ///
    /// Returns `true` if a new round is now showing. A room that is not
    /// running is left alone.
    pub fn next_round(&mut self) -> bool {
        if !self.phase.is_running() {
            return false;
        }
        if self.round < self.total_rounds() {
            self.round += 1;
            self.reset_answers();
            true
        } else {
            self.phase = RoomPhase::Ended;
            false
        }
    }

    /// Ends the game. Returns whether the phase changed.
    pub fn end(&mut self) -> bool {
        let changed = self.phase != RoomPhase::Ended;
        self.phase = RoomPhase::Ended;
        self.reset_answers();
        changed
    }

    /// Removes a player. Their score leaves with them.
    pub fn remove_player(&mut self, player_id: &PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| &p.id == player_id)?;
        Some(self.players.remove(index))
    }

    /// Non-admin players by descending score. Ties keep join order.
    pub fn ranking(&self) -> Vec<&Player> {
        let mut ranking: Vec<&Player> =
            self.players.iter().filter(|p| !p.is_admin).collect();
        ranking.sort_by(|a, b| b.score.cmp(&a.score));
        ranking
    }

    pub fn ranking_summaries(&self) -> Vec<PlayerSummary> {
        self.ranking().into_iter().map(Player::summary).collect()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.code.clone(),
            trivia_id: self.trivia_id.clone(),
            phase: self.phase,
            round: self.round,
            total_rounds: self.total_rounds(),
            players: self.players.iter().map(Player::summary).collect(),
            current_question: self.current_question().map(Question::view),
            is_active: self.phase == RoomPhase::Open || self.phase.is_running(),
            game_started: self.phase.has_started(),
            accepting_players: self.phase.is_joinable(),
        }
    }

    fn reset_answers(&mut self) {
        self.players.iter_mut().for_each(Player::reset_answer);
        self.correct_this_round = 0;
    }

    fn generate_player_id(&self) -> PlayerId {
        let mut rng = rand::rng();
        loop {
            let id: String = (0..PLAYER_ID_LEN)
                .map(|_| {
                    let i = rng.random_range(0..PLAYER_ID_ALPHABET.len());
                    PLAYER_ID_ALPHABET[i] as char
                })
                .collect();
            let id = PlayerId::new(id);
            if self.player(&id).is_none() {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn session() -> RoomSession {
        RoomSession::new(RoomCode::parse("AB12").unwrap(), None, 10)
    }

    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                question: format!("Q{}", i + 1),
                options: vec!["A".into(), "B".into()],
                correct_answer: "A".into(),
            })
            .collect()
    }

    fn started(players: &[&str], rounds: usize) -> (RoomSession, Vec<PlayerId>) {
        let mut s = session();
        let ids = players
            .iter()
            .map(|name| s.join(name, false).unwrap().player.id)
            .collect();
        s.set_open(true).unwrap();
        s.start(questions(rounds)).unwrap();
        (s, ids)
    }

    // -- join ---------------------------------------------------------------

    #[test]
    fn test_join_assigns_unique_base36_ids() {
        let mut s = session();
        let a = s.join("Ana", false).unwrap();
        let b = s.join("Ben", false).unwrap();

        assert!(!a.reconnected);
        assert_ne!(a.player.id, b.player.id);
        assert_eq!(a.player.id.as_str().len(), 8);
        assert!(
            a.player
                .id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        );
    }

    #[test]
    fn test_rejoin_with_same_name_returns_existing_player() {
        let mut s = session();
        let first = s.join("Ana", false).unwrap();
        let second = s.join("  Ana ", true).unwrap();

        assert!(second.reconnected);
        assert_eq!(second.player, first.player);
        assert!(!second.player.is_admin, "record is returned unchanged");
        assert_eq!(s.players().len(), 1);
    }

    #[test]
    fn test_join_full_room_rejected_but_admin_admitted() {
        let mut s = RoomSession::new(RoomCode::parse("AB12").unwrap(), None, 2);
        s.join("Ana", false).unwrap();
        s.join("Ben", false).unwrap();

        let err = s.join("Cy", false).unwrap_err();
        assert!(matches!(err, RoomError::RoomFull(_)));
        assert!(s.join("Host", true).is_ok());
        assert_eq!(s.non_admin_count(), 2);
    }

    #[test]
    fn test_full_room_still_accepts_reconnect() {
        let mut s = RoomSession::new(RoomCode::parse("AB12").unwrap(), None, 1);
        s.join("Ana", false).unwrap();
        assert!(s.join("Ana", false).unwrap().reconnected);
    }

    #[test]
    fn test_join_after_start_rejected() {
        let (mut s, _) = started(&["Ana"], 2);
        let err = s.join("Ben", false).unwrap_err();
        assert!(matches!(err, RoomError::GameAlreadyStarted(_)));

        s.end();
        let err = s.join("Ben", false).unwrap_err();
        assert!(matches!(err, RoomError::GameAlreadyStarted(_)));
    }

    // -- lifecycle ----------------------------------------------------------

    #[test]
    fn test_start_requires_open_room() {
        let mut s = session();
        let err = s.start(questions(3)).unwrap_err();
        assert!(matches!(err, RoomError::RoomNotActive(_)));
        assert_eq!(s.phase(), RoomPhase::Created);
    }

    #[test]
    fn test_start_shows_first_round() {
        let (s, _) = started(&["Ana"], 3);
        assert_eq!(s.phase(), RoomPhase::InProgress);
        assert_eq!(s.round(), 1);
        assert_eq!(s.total_rounds(), 3);
        assert_eq!(s.current_question().unwrap().question, "Q1");
    }

    #[test]
    fn test_second_start_fails_and_leaves_state_intact() {
        let (mut s, _) = started(&["Ana"], 3);
        s.next_round();

        let err = s.start(questions(5)).unwrap_err();
        assert!(matches!(err, RoomError::GameAlreadyStarted(_)));
        assert_eq!(s.round(), 2);
        assert_eq!(s.total_rounds(), 3);
    }

    #[test]
    fn test_start_with_empty_questions_fails_without_changes() {
        let mut s = session();
        s.set_open(true).unwrap();
        let err = s.start(Vec::new()).unwrap_err();
        assert!(matches!(err, RoomError::TriviaLoadFailure(_)));
        assert_eq!(s.phase(), RoomPhase::Open);
        assert_eq!(s.round(), 0);
    }

    #[test]
    fn test_set_open_toggles_until_start() {
        let mut s = session();
        assert!(s.set_open(true).unwrap());
        assert!(!s.set_open(true).unwrap(), "already open");
        assert!(s.set_open(false).unwrap());
        assert_eq!(s.phase(), RoomPhase::Created);

        s.set_open(true).unwrap();
        s.start(questions(1)).unwrap();
        assert!(matches!(
            s.set_open(false),
            Err(RoomError::GameAlreadyStarted(_))
        ));
    }

    #[test]
    fn test_next_round_past_last_ends_game() {
        let (mut s, _) = started(&["Ana"], 2);
        assert!(s.next_round());
        assert_eq!(s.round(), 2);

        assert!(!s.next_round());
        assert_eq!(s.phase(), RoomPhase::Ended);
        assert_eq!(s.round(), 2);
        assert!(s.current_question().is_none());

        assert!(!s.next_round(), "ended room stays ended");
        assert_eq!(s.round(), 2);
    }

    #[test]
    fn test_end_is_idempotent() {
        let (mut s, _) = started(&["Ana"], 2);
        assert!(s.end());
        assert!(!s.end());
        assert_eq!(s.phase(), RoomPhase::Ended);
    }

    // -- answers ------------------------------------------------------------

    #[test]
    fn test_first_correct_answer_scores_fifteen() {
        let (mut s, ids) = started(&["Ana"], 3);
        let outcome = s.submit_answer(&ids[0], " a ", Instant::now()).unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.score, 15);
    }

    #[test]
    fn test_speed_bonus_by_correct_answer_order() {
        let names = ["P1", "P2", "P3", "P4", "P5"];
        let (mut s, ids) = started(&names, 1);
        let now = Instant::now();

        let scores: Vec<u32> = ids
            .iter()
            .map(|id| s.submit_answer(id, "A", now).unwrap().score)
            .collect();
        assert_eq!(scores, vec![15, 14, 13, 12, 10]);
    }

    #[test]
    fn test_wrong_answer_does_not_consume_bonus() {
        let (mut s, ids) = started(&["Ana", "Ben"], 1);
        let now = Instant::now();

        let wrong = s.submit_answer(&ids[0], "B", now).unwrap();
        assert!(!wrong.correct);
        assert_eq!(wrong.score, 0);

        let right = s.submit_answer(&ids[1], "A", now).unwrap();
        assert_eq!(right.score, 15);
    }

    #[test]
    fn test_second_answer_in_round_ignored() {
        let (mut s, ids) = started(&["Ana"], 2);
        let now = Instant::now();
        s.submit_answer(&ids[0], "B", now).unwrap();

        assert!(s.submit_answer(&ids[0], "A", now).is_none());
        assert_eq!(s.player(&ids[0]).unwrap().score, 0);
    }

    #[test]
    fn test_admin_and_unknown_answers_ignored() {
        let mut s = session();
        let admin = s.join("Host", true).unwrap().player.id;
        s.join("Ana", false).unwrap();
        s.set_open(true).unwrap();
        s.start(questions(1)).unwrap();

        assert!(s.submit_answer(&admin, "A", Instant::now()).is_none());
        assert!(
            s.submit_answer(&PlayerId::new("nobody00"), "A", Instant::now())
                .is_none()
        );
    }

    #[test]
    fn test_answer_before_start_ignored() {
        let mut s = session();
        let id = s.join("Ana", false).unwrap().player.id;
        assert!(s.submit_answer(&id, "A", Instant::now()).is_none());
    }

    #[test]
    fn test_new_round_resets_answers_and_bonus() {
        let (mut s, ids) = started(&["Ana", "Ben"], 2);
        let now = Instant::now();
        s.submit_answer(&ids[0], "A", now);
        s.submit_answer(&ids[1], "A", now);
        assert!(s.all_answered());

        s.next_round();
        assert!(!s.all_answered());
        assert!(s.players().iter().all(|p| !p.has_answered()));

        let later = now + Duration::from_secs(3);
        let outcome = s.submit_answer(&ids[1], "A", later).unwrap();
        assert_eq!(outcome.score, 14 + 15);
    }

    #[test]
    fn test_all_answered_ignores_admins() {
        let mut s = session();
        s.join("Host", true).unwrap();
        let ana = s.join("Ana", false).unwrap().player.id;
        s.set_open(true).unwrap();
        s.start(questions(1)).unwrap();

        assert!(!s.all_answered());
        s.submit_answer(&ana, "B", Instant::now());
        assert!(s.all_answered());
    }

    #[test]
    fn test_all_answered_false_without_contestants() {
        let mut s = session();
        s.join("Host", true).unwrap();
        s.set_open(true).unwrap();
        s.start(questions(1)).unwrap();
        assert!(!s.all_answered());
    }

    #[test]
    fn test_removing_last_unanswered_player_completes_round() {
        let (mut s, ids) = started(&["Ana", "Ben"], 2);
        s.submit_answer(&ids[0], "A", Instant::now());
        assert!(!s.all_answered());

        let removed = s.remove_player(&ids[1]).unwrap();
        assert_eq!(removed.name, "Ben");
        assert!(s.all_answered());
        assert!(s.remove_player(&ids[1]).is_none());
    }

    // -- ranking and snapshot -----------------------------------------------

    #[test]
    fn test_ranking_sorted_desc_and_stable_on_ties() {
        let mut s = session();
        s.join("Host", true).unwrap();
        let ids: Vec<PlayerId> = ["Ana", "Ben", "Cy"]
            .iter()
            .map(|n| s.join(n, false).unwrap().player.id)
            .collect();
        s.set_open(true).unwrap();
        s.start(questions(1)).unwrap();
        s.submit_answer(&ids[2], "A", Instant::now());

        let names: Vec<&str> =
            s.ranking().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Cy", "Ana", "Ben"]);
    }

    #[test]
    fn test_ranking_keeps_insertion_order_for_equal_scores() {
        let mut s = session();
        s.join("Host", true).unwrap();
        for name in ["Ana", "Ben", "Cy", "Dee"] {
            s.join(name, false).unwrap();
        }
        let contestants = s.players.iter_mut().filter(|p| !p.is_admin);
        for (player, score) in contestants.zip([30, 10, 30, 0]) {
            player.score = score;
        }

        let ranking = s.ranking();
        let ranked: Vec<(&str, u32)> =
            ranking.iter().map(|p| (p.name.as_str(), p.score)).collect();
        assert_eq!(ranked, vec![("Ana", 30), ("Cy", 30), ("Ben", 10), ("Dee", 0)]);
    }

    #[test]
    fn test_snapshot_flags_follow_phase() {
        let mut s = session();
        let snap = s.snapshot();
        assert!(!snap.is_active && !snap.game_started && snap.accepting_players);

        s.set_open(true).unwrap();
        let snap = s.snapshot();
        assert!(snap.is_active && !snap.game_started && snap.accepting_players);

        s.start(questions(2)).unwrap();
        let snap = s.snapshot();
        assert!(snap.is_active && snap.game_started && !snap.accepting_players);
        assert_eq!(snap.current_question.unwrap().question, "Q1");

        s.end();
        let snap = s.snapshot();
        assert!(!snap.is_active && snap.game_started && !snap.accepting_players);
        assert!(snap.current_question.is_none());
    }

    #[test]
    fn test_question_view_hides_answer() {
        let q = &questions(1)[0];
        let json = serde_json::to_string(&q.view()).unwrap();
        assert!(!json.contains("answer"));
    }
}
