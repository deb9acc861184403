//! Append-only ledger of in-match events. Actions are immutable once
//! recorded; a correction is a new action with a `corrects_action_id`
//! back-reference, which keeps the audit trail intact.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::db::models::{Action, ActionKind, ActionOutcome};
use crate::error::{Error, Result};
use crate::locks::MatchLocks;
use crate::store::Storage;

/// Everything a scorekeeper supplies for one event
#[derive(Debug, Clone)]
pub struct NewAction {
    pub match_id: i64,
    pub team_id: i64,
    pub player_id: Option<i64>,
    pub kind: ActionKind,
    pub quarter: i32,
    pub clock_seconds: i32,
    pub location: Option<(f64, f64)>,
    pub assist_player_id: Option<i64>,
    pub play_id: Option<i64>,
    pub outcome: Option<ActionOutcome>,
    pub is_power_play: bool,
    pub is_counter_attack: bool,
    pub corrects_action_id: Option<i64>,
}

impl NewAction {
    /// Minimal event: a kind by a player at a point in the match
    pub fn new(
        match_id: i64,
        team_id: i64,
        player_id: Option<i64>,
        kind: ActionKind,
        quarter: i32,
        clock_seconds: i32,
    ) -> Self {
        NewAction {
            match_id,
            team_id,
            player_id,
            kind,
            quarter,
            clock_seconds,
            location: None,
            assist_player_id: None,
            play_id: None,
            outcome: None,
            is_power_play: false,
            is_counter_attack: false,
            corrects_action_id: None,
        }
    }
}

#[derive(Clone)]
pub struct ActionLog {
    store: Arc<dyn Storage>,
    locks: MatchLocks,
}

impl ActionLog {
    pub fn new(store: Arc<dyn Storage>, locks: MatchLocks) -> Self {
        ActionLog { store, locks }
    }

    /// Validate and append one action, returning its id. Appends within one
    /// match serialize on the match lock; different matches run concurrently.
    pub fn record_action(&self, new: NewAction) -> Result<i64> {
        let m = self
            .store
            .match_by_id(new.match_id)?
            .ok_or_else(|| Error::NotFound(format!("match {}", new.match_id)))?;
        if m.is_locked {
            return Err(Error::Validation(format!(
                "match {} is locked, no further actions accepted",
                new.match_id
            )));
        }
        if new.team_id != m.home_team_id && new.team_id != m.away_team_id {
            return Err(Error::Validation(format!(
                "team {} is not playing in match {}",
                new.team_id, new.match_id
            )));
        }
        if new.quarter < 1 || new.quarter > m.max_quarter() {
            return Err(Error::Validation(format!(
                "quarter {} outside valid range 1..={}",
                new.quarter,
                m.max_quarter()
            )));
        }
        if new.clock_seconds < 0 {
            return Err(Error::Validation("clock must not be negative".into()));
        }
        if let Some(pid) = new.player_id {
            self.require_on_team(pid, new.team_id)?;
        }
        if let Some(apid) = new.assist_player_id {
            if new.player_id == Some(apid) {
                return Err(Error::Validation(
                    "assist player must differ from the acting player".into(),
                ));
            }
            self.require_on_team(apid, new.team_id)?;
        }
        if let Some(play_id) = new.play_id {
            if self.store.play(play_id)?.is_none() {
                return Err(Error::Validation(format!("no play with id {play_id}")));
            }
        }
        if let Some(target) = new.corrects_action_id {
            let corrected = self
                .store
                .action(target)?
                .ok_or_else(|| Error::Validation(format!("no action with id {target}")))?;
            if corrected.match_id != new.match_id {
                return Err(Error::Validation(format!(
                    "action {target} belongs to a different match"
                )));
            }
        }

        let lock = self.locks.for_match(new.match_id);
        let _guard = lock.lock().unwrap();
        let action = Action {
            id: None,
            match_id: new.match_id,
            team_id: new.team_id,
            player_id: new.player_id,
            kind: new.kind,
            quarter: new.quarter,
            clock_seconds: new.clock_seconds,
            location: new.location,
            assist_player_id: new.assist_player_id,
            play_id: new.play_id,
            outcome: new.outcome,
            is_power_play: new.is_power_play,
            is_counter_attack: new.is_counter_attack,
            corrects_action_id: new.corrects_action_id,
            recorded_at: Utc::now(),
        };
        let id = self.store.append_action(&action)?;
        debug!(action_id = id, match_id = new.match_id, kind = new.kind.as_str(), "action recorded");
        Ok(id)
    }

    /// Full action sequence for a match, ordered by (quarter, clock)
    /// ascending. Plain vector; callers may re-iterate freely.
    pub fn actions_for_match(&self, match_id: i64) -> Result<Vec<Action>> {
        if self.store.match_by_id(match_id)?.is_none() {
            return Err(Error::NotFound(format!("match {match_id}")));
        }
        self.store.actions_for_match(match_id)
    }

    fn require_on_team(&self, player_id: i64, team_id: i64) -> Result<()> {
        let player = self
            .store
            .player(player_id)?
            .ok_or_else(|| Error::Validation(format!("no player with id {player_id}")))?;
        if player.team_id != team_id {
            return Err(Error::Validation(format!(
                "player {player_id} does not belong to team {team_id}"
            )));
        }
        Ok(())
    }
}
