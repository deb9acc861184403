//! Reference-data management: teams, players, plays, matches. Enforces the
//! uniqueness and referential rules; no aggregation logic lives here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::db::models::*;
use crate::error::{Error, Result};
use crate::store::Storage;

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn Storage>,
}

/// Input for creating a match before any score is known
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub match_date: DateTime<Utc>,
    pub location: Option<String>,
    pub match_type: MatchType,
}

impl Catalog {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Catalog { store }
    }

    pub fn create_team(
        &self,
        name: &str,
        coach_name: Option<&str>,
        division: Option<&str>,
        season: Option<&str>,
    ) -> Result<Team> {
        if name.trim().is_empty() {
            return Err(Error::Validation("team name must not be empty".into()));
        }
        if self.store.team_by_name(name, season)?.is_some() {
            return Err(Error::Conflict(format!(
                "team '{name}' already exists for season {:?}",
                season
            )));
        }
        let mut team = Team {
            id: None,
            name: name.to_string(),
            coach_name: coach_name.map(str::to_string),
            division: division.map(str::to_string),
            season: season.map(str::to_string),
            created_at: Utc::now(),
        };
        let id = self.store.insert_team(&team)?;
        team.id = Some(id);
        info!(team_id = id, name, "team created");
        Ok(team)
    }

    pub fn update_team(&self, team: &Team) -> Result<()> {
        self.store.update_team(team)
    }

    pub fn create_player(
        &self,
        team_id: i64,
        first_name: &str,
        last_name: &str,
        jersey_number: i32,
        position: Position,
    ) -> Result<Player> {
        let team = self
            .store
            .team(team_id)?
            .ok_or_else(|| Error::Validation(format!("no team with id {team_id}")))?;
        if self
            .store
            .player_by_jersey(team_id, jersey_number)?
            .is_some()
        {
            return Err(Error::Conflict(format!(
                "jersey #{jersey_number} is already taken on team '{}'",
                team.name
            )));
        }
        let mut player = Player {
            id: None,
            team_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            jersey_number,
            position,
            is_active: true,
        };
        let id = self.store.insert_player(&player)?;
        player.id = Some(id);
        info!(player_id = id, team_id, jersey_number, "player created");
        Ok(player)
    }

    pub fn update_player(&self, player: &Player) -> Result<()> {
        // A jersey change must not collide with a teammate's number.
        if let Some(existing) = self
            .store
            .player_by_jersey(player.team_id, player.jersey_number)?
        {
            if existing.id != player.id {
                return Err(Error::Conflict(format!(
                    "jersey #{} is already taken on team {}",
                    player.jersey_number, player.team_id
                )));
            }
        }
        self.store.update_player(player)
    }

    pub fn create_play(
        &self,
        name: &str,
        play_type: PlayType,
        formation: Option<&str>,
        team_id: Option<i64>,
        description: Option<&str>,
    ) -> Result<Play> {
        if let Some(tid) = team_id {
            if self.store.team(tid)?.is_none() {
                return Err(Error::Validation(format!("no team with id {tid}")));
            }
        }
        let mut play = Play {
            id: None,
            name: name.to_string(),
            description: description.map(str::to_string),
            play_type,
            formation: formation.map(str::to_string),
            team_id,
        };
        let id = self.store.insert_play(&play)?;
        play.id = Some(id);
        Ok(play)
    }

    pub fn create_match(&self, new: NewMatch) -> Result<Match> {
        if new.home_team_id == new.away_team_id {
            return Err(Error::Validation(
                "home and away team must differ".into(),
            ));
        }
        for tid in [new.home_team_id, new.away_team_id] {
            if self.store.team(tid)?.is_none() {
                return Err(Error::Validation(format!("no team with id {tid}")));
            }
        }
        let mut m = Match {
            id: None,
            home_team_id: new.home_team_id,
            away_team_id: new.away_team_id,
            match_date: new.match_date,
            location: new.location,
            home_score: 0,
            away_score: 0,
            quarter_scores: None,
            match_type: new.match_type,
            overtime_quarters: 0,
            is_locked: false,
            notes: None,
        };
        let id = self.store.insert_match(&m)?;
        m.id = Some(id);
        Ok(m)
    }

    /// Extend a live match into overtime so quarter 5+ actions validate.
    /// Separate from finalization: overtime is declared while scoring is
    /// still open.
    pub fn begin_overtime(&self, match_id: i64, overtime_quarters: i32) -> Result<Match> {
        if overtime_quarters < 1 {
            return Err(Error::Validation(
                "overtime quarters must be at least 1".into(),
            ));
        }
        let mut m = self
            .store
            .match_by_id(match_id)?
            .ok_or_else(|| Error::NotFound(format!("match {match_id}")))?;
        if m.is_locked {
            return Err(Error::Validation(format!(
                "match {match_id} is locked, overtime can no longer be declared"
            )));
        }
        m.overtime_quarters = overtime_quarters;
        self.store.update_match(&m)?;
        info!(match_id, overtime_quarters, "overtime declared");
        Ok(m)
    }

    /// Record final scores and lock the match against further action appends
    pub fn finalize_match(
        &self,
        match_id: i64,
        home_score: i32,
        away_score: i32,
        quarter_scores: Option<Vec<(i32, i32)>>,
        overtime_quarters: i32,
    ) -> Result<Match> {
        let mut m = self
            .store
            .match_by_id(match_id)?
            .ok_or_else(|| Error::NotFound(format!("match {match_id}")))?;
        if overtime_quarters < 0 {
            return Err(Error::Validation("overtime quarters must be >= 0".into()));
        }
        m.home_score = home_score;
        m.away_score = away_score;
        m.quarter_scores = quarter_scores;
        m.overtime_quarters = overtime_quarters;
        m.is_locked = true;
        self.store.update_match(&m)?;
        info!(match_id, home_score, away_score, "match finalized");
        Ok(m)
    }
}
