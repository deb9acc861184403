use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Water polo field position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Center,
    Wing,
    Driver,
    Goalie,
    Flat,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Center => "Center",
            Position::Wing => "Wing",
            Position::Driver => "Driver",
            Position::Goalie => "Goalie",
            Position::Flat => "Flat",
        }
    }
}

impl std::str::FromStr for Position {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "Center" => Ok(Position::Center),
            "Wing" => Ok(Position::Wing),
            "Driver" => Ok(Position::Driver),
            "Goalie" => Ok(Position::Goalie),
            "Flat" => Ok(Position::Flat),
            other => Err(Error::Validation(format!("unknown position '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    Regular,
    Playoff,
    Tournament,
    Scrimmage,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Regular => "Regular",
            MatchType::Playoff => "Playoff",
            MatchType::Tournament => "Tournament",
            MatchType::Scrimmage => "Scrimmage",
        }
    }
}

impl std::str::FromStr for MatchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "Regular" => Ok(MatchType::Regular),
            "Playoff" => Ok(MatchType::Playoff),
            "Tournament" => Ok(MatchType::Tournament),
            "Scrimmage" => Ok(MatchType::Scrimmage),
            other => Err(Error::Validation(format!("unknown match type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayType {
    Offensive,
    Defensive,
    SpecialTeams,
}

impl PlayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayType::Offensive => "Offensive",
            PlayType::Defensive => "Defensive",
            PlayType::SpecialTeams => "Special Teams",
        }
    }
}

impl std::str::FromStr for PlayType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "Offensive" => Ok(PlayType::Offensive),
            "Defensive" => Ok(PlayType::Defensive),
            "Special Teams" => Ok(PlayType::SpecialTeams),
            other => Err(Error::Validation(format!("unknown play type '{other}'"))),
        }
    }
}

/// One kind of in-match event. Closed set: an unknown kind is a construction
/// failure, never a silently-stored string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    ShotMiss,
    ShotGoal,
    Block,
    Rebound,
    Assist,
    Steal,
    Turnover,
    Hustle,
    Exclusion,
    TippedPass,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ShotMiss => "ShotMiss",
            ActionKind::ShotGoal => "ShotGoal",
            ActionKind::Block => "Block",
            ActionKind::Rebound => "Rebound",
            ActionKind::Assist => "Assist",
            ActionKind::Steal => "Steal",
            ActionKind::Turnover => "Turnover",
            ActionKind::Hustle => "Hustle",
            ActionKind::Exclusion => "Exclusion",
            ActionKind::TippedPass => "TippedPass",
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "ShotMiss" => Ok(ActionKind::ShotMiss),
            "ShotGoal" => Ok(ActionKind::ShotGoal),
            "Block" => Ok(ActionKind::Block),
            "Rebound" => Ok(ActionKind::Rebound),
            "Assist" => Ok(ActionKind::Assist),
            "Steal" => Ok(ActionKind::Steal),
            "Turnover" => Ok(ActionKind::Turnover),
            "Hustle" => Ok(ActionKind::Hustle),
            "Exclusion" => Ok(ActionKind::Exclusion),
            "TippedPass" => Ok(ActionKind::TippedPass),
            other => Err(Error::Validation(format!("unknown action kind '{other}'"))),
        }
    }
}

/// Result tag attached to an action by the scorekeeper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Success,
    Fail,
    Blocked,
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOutcome::Success => "Success",
            ActionOutcome::Fail => "Fail",
            ActionOutcome::Blocked => "Blocked",
        }
    }
}

impl std::str::FromStr for ActionOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "Success" => Ok(ActionOutcome::Success),
            "Fail" => Ok(ActionOutcome::Fail),
            "Blocked" => Ok(ActionOutcome::Blocked),
            other => Err(Error::Validation(format!("unknown outcome '{other}'"))),
        }
    }
}

/// A water polo team for one season
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Option<i64>,
    /// Unique within a season tag
    pub name: String,
    pub coach_name: Option<String>,
    pub division: Option<String>,
    /// Season tag, e.g. "2025"
    pub season: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A rostered player. Owned by exactly one team; the team holds no embedded
/// player list, relations go through lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Option<i64>,
    pub team_id: i64,
    pub first_name: String,
    pub last_name: String,
    /// Unique within the team
    pub jersey_number: i32,
    pub position: Position,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Option<i64>,
    pub home_team_id: i64,
    /// Must differ from home_team_id
    pub away_team_id: i64,
    pub match_date: DateTime<Utc>,
    pub location: Option<String>,
    pub home_score: i32,
    pub away_score: i32,
    /// Per-quarter (home, away) breakdown, when tracked
    pub quarter_scores: Option<Vec<(i32, i32)>>,
    pub match_type: MatchType,
    /// Overtime quarters beyond the regulation four; 0 when none
    pub overtime_quarters: i32,
    /// Locked matches reject further action appends
    pub is_locked: bool,
    pub notes: Option<String>,
}

impl Match {
    /// Highest quarter number actions may legally carry
    pub fn max_quarter(&self) -> i32 {
        4 + self.overtime_quarters.max(0)
    }
}

/// A named tactic, optionally scoped to one team (None = shared library)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Play {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub play_type: PlayType,
    /// e.g. "3-3", "4-2", "Press"
    pub formation: Option<String>,
    pub team_id: Option<i64>,
}

/// One immutable in-match event. Never updated; a correction is a new action
/// carrying `corrects_action_id`, which supersedes the referenced one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Option<i64>,
    pub match_id: i64,
    pub team_id: i64,
    /// None for team-level events
    pub player_id: Option<i64>,
    pub kind: ActionKind,
    pub quarter: i32,
    /// Seconds elapsed within the quarter
    pub clock_seconds: i32,
    /// Pool coordinates, when charted
    pub location: Option<(f64, f64)>,
    pub assist_player_id: Option<i64>,
    pub play_id: Option<i64>,
    pub outcome: Option<ActionOutcome>,
    pub is_power_play: bool,
    pub is_counter_attack: bool,
    pub corrects_action_id: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

/// Derived per-(player, match) counters. Safely regenerable from the action
/// log; carries no independent truth once actions exist for the match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerMatchStats {
    pub id: Option<i64>,
    pub player_id: i64,
    pub match_id: i64,

    // Offense
    pub shots_attempted: i32,
    pub goals: i32,
    pub assists: i32,
    pub turnovers: i32,

    // Defense
    pub steals: i32,
    pub blocks: i32,
    pub rebounds: i32,
    pub hustles: i32,
    pub tipped_passes: i32,

    // Fouls
    pub fouls_committed: i32,
    pub fouls_drawn: i32,
    pub exclusions: i32,

    // Special situations
    pub power_play_goals: i32,
    pub power_play_attempts: i32,
    pub penalty_shots_made: i32,
    pub penalty_shots_attempted: i32,

    // Goalie-specific, None for field players
    pub saves: Option<i32>,
    pub goals_allowed: Option<i32>,

    pub minutes_played: f64,
}

impl PlayerMatchStats {
    /// Goals per shot attempt as a percentage; 0.0 with no attempts.
    pub fn shot_percentage(&self) -> f64 {
        if self.shots_attempted == 0 {
            0.0
        } else {
            f64::from(self.goals) / f64::from(self.shots_attempted) * 100.0
        }
    }

    /// Save percentage for goalies. None when goalie stats are absent or the
    /// goalie faced no shots.
    pub fn save_percentage(&self) -> Option<f64> {
        let (saves, allowed) = (self.saves?, self.goals_allowed?);
        let faced = saves + allowed;
        if faced == 0 {
            None
        } else {
            Some(f64::from(saves) / f64::from(faced) * 100.0)
        }
    }
}

/// Derived per-(match, play, team, quarter) usage record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPlayUsage {
    pub id: Option<i64>,
    pub match_id: i64,
    pub play_id: i64,
    pub team_id: i64,
    pub quarter: i32,
    pub times_used: i32,
    pub successful_executions: i32,
}

/// Scouting summary for one opponent, fully replaced on each refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpponentProfile {
    pub id: Option<i64>,
    pub team_id: i64,
    pub avg_goals_per_game: Option<f64>,
    pub avg_goals_allowed: Option<f64>,
    /// Formation labels, most used first
    pub common_formations: Vec<String>,
    /// Play ids, most used first
    pub common_plays: Vec<i64>,
    /// Player ids of top scorers
    pub key_players: Vec<i64>,
    pub matches_analyzed: i32,
    pub last_analysis_date: DateTime<Utc>,
}
