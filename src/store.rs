use crate::db::models::*;
use crate::error::Result;

/// Storage collaborator contract. The core is storage-agnostic: create/read
/// by primary key, indexed lookup by the uniqueness keys, an ordered action
/// scan, and replace-wholesale operations for derived rows. Raw actions are
/// append-only at this boundary; no delete or update of actions exists.
pub trait Storage: Send + Sync {
    // ── Teams ────────────────────────────────────────────────────────────────
    fn insert_team(&self, team: &Team) -> Result<i64>;
    fn update_team(&self, team: &Team) -> Result<()>;
    fn team(&self, id: i64) -> Result<Option<Team>>;
    fn team_by_name(&self, name: &str, season: Option<&str>) -> Result<Option<Team>>;

    // ── Players ──────────────────────────────────────────────────────────────
    fn insert_player(&self, player: &Player) -> Result<i64>;
    fn update_player(&self, player: &Player) -> Result<()>;
    fn player(&self, id: i64) -> Result<Option<Player>>;
    fn player_by_jersey(&self, team_id: i64, jersey_number: i32) -> Result<Option<Player>>;
    fn players_on_team(&self, team_id: i64) -> Result<Vec<Player>>;

    // ── Matches ──────────────────────────────────────────────────────────────
    fn insert_match(&self, m: &Match) -> Result<i64>;
    fn update_match(&self, m: &Match) -> Result<()>;
    fn match_by_id(&self, id: i64) -> Result<Option<Match>>;
    /// All matches where the team played home or away, newest first
    fn matches_for_team(&self, team_id: i64) -> Result<Vec<Match>>;
    /// Matches between two teams in either orientation, newest first
    fn matches_between(&self, team_a: i64, team_b: i64) -> Result<Vec<Match>>;

    // ── Plays ────────────────────────────────────────────────────────────────
    fn insert_play(&self, play: &Play) -> Result<i64>;
    fn play(&self, id: i64) -> Result<Option<Play>>;

    // ── Action log ───────────────────────────────────────────────────────────
    fn append_action(&self, action: &Action) -> Result<i64>;
    fn action(&self, id: i64) -> Result<Option<Action>>;
    /// Full action sequence for a match, ordered by (quarter, clock) ascending
    fn actions_for_match(&self, match_id: i64) -> Result<Vec<Action>>;

    // ── Derived rows ─────────────────────────────────────────────────────────
    /// Direct stat entry; conflicts on a duplicate (player, match) pair
    fn insert_player_match_stats(&self, row: &PlayerMatchStats) -> Result<i64>;
    /// Atomically replace every derived row for one match
    fn replace_match_derived(
        &self,
        match_id: i64,
        stats: &[PlayerMatchStats],
        plays: &[MatchPlayUsage],
    ) -> Result<()>;
    fn stats_for_player(&self, player_id: i64, season: Option<&str>)
        -> Result<Vec<PlayerMatchStats>>;
    fn stats_for_match(&self, match_id: i64) -> Result<Vec<PlayerMatchStats>>;
    fn play_usage(&self, play_id: i64, team_id: Option<i64>) -> Result<Vec<MatchPlayUsage>>;
    fn match_plays_for_match(&self, match_id: i64) -> Result<Vec<MatchPlayUsage>>;
    fn replace_opponent_profile(&self, profile: &OpponentProfile) -> Result<()>;
    fn opponent_profile(&self, team_id: i64) -> Result<Option<OpponentProfile>>;
}
