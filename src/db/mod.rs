use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

pub mod models;
use models::*;

use crate::error::{Error, Result};
use crate::store::Storage;

/// Thread-safe SQLite store (single connection behind a mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(Error::from)?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::from)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        // Bounded wait on a busy database; a timeout surfaces as a storage
        // error instead of hanging the caller.
        conn.busy_timeout(Duration::from_secs(5))?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }
}

impl Storage for Database {
    // ── Teams ────────────────────────────────────────────────────────────────

    fn insert_team(&self, team: &Team) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO teams (name, coach_name, division, season, created_at)
             VALUES (?1,?2,?3,?4,?5)",
            params![
                team.name,
                team.coach_name,
                team.division,
                team.season,
                team.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_team(&self, team: &Team) -> Result<()> {
        let id = team
            .id
            .ok_or_else(|| Error::Validation("team has no id".into()))?;
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE teams SET name=?1, coach_name=?2, division=?3, season=?4 WHERE id=?5",
            params![team.name, team.coach_name, team.division, team.season, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("team {id}")));
        }
        Ok(())
    }

    fn team(&self, id: i64) -> Result<Option<Team>> {
        let conn = self.conn.lock().unwrap();
        let team = conn
            .query_row(
                "SELECT id, name, coach_name, division, season, created_at
                 FROM teams WHERE id=?1",
                params![id],
                map_team,
            )
            .optional()?;
        Ok(team)
    }

    fn team_by_name(&self, name: &str, season: Option<&str>) -> Result<Option<Team>> {
        let conn = self.conn.lock().unwrap();
        let team = conn
            .query_row(
                "SELECT id, name, coach_name, division, season, created_at
                 FROM teams WHERE name=?1 AND COALESCE(season,'')=COALESCE(?2,'')",
                params![name, season],
                map_team,
            )
            .optional()?;
        Ok(team)
    }

    // ── Players ──────────────────────────────────────────────────────────────

    fn insert_player(&self, player: &Player) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO players (team_id, first_name, last_name, jersey_number,
                                  position, is_active)
             VALUES (?1,?2,?3,?4,?5,?6)",
            params![
                player.team_id,
                player.first_name,
                player.last_name,
                player.jersey_number,
                player.position.as_str(),
                player.is_active,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_player(&self, player: &Player) -> Result<()> {
        let id = player
            .id
            .ok_or_else(|| Error::Validation("player has no id".into()))?;
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE players SET team_id=?1, first_name=?2, last_name=?3,
                    jersey_number=?4, position=?5, is_active=?6 WHERE id=?7",
            params![
                player.team_id,
                player.first_name,
                player.last_name,
                player.jersey_number,
                player.position.as_str(),
                player.is_active,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("player {id}")));
        }
        Ok(())
    }

    fn player(&self, id: i64) -> Result<Option<Player>> {
        let conn = self.conn.lock().unwrap();
        let player = conn
            .query_row(
                "SELECT id, team_id, first_name, last_name, jersey_number, position, is_active
                 FROM players WHERE id=?1",
                params![id],
                map_player,
            )
            .optional()?;
        Ok(player)
    }

    fn player_by_jersey(&self, team_id: i64, jersey_number: i32) -> Result<Option<Player>> {
        let conn = self.conn.lock().unwrap();
        let player = conn
            .query_row(
                "SELECT id, team_id, first_name, last_name, jersey_number, position, is_active
                 FROM players WHERE team_id=?1 AND jersey_number=?2",
                params![team_id, jersey_number],
                map_player,
            )
            .optional()?;
        Ok(player)
    }

    fn players_on_team(&self, team_id: i64) -> Result<Vec<Player>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, team_id, first_name, last_name, jersey_number, position, is_active
             FROM players WHERE team_id=?1 ORDER BY jersey_number",
        )?;
        let players = stmt
            .query_map(params![team_id], map_player)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(players)
    }

    // ── Matches ──────────────────────────────────────────────────────────────

    fn insert_match(&self, m: &Match) -> Result<i64> {
        let quarter_scores = m
            .quarter_scores
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO matches (
                home_team_id, away_team_id, match_date, location,
                home_score, away_score, quarter_scores, match_type,
                overtime_quarters, is_locked, notes
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                m.home_team_id,
                m.away_team_id,
                m.match_date,
                m.location,
                m.home_score,
                m.away_score,
                quarter_scores,
                m.match_type.as_str(),
                m.overtime_quarters,
                m.is_locked,
                m.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_match(&self, m: &Match) -> Result<()> {
        let id = m
            .id
            .ok_or_else(|| Error::Validation("match has no id".into()))?;
        let quarter_scores = m
            .quarter_scores
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE matches SET
                home_team_id=?1, away_team_id=?2, match_date=?3, location=?4,
                home_score=?5, away_score=?6, quarter_scores=?7, match_type=?8,
                overtime_quarters=?9, is_locked=?10, notes=?11
             WHERE id=?12",
            params![
                m.home_team_id,
                m.away_team_id,
                m.match_date,
                m.location,
                m.home_score,
                m.away_score,
                quarter_scores,
                m.match_type.as_str(),
                m.overtime_quarters,
                m.is_locked,
                m.notes,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("match {id}")));
        }
        Ok(())
    }

    fn match_by_id(&self, id: i64) -> Result<Option<Match>> {
        let conn = self.conn.lock().unwrap();
        let m = conn
            .query_row(
                &format!("{MATCH_SELECT} WHERE id=?1"),
                params![id],
                map_match,
            )
            .optional()?;
        Ok(m)
    }

    fn matches_for_team(&self, team_id: i64) -> Result<Vec<Match>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{MATCH_SELECT} WHERE home_team_id=?1 OR away_team_id=?1
             ORDER BY match_date DESC"
        ))?;
        let matches = stmt
            .query_map(params![team_id], map_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(matches)
    }

    fn matches_between(&self, team_a: i64, team_b: i64) -> Result<Vec<Match>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{MATCH_SELECT}
             WHERE (home_team_id=?1 AND away_team_id=?2)
                OR (home_team_id=?2 AND away_team_id=?1)
             ORDER BY match_date DESC"
        ))?;
        let matches = stmt
            .query_map(params![team_a, team_b], map_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(matches)
    }

    // ── Plays ────────────────────────────────────────────────────────────────

    fn insert_play(&self, play: &Play) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO plays (name, description, play_type, formation, team_id)
             VALUES (?1,?2,?3,?4,?5)",
            params![
                play.name,
                play.description,
                play.play_type.as_str(),
                play.formation,
                play.team_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn play(&self, id: i64) -> Result<Option<Play>> {
        let conn = self.conn.lock().unwrap();
        let play = conn
            .query_row(
                "SELECT id, name, description, play_type, formation, team_id
                 FROM plays WHERE id=?1",
                params![id],
                map_play,
            )
            .optional()?;
        Ok(play)
    }

    // ── Action log ───────────────────────────────────────────────────────────

    fn append_action(&self, action: &Action) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO actions (
                match_id, team_id, player_id, kind, quarter, clock_seconds,
                location_x, location_y, assist_player_id, play_id, outcome,
                is_power_play, is_counter_attack, corrects_action_id, recorded_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
            params![
                action.match_id,
                action.team_id,
                action.player_id,
                action.kind.as_str(),
                action.quarter,
                action.clock_seconds,
                action.location.map(|(x, _)| x),
                action.location.map(|(_, y)| y),
                action.assist_player_id,
                action.play_id,
                action.outcome.map(|o| o.as_str()),
                action.is_power_play,
                action.is_counter_attack,
                action.corrects_action_id,
                action.recorded_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn action(&self, id: i64) -> Result<Option<Action>> {
        let conn = self.conn.lock().unwrap();
        let action = conn
            .query_row(
                &format!("{ACTION_SELECT} WHERE id=?1"),
                params![id],
                map_action,
            )
            .optional()?;
        Ok(action)
    }

    fn actions_for_match(&self, match_id: i64) -> Result<Vec<Action>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{ACTION_SELECT} WHERE match_id=?1
             ORDER BY quarter ASC, clock_seconds ASC, id ASC"
        ))?;
        let actions = stmt
            .query_map(params![match_id], map_action)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(actions)
    }

    // ── Derived rows ─────────────────────────────────────────────────────────

    fn insert_player_match_stats(&self, row: &PlayerMatchStats) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        insert_stats_row(&conn, row)?;
        Ok(conn.last_insert_rowid())
    }

    fn replace_match_derived(
        &self,
        match_id: i64,
        stats: &[PlayerMatchStats],
        plays: &[MatchPlayUsage],
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(Error::from)?;
        tx.execute(
            "DELETE FROM player_match_stats WHERE match_id=?1",
            params![match_id],
        )?;
        tx.execute(
            "DELETE FROM match_plays WHERE match_id=?1",
            params![match_id],
        )?;
        for row in stats {
            insert_stats_row(&tx, row)?;
        }
        for usage in plays {
            tx.execute(
                "INSERT INTO match_plays (
                    match_id, play_id, team_id, quarter, times_used, successful_executions
                 ) VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    usage.match_id,
                    usage.play_id,
                    usage.team_id,
                    usage.quarter,
                    usage.times_used,
                    usage.successful_executions,
                ],
            )?;
        }
        tx.commit().map_err(Error::from)
    }

    fn stats_for_player(
        &self,
        player_id: i64,
        season: Option<&str>,
    ) -> Result<Vec<PlayerMatchStats>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STATS_COLUMNS}
             FROM player_match_stats s
             JOIN matches m ON m.id = s.match_id
             JOIN teams h ON h.id = m.home_team_id
             JOIN teams a ON a.id = m.away_team_id
             WHERE s.player_id=?1
               AND (?2 IS NULL OR h.season=?2 OR a.season=?2)
             ORDER BY m.match_date DESC"
        ))?;
        let rows = stmt
            .query_map(params![player_id, season], map_stats)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn stats_for_match(&self, match_id: i64) -> Result<Vec<PlayerMatchStats>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {STATS_COLUMNS}
             FROM player_match_stats s WHERE s.match_id=?1 ORDER BY s.player_id"
        ))?;
        let rows = stmt
            .query_map(params![match_id], map_stats)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn play_usage(&self, play_id: i64, team_id: Option<i64>) -> Result<Vec<MatchPlayUsage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, match_id, play_id, team_id, quarter, times_used, successful_executions
             FROM match_plays
             WHERE play_id=?1 AND (?2 IS NULL OR team_id=?2)
             ORDER BY match_id, quarter",
        )?;
        let rows = stmt
            .query_map(params![play_id, team_id], |row| {
                Ok(MatchPlayUsage {
                    id: row.get(0)?,
                    match_id: row.get(1)?,
                    play_id: row.get(2)?,
                    team_id: row.get(3)?,
                    quarter: row.get(4)?,
                    times_used: row.get(5)?,
                    successful_executions: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn match_plays_for_match(&self, match_id: i64) -> Result<Vec<MatchPlayUsage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, match_id, play_id, team_id, quarter, times_used, successful_executions
             FROM match_plays WHERE match_id=?1 ORDER BY play_id, team_id, quarter",
        )?;
        let rows = stmt
            .query_map(params![match_id], |row| {
                Ok(MatchPlayUsage {
                    id: row.get(0)?,
                    match_id: row.get(1)?,
                    play_id: row.get(2)?,
                    team_id: row.get(3)?,
                    quarter: row.get(4)?,
                    times_used: row.get(5)?,
                    successful_executions: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn replace_opponent_profile(&self, profile: &OpponentProfile) -> Result<()> {
        let formations = serde_json::to_string(&profile.common_formations)?;
        let plays = serde_json::to_string(&profile.common_plays)?;
        let key_players = serde_json::to_string(&profile.key_players)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO opponent_profiles (
                team_id, avg_goals_per_game, avg_goals_allowed, common_formations,
                common_plays, key_players, matches_analyzed, last_analysis_date
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
             ON CONFLICT(team_id) DO UPDATE SET
                avg_goals_per_game=excluded.avg_goals_per_game,
                avg_goals_allowed=excluded.avg_goals_allowed,
                common_formations=excluded.common_formations,
                common_plays=excluded.common_plays,
                key_players=excluded.key_players,
                matches_analyzed=excluded.matches_analyzed,
                last_analysis_date=excluded.last_analysis_date",
            params![
                profile.team_id,
                profile.avg_goals_per_game,
                profile.avg_goals_allowed,
                formations,
                plays,
                key_players,
                profile.matches_analyzed,
                profile.last_analysis_date,
            ],
        )?;
        Ok(())
    }

    fn opponent_profile(&self, team_id: i64) -> Result<Option<OpponentProfile>> {
        let conn = self.conn.lock().unwrap();
        let profile = conn
            .query_row(
                "SELECT id, team_id, avg_goals_per_game, avg_goals_allowed,
                        common_formations, common_plays, key_players,
                        matches_analyzed, last_analysis_date
                 FROM opponent_profiles WHERE team_id=?1",
                params![team_id],
                map_profile,
            )
            .optional()?;
        Ok(profile)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

const MATCH_SELECT: &str =
    "SELECT id, home_team_id, away_team_id, match_date, location,
            home_score, away_score, quarter_scores, match_type,
            overtime_quarters, is_locked, notes
     FROM matches";

const ACTION_SELECT: &str =
    "SELECT id, match_id, team_id, player_id, kind, quarter, clock_seconds,
            location_x, location_y, assist_player_id, play_id, outcome,
            is_power_play, is_counter_attack, corrects_action_id, recorded_at
     FROM actions";

const STATS_COLUMNS: &str = "s.id, s.player_id, s.match_id,
        s.shots_attempted, s.goals, s.assists, s.turnovers,
        s.steals, s.blocks, s.rebounds, s.hustles, s.tipped_passes,
        s.fouls_committed, s.fouls_drawn, s.exclusions,
        s.power_play_goals, s.power_play_attempts,
        s.penalty_shots_made, s.penalty_shots_attempted,
        s.saves, s.goals_allowed, s.minutes_played";

fn insert_stats_row(conn: &Connection, row: &PlayerMatchStats) -> Result<()> {
    conn.execute(
        "INSERT INTO player_match_stats (
            player_id, match_id, shots_attempted, goals, assists, turnovers,
            steals, blocks, rebounds, hustles, tipped_passes,
            fouls_committed, fouls_drawn, exclusions,
            power_play_goals, power_play_attempts,
            penalty_shots_made, penalty_shots_attempted,
            saves, goals_allowed, minutes_played
         ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)",
        params![
            row.player_id,
            row.match_id,
            row.shots_attempted,
            row.goals,
            row.assists,
            row.turnovers,
            row.steals,
            row.blocks,
            row.rebounds,
            row.hustles,
            row.tipped_passes,
            row.fouls_committed,
            row.fouls_drawn,
            row.exclusions,
            row.power_play_goals,
            row.power_play_attempts,
            row.penalty_shots_made,
            row.penalty_shots_attempted,
            row.saves,
            row.goals_allowed,
            row.minutes_played,
        ],
    )?;
    Ok(())
}

fn parse_enum<T: std::str::FromStr>(idx: usize, value: String) -> rusqlite::Result<T> {
    value.parse::<T>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid enum value '{value}'").into(),
        )
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, value: String) -> rusqlite::Result<T> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_team(row: &rusqlite::Row) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        coach_name: row.get(2)?,
        division: row.get(3)?,
        season: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_player(row: &rusqlite::Row) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        team_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        jersey_number: row.get(4)?,
        position: parse_enum(5, row.get(5)?)?,
        is_active: row.get(6)?,
    })
}

fn map_match(row: &rusqlite::Row) -> rusqlite::Result<Match> {
    let quarter_scores: Option<String> = row.get(7)?;
    Ok(Match {
        id: row.get(0)?,
        home_team_id: row.get(1)?,
        away_team_id: row.get(2)?,
        match_date: row.get(3)?,
        location: row.get(4)?,
        home_score: row.get(5)?,
        away_score: row.get(6)?,
        quarter_scores: quarter_scores.map(|s| parse_json(7, s)).transpose()?,
        match_type: parse_enum(8, row.get(8)?)?,
        overtime_quarters: row.get(9)?,
        is_locked: row.get(10)?,
        notes: row.get(11)?,
    })
}

fn map_play(row: &rusqlite::Row) -> rusqlite::Result<Play> {
    Ok(Play {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        play_type: parse_enum(3, row.get(3)?)?,
        formation: row.get(4)?,
        team_id: row.get(5)?,
    })
}

fn map_action(row: &rusqlite::Row) -> rusqlite::Result<Action> {
    let x: Option<f64> = row.get(7)?;
    let y: Option<f64> = row.get(8)?;
    let outcome: Option<String> = row.get(11)?;
    Ok(Action {
        id: row.get(0)?,
        match_id: row.get(1)?,
        team_id: row.get(2)?,
        player_id: row.get(3)?,
        kind: parse_enum(4, row.get(4)?)?,
        quarter: row.get(5)?,
        clock_seconds: row.get(6)?,
        location: x.zip(y),
        assist_player_id: row.get(9)?,
        play_id: row.get(10)?,
        outcome: outcome.map(|o| parse_enum(11, o)).transpose()?,
        is_power_play: row.get(12)?,
        is_counter_attack: row.get(13)?,
        corrects_action_id: row.get(14)?,
        recorded_at: row.get(15)?,
    })
}

fn map_stats(row: &rusqlite::Row) -> rusqlite::Result<PlayerMatchStats> {
    Ok(PlayerMatchStats {
        id: row.get(0)?,
        player_id: row.get(1)?,
        match_id: row.get(2)?,
        shots_attempted: row.get(3)?,
        goals: row.get(4)?,
        assists: row.get(5)?,
        turnovers: row.get(6)?,
        steals: row.get(7)?,
        blocks: row.get(8)?,
        rebounds: row.get(9)?,
        hustles: row.get(10)?,
        tipped_passes: row.get(11)?,
        fouls_committed: row.get(12)?,
        fouls_drawn: row.get(13)?,
        exclusions: row.get(14)?,
        power_play_goals: row.get(15)?,
        power_play_attempts: row.get(16)?,
        penalty_shots_made: row.get(17)?,
        penalty_shots_attempted: row.get(18)?,
        saves: row.get(19)?,
        goals_allowed: row.get(20)?,
        minutes_played: row.get(21)?,
    })
}

fn map_profile(row: &rusqlite::Row) -> rusqlite::Result<OpponentProfile> {
    let formations: String = row.get(4)?;
    let plays: String = row.get(5)?;
    let key_players: String = row.get(6)?;
    Ok(OpponentProfile {
        id: row.get(0)?,
        team_id: row.get(1)?,
        avg_goals_per_game: row.get(2)?,
        avg_goals_allowed: row.get(3)?,
        common_formations: parse_json(4, formations)?,
        common_plays: parse_json(5, plays)?,
        key_players: parse_json(6, key_players)?,
        matches_analyzed: row.get(7)?,
        last_analysis_date: row.get(8)?,
    })
}


/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT    NOT NULL,
    coach_name  TEXT,
    division    TEXT,
    season      TEXT,
    created_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS players (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id       INTEGER NOT NULL,
    first_name    TEXT    NOT NULL,
    last_name     TEXT    NOT NULL,
    jersey_number INTEGER NOT NULL,
    position      TEXT    NOT NULL,
    is_active     INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY (team_id) REFERENCES teams(id)
);

CREATE TABLE IF NOT EXISTS matches (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    home_team_id      INTEGER NOT NULL,
    away_team_id      INTEGER NOT NULL,
    match_date        TEXT    NOT NULL,
    location          TEXT,
    home_score        INTEGER NOT NULL DEFAULT 0,
    away_score        INTEGER NOT NULL DEFAULT 0,
    quarter_scores    TEXT,
    match_type        TEXT    NOT NULL,
    overtime_quarters INTEGER NOT NULL DEFAULT 0,
    is_locked         INTEGER NOT NULL DEFAULT 0,
    notes             TEXT,
    FOREIGN KEY (home_team_id) REFERENCES teams(id),
    FOREIGN KEY (away_team_id) REFERENCES teams(id)
);

CREATE TABLE IF NOT EXISTS plays (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT    NOT NULL,
    description TEXT,
    play_type   TEXT    NOT NULL,
    formation   TEXT,
    team_id     INTEGER,
    FOREIGN KEY (team_id) REFERENCES teams(id)
);

CREATE TABLE IF NOT EXISTS actions (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    match_id           INTEGER NOT NULL,
    team_id            INTEGER NOT NULL,
    player_id          INTEGER,
    kind               TEXT    NOT NULL,
    quarter            INTEGER NOT NULL,
    clock_seconds      INTEGER NOT NULL,
    location_x         REAL,
    location_y         REAL,
    assist_player_id   INTEGER,
    play_id            INTEGER,
    outcome            TEXT,
    is_power_play      INTEGER NOT NULL DEFAULT 0,
    is_counter_attack  INTEGER NOT NULL DEFAULT 0,
    corrects_action_id INTEGER,
    recorded_at        TEXT    NOT NULL,
    FOREIGN KEY (match_id) REFERENCES matches(id),
    FOREIGN KEY (team_id) REFERENCES teams(id),
    FOREIGN KEY (player_id) REFERENCES players(id),
    FOREIGN KEY (assist_player_id) REFERENCES players(id),
    FOREIGN KEY (play_id) REFERENCES plays(id),
    FOREIGN KEY (corrects_action_id) REFERENCES actions(id)
);

CREATE TABLE IF NOT EXISTS player_match_stats (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    player_id               INTEGER NOT NULL,
    match_id                INTEGER NOT NULL,
    shots_attempted         INTEGER NOT NULL DEFAULT 0,
    goals                   INTEGER NOT NULL DEFAULT 0,
    assists                 INTEGER NOT NULL DEFAULT 0,
    turnovers               INTEGER NOT NULL DEFAULT 0,
    steals                  INTEGER NOT NULL DEFAULT 0,
    blocks                  INTEGER NOT NULL DEFAULT 0,
    rebounds                INTEGER NOT NULL DEFAULT 0,
    hustles                 INTEGER NOT NULL DEFAULT 0,
    tipped_passes           INTEGER NOT NULL DEFAULT 0,
    fouls_committed         INTEGER NOT NULL DEFAULT 0,
    fouls_drawn             INTEGER NOT NULL DEFAULT 0,
    exclusions              INTEGER NOT NULL DEFAULT 0,
    power_play_goals        INTEGER NOT NULL DEFAULT 0,
    power_play_attempts     INTEGER NOT NULL DEFAULT 0,
    penalty_shots_made      INTEGER NOT NULL DEFAULT 0,
    penalty_shots_attempted INTEGER NOT NULL DEFAULT 0,
    saves                   INTEGER,
    goals_allowed           INTEGER,
    minutes_played          REAL    NOT NULL DEFAULT 0,
    FOREIGN KEY (player_id) REFERENCES players(id),
    FOREIGN KEY (match_id) REFERENCES matches(id)
);

CREATE TABLE IF NOT EXISTS match_plays (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    match_id              INTEGER NOT NULL,
    play_id               INTEGER NOT NULL,
    team_id               INTEGER NOT NULL,
    quarter               INTEGER NOT NULL,
    times_used            INTEGER NOT NULL DEFAULT 1,
    successful_executions INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (match_id) REFERENCES matches(id),
    FOREIGN KEY (play_id) REFERENCES plays(id),
    FOREIGN KEY (team_id) REFERENCES teams(id)
);

CREATE TABLE IF NOT EXISTS opponent_profiles (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id            INTEGER NOT NULL,
    avg_goals_per_game REAL,
    avg_goals_allowed  REAL,
    common_formations  TEXT    NOT NULL DEFAULT '[]',
    common_plays       TEXT    NOT NULL DEFAULT '[]',
    key_players        TEXT    NOT NULL DEFAULT '[]',
    matches_analyzed   INTEGER NOT NULL DEFAULT 0,
    last_analysis_date TEXT    NOT NULL,
    FOREIGN KEY (team_id) REFERENCES teams(id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_teams_name_season
    ON teams(name, COALESCE(season, ''));
CREATE UNIQUE INDEX IF NOT EXISTS idx_players_team_jersey
    ON players(team_id, jersey_number);
CREATE UNIQUE INDEX IF NOT EXISTS idx_stats_player_match
    ON player_match_stats(player_id, match_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_match_plays_key
    ON match_plays(match_id, play_id, team_id, quarter);
CREATE UNIQUE INDEX IF NOT EXISTS idx_profiles_team
    ON opponent_profiles(team_id);
CREATE INDEX IF NOT EXISTS idx_actions_match_order
    ON actions(match_id, quarter, clock_seconds);
"#;
