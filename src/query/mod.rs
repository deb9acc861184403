//! Read-only analytical views over the derived rows. Queries never touch the
//! raw action log and never trigger recomputation; between an action being
//! recorded and the next aggregation run they may read stale derived data.

use std::sync::Arc;

use serde::Serialize;

use crate::db::models::*;
use crate::error::{Error, Result};
use crate::store::Storage;

/// Counters a ranking can be keyed on. Closed set; an unknown stat name is a
/// validation failure, not a silent zero column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatName {
    Goals,
    ShotsAttempted,
    Assists,
    Steals,
    Blocks,
    Rebounds,
    Turnovers,
    Exclusions,
}

impl StatName {
    fn value(&self, s: &PlayerMatchStats) -> f64 {
        let v = match self {
            StatName::Goals => s.goals,
            StatName::ShotsAttempted => s.shots_attempted,
            StatName::Assists => s.assists,
            StatName::Steals => s.steals,
            StatName::Blocks => s.blocks,
            StatName::Rebounds => s.rebounds,
            StatName::Turnovers => s.turnovers,
            StatName::Exclusions => s.exclusions,
        };
        f64::from(v)
    }
}

impl std::str::FromStr for StatName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "goals" => Ok(StatName::Goals),
            "shots_attempted" => Ok(StatName::ShotsAttempted),
            "assists" => Ok(StatName::Assists),
            "steals" => Ok(StatName::Steals),
            "blocks" => Ok(StatName::Blocks),
            "rebounds" => Ok(StatName::Rebounds),
            "turnovers" => Ok(StatName::Turnovers),
            "exclusions" => Ok(StatName::Exclusions),
            other => Err(Error::Validation(format!("unknown stat name '{other}'"))),
        }
    }
}

/// Per-game averages over a player's stats rows
#[derive(Debug, Clone, Serialize)]
pub struct SeasonAverages {
    pub games_played: usize,
    pub avg_goals: f64,
    pub avg_shots: f64,
    pub avg_assists: f64,
    pub avg_steals: f64,
    pub avg_blocks: f64,
    /// Season-total goals over season-total attempts; 0 with no attempts
    pub shot_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedPlayer {
    pub player: Player,
    pub average: f64,
    pub games_played: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayEffectiveness {
    pub total_uses: i64,
    /// Successful executions over uses, as a percentage; 0 when never used
    pub success_rate: f64,
    pub matches_used: usize,
}

#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn Storage>,
}

impl QueryService {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        QueryService { store }
    }

    /// Averages across a player's stats rows, optionally filtered to one
    /// season tag. NotFound when no rows match the filter.
    pub fn season_averages(
        &self,
        player_id: i64,
        season: Option<&str>,
    ) -> Result<SeasonAverages> {
        let rows = self.store.stats_for_player(player_id, season)?;
        if rows.is_empty() {
            return Err(Error::NotFound(format!(
                "no stats for player {player_id} matching season {season:?}"
            )));
        }
        let n = rows.len() as f64;
        let total = |f: fn(&PlayerMatchStats) -> i32| -> f64 {
            rows.iter().map(|s| f64::from(f(s))).sum()
        };
        let goals = total(|s| s.goals);
        let shots = total(|s| s.shots_attempted);
        Ok(SeasonAverages {
            games_played: rows.len(),
            avg_goals: goals / n,
            avg_shots: shots / n,
            avg_assists: total(|s| s.assists) / n,
            avg_steals: total(|s| s.steals) / n,
            avg_blocks: total(|s| s.blocks) / n,
            shot_percentage: if shots > 0.0 { goals / shots * 100.0 } else { 0.0 },
        })
    }

    /// Rank a team's players by their per-game average of one counter,
    /// descending. Players below `min_games` stats rows are excluded.
    pub fn rank_players_by_stat(
        &self,
        team_id: i64,
        stat: StatName,
        min_games: usize,
    ) -> Result<Vec<RankedPlayer>> {
        if self.store.team(team_id)?.is_none() {
            return Err(Error::NotFound(format!("team {team_id}")));
        }
        let mut ranked = Vec::new();
        for player in self.store.players_on_team(team_id)? {
            let Some(pid) = player.id else { continue };
            let rows = self.store.stats_for_player(pid, None)?;
            if rows.len() < min_games {
                continue;
            }
            let average =
                rows.iter().map(|s| stat.value(s)).sum::<f64>() / rows.len() as f64;
            ranked.push(RankedPlayer {
                player,
                average,
                games_played: rows.len(),
            });
        }
        ranked.sort_by(|a, b| {
            b.average
                .partial_cmp(&a.average)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.games_played.cmp(&a.games_played))
        });
        Ok(ranked)
    }

    /// Every match the two teams played against each other, in either
    /// orientation, most recent first. Empty if they never met.
    pub fn head_to_head(&self, team_a: i64, team_b: i64) -> Result<Vec<Match>> {
        self.store.matches_between(team_a, team_b)
    }

    /// Usage and success rate of a play, optionally restricted to one team's
    /// executions. NotFound when the play was never used under the filter.
    pub fn play_effectiveness(
        &self,
        play_id: i64,
        team_id: Option<i64>,
    ) -> Result<PlayEffectiveness> {
        let usages = self.store.play_usage(play_id, team_id)?;
        if usages.is_empty() {
            return Err(Error::NotFound(format!(
                "play {play_id} was never used{}",
                team_id.map(|t| format!(" by team {t}")).unwrap_or_default()
            )));
        }
        let total_uses: i64 = usages.iter().map(|u| i64::from(u.times_used)).sum();
        let total_success: i64 = usages
            .iter()
            .map(|u| i64::from(u.successful_executions))
            .sum();
        let matches_used = {
            let mut ids: Vec<i64> = usages.iter().map(|u| u.match_id).collect();
            ids.sort_unstable();
            ids.dedup();
            ids.len()
        };
        Ok(PlayEffectiveness {
            total_uses,
            success_rate: if total_uses > 0 {
                total_success as f64 / total_uses as f64 * 100.0
            } else {
                0.0
            },
            matches_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregationEngine, SuccessPolicy};
    use crate::catalog::{Catalog, NewMatch};
    use crate::db::Database;
    use approx::assert_relative_eq;
    use chrono::{Duration, Utc};

    struct Fixture {
        store: Arc<dyn Storage>,
        catalog: Catalog,
        engine: AggregationEngine,
        query: QueryService,
        sharks: i64,
        rays: i64,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Storage> = Arc::new(Database::open_in_memory().unwrap());
        let catalog = Catalog::new(store.clone());
        let sharks = catalog
            .create_team("Sharks", None, None, Some("2025"))
            .unwrap()
            .id
            .unwrap();
        let rays = catalog
            .create_team("Rays", None, None, Some("2025"))
            .unwrap()
            .id
            .unwrap();
        let engine = AggregationEngine::new(store.clone(), SuccessPolicy::default());
        let query = QueryService::new(store.clone());
        Fixture {
            store,
            catalog,
            engine,
            query,
            sharks,
            rays,
        }
    }

    /// One finished match with a direct stats entry for the player
    fn play_match(f: &Fixture, player_id: i64, goals: i32, shots: i32, days_ago: i64) -> i64 {
        let match_id = f
            .catalog
            .create_match(NewMatch {
                home_team_id: f.sharks,
                away_team_id: f.rays,
                match_date: Utc::now() - Duration::days(days_ago),
                location: None,
                match_type: MatchType::Regular,
            })
            .unwrap()
            .id
            .unwrap();
        f.engine
            .enter_stats(PlayerMatchStats {
                player_id,
                match_id,
                goals,
                shots_attempted: shots,
                ..Default::default()
            })
            .unwrap();
        match_id
    }

    #[test]
    fn season_averages_over_three_games() {
        let f = fixture();
        let p = f
            .catalog
            .create_player(f.sharks, "Ana", "Silva", 7, Position::Center)
            .unwrap()
            .id
            .unwrap();
        play_match(&f, p, 2, 4, 3);
        play_match(&f, p, 4, 6, 2);
        play_match(&f, p, 0, 2, 1);

        let avg = f.query.season_averages(p, Some("2025")).unwrap();
        assert_eq!(avg.games_played, 3);
        assert_relative_eq!(avg.avg_goals, 2.0);
        assert_relative_eq!(avg.avg_shots, 4.0);
        assert_relative_eq!(avg.shot_percentage, 50.0);

        // A season nobody played has no rows.
        assert!(matches!(
            f.query.season_averages(p, Some("1999")).unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn season_averages_zero_shots_has_zero_percentage() {
        let f = fixture();
        let p = f
            .catalog
            .create_player(f.sharks, "Iris", "Kane", 1, Position::Goalie)
            .unwrap()
            .id
            .unwrap();
        play_match(&f, p, 0, 0, 1);
        let avg = f.query.season_averages(p, None).unwrap();
        assert_relative_eq!(avg.shot_percentage, 0.0);
    }

    #[test]
    fn ranking_excludes_players_below_min_games() {
        let f = fixture();
        let steady = f
            .catalog
            .create_player(f.sharks, "Ana", "Silva", 7, Position::Center)
            .unwrap()
            .id
            .unwrap();
        let hot_rookie = f
            .catalog
            .create_player(f.sharks, "Mia", "Costa", 11, Position::Wing)
            .unwrap()
            .id
            .unwrap();
        // Steady: 2 goals/game over 3 games. Rookie: 6 goals in a single game.
        play_match(&f, steady, 2, 4, 5);
        play_match(&f, steady, 2, 4, 4);
        play_match(&f, steady, 2, 4, 3);
        play_match(&f, hot_rookie, 6, 8, 2);

        let ranked = f
            .query
            .rank_players_by_stat(f.sharks, StatName::Goals, 3)
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].player.id, Some(steady));
        assert_relative_eq!(ranked[0].average, 2.0);
        assert_eq!(ranked[0].games_played, 3);
    }

    #[test]
    fn ranking_orders_descending_by_average() {
        let f = fixture();
        let a = f
            .catalog
            .create_player(f.sharks, "Ana", "Silva", 7, Position::Center)
            .unwrap()
            .id
            .unwrap();
        let b = f
            .catalog
            .create_player(f.sharks, "Lea", "Brandt", 9, Position::Driver)
            .unwrap()
            .id
            .unwrap();
        play_match(&f, a, 1, 3, 2);
        play_match(&f, b, 3, 5, 1);

        let ranked = f
            .query
            .rank_players_by_stat(f.sharks, StatName::Goals, 1)
            .unwrap();
        assert_eq!(ranked[0].player.id, Some(b));
        assert_eq!(ranked[1].player.id, Some(a));
    }

    #[test]
    fn stat_name_parsing_rejects_unknown_counters() {
        assert!("goals".parse::<StatName>().is_ok());
        assert!(matches!(
            "swagger".parse::<StatName>().unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[test]
    fn head_to_head_covers_both_orientations_newest_first() {
        let f = fixture();
        let older = f
            .catalog
            .create_match(NewMatch {
                home_team_id: f.sharks,
                away_team_id: f.rays,
                match_date: Utc::now() - Duration::days(30),
                location: None,
                match_type: MatchType::Regular,
            })
            .unwrap()
            .id
            .unwrap();
        let newer = f
            .catalog
            .create_match(NewMatch {
                home_team_id: f.rays,
                away_team_id: f.sharks,
                match_date: Utc::now() - Duration::days(2),
                location: None,
                match_type: MatchType::Playoff,
            })
            .unwrap()
            .id
            .unwrap();

        let history = f.query.head_to_head(f.sharks, f.rays).unwrap();
        let ids: Vec<i64> = history.iter().filter_map(|m| m.id).collect();
        assert_eq!(ids, vec![newer, older]);

        // Never-met pair: empty, not an error.
        let minnows = f
            .catalog
            .create_team("Minnows", None, None, Some("2025"))
            .unwrap()
            .id
            .unwrap();
        assert!(f.query.head_to_head(f.sharks, minnows).unwrap().is_empty());
    }

    #[test]
    fn play_effectiveness_sums_usage_across_matches() {
        let f = fixture();
        let play = f
            .catalog
            .create_play("Umbrella", PlayType::Offensive, Some("3-3"), Some(f.sharks), None)
            .unwrap()
            .id
            .unwrap();
        let m1 = play_match(&f, {
            f.catalog
                .create_player(f.sharks, "Ana", "Silva", 7, Position::Center)
                .unwrap()
                .id
                .unwrap()
        }, 1, 2, 2);
        let m2 = f
            .catalog
            .create_match(NewMatch {
                home_team_id: f.rays,
                away_team_id: f.sharks,
                match_date: Utc::now(),
                location: None,
                match_type: MatchType::Regular,
            })
            .unwrap()
            .id
            .unwrap();
        for (match_id, used, success, quarter) in [(m1, 3, 2, 1), (m2, 1, 0, 2)] {
            f.store
                .replace_match_derived(
                    match_id,
                    &f.store.stats_for_match(match_id).unwrap(),
                    &[MatchPlayUsage {
                        id: None,
                        match_id,
                        play_id: play,
                        team_id: f.sharks,
                        quarter,
                        times_used: used,
                        successful_executions: success,
                    }],
                )
                .unwrap();
        }

        let eff = f.query.play_effectiveness(play, Some(f.sharks)).unwrap();
        assert_eq!(eff.total_uses, 4);
        assert_eq!(eff.matches_used, 2);
        assert_relative_eq!(eff.success_rate, 50.0);

        // Filtered to a team that never ran it: NotFound.
        assert!(matches!(
            f.query.play_effectiveness(play, Some(f.rays)).unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
