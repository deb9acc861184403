//! Folds the action log into derived rows. The fold is pure: the same action
//! set always produces the same PlayerMatchStats and MatchPlay rows, so a
//! re-run after corrections is safe. Derived rows are replaced wholesale,
//! never incremented in place.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::db::models::*;
use crate::error::{ConsistencyWarning, Error, Result};
use crate::locks::MatchLocks;
use crate::store::Storage;

/// How a play execution counts as successful. Offensive plays succeed on a
/// goal; the defensive rule is unsettled in the sport's bookkeeping, so it
/// stays a policy choice rather than a hardcoded rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefensiveSuccessRule {
    /// A stop was recorded: Block or Steal, or an explicit Success outcome
    #[default]
    StopRecorded,
    /// Only an explicit Success outcome tag counts
    OutcomeTagOnly,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SuccessPolicy {
    pub defensive: DefensiveSuccessRule,
}

impl SuccessPolicy {
    fn is_success(&self, play_type: PlayType, action: &Action) -> bool {
        let tagged = action.outcome == Some(ActionOutcome::Success);
        match play_type {
            PlayType::Offensive | PlayType::SpecialTeams => {
                action.kind == ActionKind::ShotGoal || tagged
            }
            PlayType::Defensive => match self.defensive {
                DefensiveSuccessRule::StopRecorded => {
                    matches!(action.kind, ActionKind::Block | ActionKind::Steal) || tagged
                }
                DefensiveSuccessRule::OutcomeTagOnly => tagged,
            },
        }
    }
}

/// Result of folding one match: derived rows plus any non-fatal warnings
#[derive(Debug, Clone)]
pub struct MatchAggregation {
    pub match_id: i64,
    pub player_stats: Vec<PlayerMatchStats>,
    pub play_usage: Vec<MatchPlayUsage>,
    pub warnings: Vec<ConsistencyWarning>,
}

#[derive(Clone)]
pub struct AggregationEngine {
    store: Arc<dyn Storage>,
    // Recompute lock per match, distinct from the append lock, so two
    // aggregation runs never interleave partial derived writes.
    recompute_locks: MatchLocks,
    policy: SuccessPolicy,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn Storage>, policy: SuccessPolicy) -> Self {
        AggregationEngine {
            store,
            recompute_locks: MatchLocks::new(),
            policy,
        }
    }

    /// Fold a match's actions into derived rows and replace the stored ones.
    /// Inconsistent actions are skipped with a warning; an empty match yields
    /// empty derived rows, not an error.
    pub fn aggregate_match(&self, match_id: i64) -> Result<MatchAggregation> {
        let m = self
            .store
            .match_by_id(match_id)?
            .ok_or_else(|| Error::NotFound(format!("match {match_id}")))?;

        let lock = self.recompute_locks.for_match(match_id);
        let _guard = lock.lock().unwrap();

        let actions = self.store.actions_for_match(match_id)?;
        let roster = self.roster_for(&m)?;
        let plays = self.plays_referenced(&actions)?;
        let agg = fold_match(&m, &actions, &roster, &plays, self.policy);

        for w in &agg.warnings {
            warn!(match_id, action_id = w.action_id, "{}", w.message);
        }
        self.store
            .replace_match_derived(match_id, &agg.player_stats, &agg.play_usage)?;
        info!(
            match_id,
            players = agg.player_stats.len(),
            play_rows = agg.play_usage.len(),
            warnings = agg.warnings.len(),
            "match aggregated"
        );
        Ok(agg)
    }

    /// Direct stat entry for matches with no action log. One row per
    /// (player, match); a second entry conflicts.
    pub fn enter_stats(&self, row: PlayerMatchStats) -> Result<i64> {
        let m = self
            .store
            .match_by_id(row.match_id)?
            .ok_or_else(|| Error::NotFound(format!("match {}", row.match_id)))?;
        let player = self
            .store
            .player(row.player_id)?
            .ok_or_else(|| Error::NotFound(format!("player {}", row.player_id)))?;
        if player.team_id != m.home_team_id && player.team_id != m.away_team_id {
            return Err(Error::Validation(format!(
                "player {} is on neither team of match {}",
                row.player_id, row.match_id
            )));
        }
        if self
            .store
            .stats_for_match(row.match_id)?
            .iter()
            .any(|s| s.player_id == row.player_id)
        {
            return Err(Error::Conflict(format!(
                "stats already entered for player {} in match {}",
                row.player_id, row.match_id
            )));
        }
        self.store.insert_player_match_stats(&row)
    }

    /// Re-fold without writing and compare against the stored derived rows.
    /// Divergence (e.g. a stale direct entry once actions exist) comes back
    /// as warnings.
    pub fn check_consistency(&self, match_id: i64) -> Result<Vec<ConsistencyWarning>> {
        let m = self
            .store
            .match_by_id(match_id)?
            .ok_or_else(|| Error::NotFound(format!("match {match_id}")))?;
        let actions = self.store.actions_for_match(match_id)?;
        let roster = self.roster_for(&m)?;
        let plays = self.plays_referenced(&actions)?;
        let fresh = fold_match(&m, &actions, &roster, &plays, self.policy);

        let stored = self.store.stats_for_match(match_id)?;
        let mut warnings = fresh.warnings;
        for want in &fresh.player_stats {
            match stored.iter().find(|s| s.player_id == want.player_id) {
                None => warnings.push(ConsistencyWarning {
                    action_id: 0,
                    message: format!(
                        "no stored stats row for player {} despite recorded actions",
                        want.player_id
                    ),
                }),
                Some(have) => {
                    let mut have = have.clone();
                    have.id = want.id;
                    if have != *want {
                        warnings.push(ConsistencyWarning {
                            action_id: 0,
                            message: format!(
                                "stored stats for player {} diverge from the action fold",
                                want.player_id
                            ),
                        });
                    }
                }
            }
        }
        // Reverse direction: once actions exist they are the source of
        // truth, so a stored row for a player the fold never produced is a
        // stale direct entry.
        if !actions.is_empty() {
            for have in &stored {
                if !fresh
                    .player_stats
                    .iter()
                    .any(|w| w.player_id == have.player_id)
                {
                    warnings.push(ConsistencyWarning {
                        action_id: 0,
                        message: format!(
                            "stored stats row for player {} has no backing actions",
                            have.player_id
                        ),
                    });
                }
            }
        }
        Ok(warnings)
    }

    /// Rebuild a team's scouting profile from its completed matches. The
    /// cancel flag is checked between per-match folds; a cancelled refresh
    /// writes nothing and leaves any prior profile untouched.
    pub fn refresh_opponent_profile(
        &self,
        team_id: i64,
        cancel: &AtomicBool,
    ) -> Result<Option<OpponentProfile>> {
        let team = self
            .store
            .team(team_id)?
            .ok_or_else(|| Error::NotFound(format!("team {team_id}")))?;
        let completed: Vec<Match> = self
            .store
            .matches_for_team(team_id)?
            .into_iter()
            .filter(|m| m.is_locked)
            .collect();

        let roster_ids: HashSet<i64> = self
            .store
            .players_on_team(team_id)?
            .into_iter()
            .filter_map(|p| p.id)
            .collect();

        let mut goals_for = 0i64;
        let mut goals_against = 0i64;
        let mut play_counts: BTreeMap<i64, i64> = BTreeMap::new();
        let mut formation_counts: BTreeMap<String, i64> = BTreeMap::new();
        let mut goals_by_player: BTreeMap<i64, i64> = BTreeMap::new();

        for m in &completed {
            if cancel.load(Ordering::Relaxed) {
                info!(team_id, team = %team.name, "profile refresh cancelled, keeping prior profile");
                return Ok(None);
            }
            let (own, opp) = if m.home_team_id == team_id {
                (m.home_score, m.away_score)
            } else {
                (m.away_score, m.home_score)
            };
            goals_for += i64::from(own);
            goals_against += i64::from(opp);

            let match_id = m.id.unwrap_or_default();
            for usage in self.store.match_plays_for_match(match_id)? {
                if usage.team_id != team_id {
                    continue;
                }
                *play_counts.entry(usage.play_id).or_default() += i64::from(usage.times_used);
                if let Some(play) = self.store.play(usage.play_id)? {
                    if let Some(formation) = play.formation {
                        *formation_counts.entry(formation).or_default() +=
                            i64::from(usage.times_used);
                    }
                }
            }
            for stats in self.store.stats_for_match(match_id)? {
                if roster_ids.contains(&stats.player_id) && stats.goals > 0 {
                    *goals_by_player.entry(stats.player_id).or_default() +=
                        i64::from(stats.goals);
                }
            }
        }

        let n = completed.len() as i32;
        let profile = OpponentProfile {
            id: None,
            team_id,
            avg_goals_per_game: (n > 0).then(|| goals_for as f64 / f64::from(n)),
            avg_goals_allowed: (n > 0).then(|| goals_against as f64 / f64::from(n)),
            common_formations: top_keys(&formation_counts, 5),
            common_plays: top_keys(&play_counts, 5),
            key_players: top_keys(&goals_by_player, 3),
            matches_analyzed: n,
            last_analysis_date: Utc::now(),
        };
        // All-or-nothing: the single upsert replaces the prior profile.
        self.store.replace_opponent_profile(&profile)?;
        info!(team_id, matches = n, "opponent profile refreshed");
        Ok(Some(profile))
    }

    fn roster_for(&self, m: &Match) -> Result<HashMap<i64, Player>> {
        let mut roster = HashMap::new();
        for team_id in [m.home_team_id, m.away_team_id] {
            for p in self.store.players_on_team(team_id)? {
                if let Some(id) = p.id {
                    roster.insert(id, p);
                }
            }
        }
        Ok(roster)
    }

    fn plays_referenced(&self, actions: &[Action]) -> Result<HashMap<i64, Play>> {
        let mut plays = HashMap::new();
        for action in actions {
            if let Some(play_id) = action.play_id {
                if !plays.contains_key(&play_id) {
                    if let Some(play) = self.store.play(play_id)? {
                        plays.insert(play_id, play);
                    }
                }
            }
        }
        Ok(plays)
    }
}

/// Sort keys by descending count, ties by key order, and keep the top `n`
fn top_keys<K: Clone + Ord>(counts: &BTreeMap<K, i64>, n: usize) -> Vec<K> {
    let mut entries: Vec<(&K, &i64)> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    entries.into_iter().take(n).map(|(k, _)| k.clone()).collect()
}

/// Pure fold of one match's action sequence into derived rows. Deterministic
/// for a fixed action set: rows come out sorted by stable keys.
fn fold_match(
    m: &Match,
    actions: &[Action],
    roster: &HashMap<i64, Player>,
    plays: &HashMap<i64, Play>,
    policy: SuccessPolicy,
) -> MatchAggregation {
    let match_id = m.id.unwrap_or_default();
    let superseded: HashSet<i64> = actions
        .iter()
        .filter_map(|a| a.corrects_action_id)
        .collect();

    let mut stats: BTreeMap<i64, PlayerMatchStats> = BTreeMap::new();
    let mut usage: BTreeMap<(i64, i64, i32), MatchPlayUsage> = BTreeMap::new();
    let mut warnings = Vec::new();
    // Goals conceded per team side, for goalie bookkeeping.
    let mut conceded: HashMap<i64, i32> = HashMap::new();
    // Which goalies showed up in the action log, per team.
    let mut goalies_seen: HashMap<i64, HashSet<i64>> = HashMap::new();

    for action in actions {
        let action_id = action.id.unwrap_or_default();
        if superseded.contains(&action_id) {
            continue;
        }
        if action.team_id != m.home_team_id && action.team_id != m.away_team_id {
            warnings.push(ConsistencyWarning {
                action_id,
                message: format!("team {} is not playing in this match", action.team_id),
            });
            continue;
        }

        let mut acting_player: Option<&Player> = None;
        if let Some(pid) = action.player_id {
            match roster.get(&pid) {
                Some(p) if p.team_id == action.team_id => acting_player = Some(p),
                Some(_) => {
                    warnings.push(ConsistencyWarning {
                        action_id,
                        message: format!("player {pid} does not belong to team {}", action.team_id),
                    });
                    continue;
                }
                None => {
                    warnings.push(ConsistencyWarning {
                        action_id,
                        message: format!("player {pid} is on neither roster"),
                    });
                    continue;
                }
            }
        }

        if action.kind == ActionKind::ShotGoal {
            let opponent = if action.team_id == m.home_team_id {
                m.away_team_id
            } else {
                m.home_team_id
            };
            *conceded.entry(opponent).or_default() += 1;
        }

        if let Some(player) = acting_player {
            let pid = player.id.unwrap_or_default();
            let row = stats.entry(pid).or_insert_with(|| PlayerMatchStats {
                player_id: pid,
                match_id,
                ..Default::default()
            });
            apply_kind(row, action, player.position);
            if player.position == Position::Goalie {
                goalies_seen.entry(player.team_id).or_default().insert(pid);
            }
        }

        // Assist credit on a goal goes to the linked teammate, whether the
        // goal itself was charted to a player or to the team.
        if action.kind == ActionKind::ShotGoal {
            if let Some(apid) = action.assist_player_id {
                match roster.get(&apid) {
                    Some(a) if a.team_id == action.team_id => {
                        let arow = stats.entry(apid).or_insert_with(|| PlayerMatchStats {
                            player_id: apid,
                            match_id,
                            ..Default::default()
                        });
                        arow.assists += 1;
                    }
                    _ => warnings.push(ConsistencyWarning {
                        action_id,
                        message: format!("assist player {apid} is not on team {}", action.team_id),
                    }),
                }
            }
        }

        if let Some(play_id) = action.play_id {
            match plays.get(&play_id) {
                Some(play) => {
                    let key = (play_id, action.team_id, action.quarter);
                    let entry = usage.entry(key).or_insert(MatchPlayUsage {
                        id: None,
                        match_id,
                        play_id,
                        team_id: action.team_id,
                        quarter: action.quarter,
                        times_used: 0,
                        successful_executions: 0,
                    });
                    entry.times_used += 1;
                    if policy.is_success(play.play_type, action) {
                        entry.successful_executions += 1;
                    }
                }
                None => warnings.push(ConsistencyWarning {
                    action_id,
                    message: format!("referenced play {play_id} does not exist"),
                }),
            }
        }
    }

    // A lone goalie in the action log absorbs the team's conceded goals.
    // With zero or several goalies seen, attribution is ambiguous and
    // goals_allowed stays unset.
    for (team_id, goalie_ids) in &goalies_seen {
        if goalie_ids.len() == 1 {
            let gid = goalie_ids.iter().next().copied().unwrap_or_default();
            if let Some(row) = stats.get_mut(&gid) {
                row.goals_allowed = Some(conceded.get(team_id).copied().unwrap_or(0));
                if row.saves.is_none() {
                    row.saves = Some(0);
                }
            }
        }
    }

    MatchAggregation {
        match_id,
        player_stats: stats.into_values().collect(),
        play_usage: usage.into_values().collect(),
        warnings,
    }
}

fn apply_kind(row: &mut PlayerMatchStats, action: &Action, position: Position) {
    match action.kind {
        ActionKind::ShotGoal => {
            row.shots_attempted += 1;
            row.goals += 1;
            if action.is_power_play {
                row.power_play_attempts += 1;
                row.power_play_goals += 1;
            }
        }
        ActionKind::ShotMiss => {
            row.shots_attempted += 1;
            if action.is_power_play {
                row.power_play_attempts += 1;
            }
        }
        ActionKind::Block => {
            row.blocks += 1;
            if position == Position::Goalie {
                *row.saves.get_or_insert(0) += 1;
            }
        }
        ActionKind::Rebound => row.rebounds += 1,
        ActionKind::Assist => row.assists += 1,
        ActionKind::Steal => row.steals += 1,
        ActionKind::Turnover => row.turnovers += 1,
        ActionKind::Hustle => row.hustles += 1,
        ActionKind::Exclusion => row.exclusions += 1,
        ActionKind::TippedPass => row.tipped_passes += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionLog, NewAction};
    use crate::catalog::{Catalog, NewMatch};
    use crate::db::Database;
    use approx::assert_relative_eq;

    struct Fixture {
        store: Arc<dyn Storage>,
        catalog: Catalog,
        log: ActionLog,
        engine: AggregationEngine,
        match_id: i64,
        sharks: i64,
        rays: i64,
        shark7: i64,
        shark9: i64,
        shark_goalie: i64,
        ray3: i64,
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
        let shark7 = catalog
            .create_player(sharks, "Ana", "Silva", 7, Position::Center)
            .unwrap()
            .id
            .unwrap();
        let shark9 = catalog
            .create_player(sharks, "Lea", "Brandt", 9, Position::Driver)
            .unwrap()
            .id
            .unwrap();
        let shark_goalie = catalog
            .create_player(sharks, "Iris", "Kane", 1, Position::Goalie)
            .unwrap()
            .id
            .unwrap();
        let ray3 = catalog
            .create_player(rays, "Ben", "Okafor", 3, Position::Wing)
            .unwrap()
            .id
            .unwrap();
        let match_id = catalog
            .create_match(NewMatch {
                home_team_id: sharks,
                away_team_id: rays,
                match_date: Utc::now(),
                location: None,
                match_type: MatchType::Regular,
            })
            .unwrap()
            .id
            .unwrap();
        let log = ActionLog::new(store.clone(), MatchLocks::new());
        let engine = AggregationEngine::new(store.clone(), SuccessPolicy::default());
        Fixture {
            store,
            catalog,
            log,
            engine,
            match_id,
            sharks,
            rays,
            shark7,
            shark9,
            shark_goalie,
            ray3,
        }
    }

    fn shot(f: &Fixture, kind: ActionKind, clock: i32) -> NewAction {
        NewAction::new(f.match_id, f.sharks, Some(f.shark7), kind, 1, clock)
    }

    #[test]
    fn three_goals_two_misses_yields_sixty_percent() {
        let f = fixture();
        for (i, kind) in [
            ActionKind::ShotGoal,
            ActionKind::ShotGoal,
            ActionKind::ShotGoal,
            ActionKind::ShotMiss,
            ActionKind::ShotMiss,
        ]
        .iter()
        .enumerate()
        {
            f.log.record_action(shot(&f, *kind, i as i32 * 30)).unwrap();
        }
        let agg = f.engine.aggregate_match(f.match_id).unwrap();
        assert!(agg.warnings.is_empty());
        let row = agg
            .player_stats
            .iter()
            .find(|s| s.player_id == f.shark7)
            .unwrap();
        assert_eq!(row.shots_attempted, 5);
        assert_eq!(row.goals, 3);
        assert_relative_eq!(row.shot_percentage(), 60.0);
    }

    #[test]
    fn rerunning_aggregation_is_idempotent() {
        let f = fixture();
        f.log.record_action(shot(&f, ActionKind::ShotGoal, 10)).unwrap();
        f.log.record_action(shot(&f, ActionKind::Steal, 40)).unwrap();
        let mut play = NewAction::new(
            f.match_id,
            f.rays,
            Some(f.ray3),
            ActionKind::Turnover,
            2,
            15,
        );
        play.outcome = Some(ActionOutcome::Fail);
        f.log.record_action(play).unwrap();

        let first = f.engine.aggregate_match(f.match_id).unwrap();
        let second = f.engine.aggregate_match(f.match_id).unwrap();
        assert_eq!(first.player_stats, second.player_stats);
        assert_eq!(first.play_usage, second.play_usage);

        let stored = f.store.stats_for_match(f.match_id).unwrap();
        assert_eq!(stored.len(), first.player_stats.len());
    }

    #[test]
    fn empty_match_aggregates_to_nothing() {
        let f = fixture();
        let agg = f.engine.aggregate_match(f.match_id).unwrap();
        assert!(agg.player_stats.is_empty());
        assert!(agg.play_usage.is_empty());
        assert!(agg.warnings.is_empty());
    }

    #[test]
    fn unknown_match_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.engine.aggregate_match(9999).unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn inconsistent_action_is_skipped_with_one_warning() {
        let f = fixture();
        f.log.record_action(shot(&f, ActionKind::ShotGoal, 10)).unwrap();
        // Bypass the action log's validation: a ray player credited to the
        // sharks, as a bad import would produce.
        f.store
            .append_action(&Action {
                id: None,
                match_id: f.match_id,
                team_id: f.sharks,
                player_id: Some(f.ray3),
                kind: ActionKind::ShotGoal,
                quarter: 1,
                clock_seconds: 20,
                location: None,
                assist_player_id: None,
                play_id: None,
                outcome: None,
                is_power_play: false,
                is_counter_attack: false,
                corrects_action_id: None,
                recorded_at: Utc::now(),
            })
            .unwrap();

        let agg = f.engine.aggregate_match(f.match_id).unwrap();
        assert_eq!(agg.warnings.len(), 1);
        let row = agg
            .player_stats
            .iter()
            .find(|s| s.player_id == f.shark7)
            .unwrap();
        assert_eq!(row.goals, 1);
        assert!(!agg.player_stats.iter().any(|s| s.player_id == f.ray3));
    }

    #[test]
    fn correction_supersedes_the_original_action() {
        let f = fixture();
        let wrong = f.log.record_action(shot(&f, ActionKind::ShotGoal, 10)).unwrap();
        let mut fix = shot(&f, ActionKind::ShotMiss, 10);
        fix.corrects_action_id = Some(wrong);
        f.log.record_action(fix).unwrap();

        let agg = f.engine.aggregate_match(f.match_id).unwrap();
        let row = agg
            .player_stats
            .iter()
            .find(|s| s.player_id == f.shark7)
            .unwrap();
        assert_eq!(row.shots_attempted, 1);
        assert_eq!(row.goals, 0);
    }

    #[test]
    fn assist_link_credits_the_teammate() {
        let f = fixture();
        let mut goal = shot(&f, ActionKind::ShotGoal, 25);
        goal.assist_player_id = Some(f.shark9);
        f.log.record_action(goal).unwrap();

        let agg = f.engine.aggregate_match(f.match_id).unwrap();
        let passer = agg
            .player_stats
            .iter()
            .find(|s| s.player_id == f.shark9)
            .unwrap();
        assert_eq!(passer.assists, 1);
        assert_eq!(passer.goals, 0);
    }

    #[test]
    fn team_level_goal_still_credits_the_linked_assist() {
        let f = fixture();
        let mut goal = NewAction::new(f.match_id, f.sharks, None, ActionKind::ShotGoal, 2, 45);
        goal.assist_player_id = Some(f.shark9);
        f.log.record_action(goal).unwrap();

        let agg = f.engine.aggregate_match(f.match_id).unwrap();
        assert!(agg.warnings.is_empty());
        let passer = agg
            .player_stats
            .iter()
            .find(|s| s.player_id == f.shark9)
            .unwrap();
        assert_eq!(passer.assists, 1);
        // The unattributed goal itself produces no shooter row.
        assert_eq!(agg.player_stats.len(), 1);
    }

    #[test]
    fn power_play_shots_feed_the_special_situation_split() {
        let f = fixture();
        let mut pp_goal = shot(&f, ActionKind::ShotGoal, 10);
        pp_goal.is_power_play = true;
        f.log.record_action(pp_goal).unwrap();
        let mut pp_miss = shot(&f, ActionKind::ShotMiss, 40);
        pp_miss.is_power_play = true;
        f.log.record_action(pp_miss).unwrap();

        let agg = f.engine.aggregate_match(f.match_id).unwrap();
        let row = agg
            .player_stats
            .iter()
            .find(|s| s.player_id == f.shark7)
            .unwrap();
        assert_eq!(row.power_play_attempts, 2);
        assert_eq!(row.power_play_goals, 1);
    }

    #[test]
    fn lone_goalie_gets_saves_and_goals_allowed() {
        let f = fixture();
        f.log
            .record_action(NewAction::new(
                f.match_id,
                f.sharks,
                Some(f.shark_goalie),
                ActionKind::Block,
                1,
                60,
            ))
            .unwrap();
        f.log
            .record_action(NewAction::new(
                f.match_id,
                f.rays,
                Some(f.ray3),
                ActionKind::ShotGoal,
                2,
                100,
            ))
            .unwrap();

        let agg = f.engine.aggregate_match(f.match_id).unwrap();
        let goalie = agg
            .player_stats
            .iter()
            .find(|s| s.player_id == f.shark_goalie)
            .unwrap();
        assert_eq!(goalie.saves, Some(1));
        assert_eq!(goalie.goals_allowed, Some(1));
        assert_relative_eq!(goalie.save_percentage().unwrap(), 50.0);
    }

    #[test]
    fn play_usage_counts_per_quarter_with_success_policy() {
        let f = fixture();
        let press = f
            .catalog
            .create_play("Press", PlayType::Defensive, Some("Press"), Some(f.sharks), None)
            .unwrap()
            .id
            .unwrap();

        let mut steal = NewAction::new(f.match_id, f.sharks, Some(f.shark9), ActionKind::Steal, 1, 50);
        steal.play_id = Some(press);
        f.log.record_action(steal).unwrap();
        let mut beaten = NewAction::new(
            f.match_id,
            f.sharks,
            Some(f.shark9),
            ActionKind::Hustle,
            1,
            90,
        );
        beaten.play_id = Some(press);
        beaten.outcome = Some(ActionOutcome::Fail);
        f.log.record_action(beaten).unwrap();
        let mut q3 = NewAction::new(f.match_id, f.sharks, Some(f.shark9), ActionKind::Steal, 3, 12);
        q3.play_id = Some(press);
        f.log.record_action(q3).unwrap();

        let agg = f.engine.aggregate_match(f.match_id).unwrap();
        assert_eq!(agg.play_usage.len(), 2);
        let q1 = agg
            .play_usage
            .iter()
            .find(|u| u.quarter == 1)
            .unwrap();
        assert_eq!(q1.times_used, 2);
        assert_eq!(q1.successful_executions, 1);
        let q3_row = agg.play_usage.iter().find(|u| u.quarter == 3).unwrap();
        assert_eq!(q3_row.times_used, 1);
        assert_eq!(q3_row.successful_executions, 1);
    }

    #[test]
    fn strict_defensive_policy_only_counts_tagged_success() {
        let f = fixture();
        let press = f
            .catalog
            .create_play("Press", PlayType::Defensive, Some("Press"), Some(f.sharks), None)
            .unwrap()
            .id
            .unwrap();
        let mut steal = NewAction::new(f.match_id, f.sharks, Some(f.shark9), ActionKind::Steal, 1, 50);
        steal.play_id = Some(press);
        f.log.record_action(steal).unwrap();

        let strict = AggregationEngine::new(
            f.store.clone(),
            SuccessPolicy {
                defensive: DefensiveSuccessRule::OutcomeTagOnly,
            },
        );
        let agg = strict.aggregate_match(f.match_id).unwrap();
        assert_eq!(agg.play_usage[0].successful_executions, 0);
    }

    #[test]
    fn duplicate_direct_entry_conflicts() {
        let f = fixture();
        let row = PlayerMatchStats {
            player_id: f.shark7,
            match_id: f.match_id,
            goals: 2,
            shots_attempted: 4,
            ..Default::default()
        };
        f.engine.enter_stats(row.clone()).unwrap();
        assert!(matches!(
            f.engine.enter_stats(row).unwrap_err(),
            Error::Conflict(_)
        ));
    }

    #[test]
    fn consistency_check_flags_divergent_direct_entry() {
        let f = fixture();
        f.engine
            .enter_stats(PlayerMatchStats {
                player_id: f.shark7,
                match_id: f.match_id,
                goals: 5,
                shots_attempted: 5,
                ..Default::default()
            })
            .unwrap();
        // The action log says otherwise.
        f.log.record_action(shot(&f, ActionKind::ShotGoal, 10)).unwrap();

        let warnings = f.engine.check_consistency(f.match_id).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn consistency_check_flags_stored_row_without_backing_actions() {
        let f = fixture();
        // Direct entry for a player who never appears in the action log.
        f.engine
            .enter_stats(PlayerMatchStats {
                player_id: f.shark9,
                match_id: f.match_id,
                goals: 5,
                shots_attempted: 5,
                ..Default::default()
            })
            .unwrap();
        f.log.record_action(shot(&f, ActionKind::ShotGoal, 10)).unwrap();

        let warnings = f.engine.check_consistency(f.match_id).unwrap();
        // One for the shooter's missing stored row, one for the fabricated
        // entry with no actions behind it.
        assert_eq!(warnings.len(), 2);
        assert!(warnings
            .iter()
            .any(|w| w.message.contains(&format!("player {}", f.shark7))));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains(&format!("player {} has no backing actions", f.shark9))));

        // A match with no actions at all leaves direct entries unquestioned.
        let other = f
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
        f.engine
            .enter_stats(PlayerMatchStats {
                player_id: f.shark7,
                match_id: other,
                goals: 2,
                shots_attempted: 3,
                ..Default::default()
            })
            .unwrap();
        assert!(f.engine.check_consistency(other).unwrap().is_empty());
    }

    #[test]
    fn profile_refresh_replaces_and_cancel_keeps_prior() {
        let f = fixture();
        f.log.record_action(shot(&f, ActionKind::ShotGoal, 10)).unwrap();
        f.engine.aggregate_match(f.match_id).unwrap();
        f.catalog
            .finalize_match(f.match_id, 12, 9, None, 0)
            .unwrap();

        let not_cancelled = AtomicBool::new(false);
        let profile = f
            .engine
            .refresh_opponent_profile(f.sharks, &not_cancelled)
            .unwrap()
            .unwrap();
        assert_eq!(profile.matches_analyzed, 1);
        assert_relative_eq!(profile.avg_goals_per_game.unwrap(), 12.0);
        assert_relative_eq!(profile.avg_goals_allowed.unwrap(), 9.0);
        assert_eq!(profile.key_players, vec![f.shark7]);

        let cancelled = AtomicBool::new(true);
        let outcome = f
            .engine
            .refresh_opponent_profile(f.sharks, &cancelled)
            .unwrap();
        assert!(outcome.is_none());
        // The stored profile is the one from the completed refresh.
        let stored = f.store.opponent_profile(f.sharks).unwrap().unwrap();
        assert_eq!(stored.matches_analyzed, 1);
    }
}
