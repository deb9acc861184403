use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use waterpolo_analytics::db::models::{ActionKind, ActionOutcome, MatchType, PlayType, Position};
use waterpolo_analytics::{
    ActionLog, AggregationEngine, Catalog, Database, NewAction, NewMatch, QueryService, StatName,
    Storage, SuccessPolicy,
};
use waterpolo_analytics::locks::MatchLocks;

/// Water polo match statistics recorder and analyzer
#[derive(Parser, Debug)]
#[command(name = "waterpolo-analytics", version, about)]
struct Cli {
    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "waterpolo.db")]
    database_path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a team
    AddTeam {
        name: String,
        #[arg(long)]
        coach: Option<String>,
        #[arg(long)]
        division: Option<String>,
        #[arg(long)]
        season: Option<String>,
    },
    /// Add a player to a team roster
    AddPlayer {
        team_id: i64,
        first_name: String,
        last_name: String,
        jersey: i32,
        /// Center | Wing | Driver | Goalie | Flat
        position: String,
    },
    /// Register a play in the tactics library
    AddPlay {
        name: String,
        /// Offensive | Defensive | "Special Teams"
        play_type: String,
        #[arg(long)]
        formation: Option<String>,
        #[arg(long)]
        team_id: Option<i64>,
    },
    /// Schedule a match
    AddMatch {
        home_team_id: i64,
        away_team_id: i64,
        /// Regular | Playoff | Tournament | Scrimmage
        #[arg(long, default_value = "Regular")]
        match_type: String,
        #[arg(long)]
        location: Option<String>,
    },
    /// Record one in-match action
    Record {
        match_id: i64,
        team_id: i64,
        /// e.g. ShotGoal, ShotMiss, Block, Steal, Turnover, Exclusion
        kind: String,
        quarter: i32,
        /// Seconds elapsed within the quarter
        clock: i32,
        #[arg(long)]
        player_id: Option<i64>,
        #[arg(long)]
        assist_player_id: Option<i64>,
        #[arg(long)]
        play_id: Option<i64>,
        /// Success | Fail | Blocked
        #[arg(long)]
        outcome: Option<String>,
        #[arg(long)]
        power_play: bool,
        /// Supersede an earlier, mis-entered action
        #[arg(long)]
        corrects: Option<i64>,
    },
    /// Record final scores and lock the match
    Finalize {
        match_id: i64,
        home_score: i32,
        away_score: i32,
        #[arg(long, default_value = "0")]
        overtime_quarters: i32,
    },
    /// Fold a match's action log into derived stat rows
    Aggregate { match_id: i64 },
    /// Rebuild a team's opponent scouting profile
    Profile { team_id: i64 },
    /// Season averages for a player
    Averages {
        player_id: i64,
        #[arg(long)]
        season: Option<String>,
    },
    /// Rank a team's players by a counter
    Rank {
        team_id: i64,
        /// goals, shots_attempted, assists, steals, blocks, rebounds, ...
        stat: String,
        #[arg(long, default_value = "3")]
        min_games: usize,
    },
    /// Matchup history between two teams
    HeadToHead { team_a: i64, team_b: i64 },
    /// Usage and success rate of a play
    PlayStats {
        play_id: i64,
        #[arg(long)]
        team_id: Option<i64>,
    },
}

fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store: Arc<dyn Storage> = Arc::new(Database::open(&cli.database_path)?);
    info!("Database opened: {}", cli.database_path);

    let catalog = Catalog::new(store.clone());
    let log = ActionLog::new(store.clone(), MatchLocks::new());
    let engine = AggregationEngine::new(store.clone(), SuccessPolicy::default());
    let query = QueryService::new(store);

    match cli.command {
        Command::AddTeam {
            name,
            coach,
            division,
            season,
        } => {
            let team = catalog.create_team(
                &name,
                coach.as_deref(),
                division.as_deref(),
                season.as_deref(),
            )?;
            println!("team {} created: {}", team.id.unwrap_or_default(), team.name);
        }
        Command::AddPlayer {
            team_id,
            first_name,
            last_name,
            jersey,
            position,
        } => {
            let position: Position = position.parse()?;
            let player =
                catalog.create_player(team_id, &first_name, &last_name, jersey, position)?;
            println!(
                "player {} created: #{} {} {}",
                player.id.unwrap_or_default(),
                player.jersey_number,
                player.first_name,
                player.last_name
            );
        }
        Command::AddPlay {
            name,
            play_type,
            formation,
            team_id,
        } => {
            let play_type: PlayType = play_type.parse()?;
            let play =
                catalog.create_play(&name, play_type, formation.as_deref(), team_id, None)?;
            println!("play {} created: {}", play.id.unwrap_or_default(), play.name);
        }
        Command::AddMatch {
            home_team_id,
            away_team_id,
            match_type,
            location,
        } => {
            let match_type: MatchType = match_type.parse()?;
            let m = catalog.create_match(NewMatch {
                home_team_id,
                away_team_id,
                match_date: Utc::now(),
                location,
                match_type,
            })?;
            println!("match {} created", m.id.unwrap_or_default());
        }
        Command::Record {
            match_id,
            team_id,
            kind,
            quarter,
            clock,
            player_id,
            assist_player_id,
            play_id,
            outcome,
            power_play,
            corrects,
        } => {
            let kind: ActionKind = kind.parse()?;
            let outcome = outcome
                .as_deref()
                .map(str::parse::<ActionOutcome>)
                .transpose()?;
            let mut new = NewAction::new(match_id, team_id, player_id, kind, quarter, clock);
            new.assist_player_id = assist_player_id;
            new.play_id = play_id;
            new.outcome = outcome;
            new.is_power_play = power_play;
            new.corrects_action_id = corrects;
            let id = log.record_action(new)?;
            println!("action {id} recorded");
        }
        Command::Finalize {
            match_id,
            home_score,
            away_score,
            overtime_quarters,
        } => {
            catalog.finalize_match(match_id, home_score, away_score, None, overtime_quarters)?;
            println!("match {match_id} finalized {home_score}-{away_score}");
        }
        Command::Aggregate { match_id } => {
            let agg = engine.aggregate_match(match_id)?;
            println!(
                "match {}: {} player stat rows, {} play usage rows",
                match_id,
                agg.player_stats.len(),
                agg.play_usage.len()
            );
            for w in &agg.warnings {
                println!("  warning: {w}");
            }
            for row in &agg.player_stats {
                println!(
                    "  player {}: {} goals / {} shots ({:.1}%), {} assists, {} steals",
                    row.player_id,
                    row.goals,
                    row.shots_attempted,
                    row.shot_percentage(),
                    row.assists,
                    row.steals
                );
            }
        }
        Command::Profile { team_id } => {
            let cancel = AtomicBool::new(false);
            match engine.refresh_opponent_profile(team_id, &cancel)? {
                Some(profile) => println!(
                    "profile for team {}: {:.2} goals/game for, {:.2} against over {} matches",
                    team_id,
                    profile.avg_goals_per_game.unwrap_or(0.0),
                    profile.avg_goals_allowed.unwrap_or(0.0),
                    profile.matches_analyzed
                ),
                None => println!("refresh cancelled"),
            }
        }
        Command::Averages { player_id, season } => {
            let avg = query.season_averages(player_id, season.as_deref())?;
            println!(
                "player {player_id}: {} games, {:.2} goals/game, {:.2} shots/game, {:.1}% shooting",
                avg.games_played, avg.avg_goals, avg.avg_shots, avg.shot_percentage
            );
        }
        Command::Rank {
            team_id,
            stat,
            min_games,
        } => {
            let stat: StatName = stat.parse()?;
            for (i, r) in query
                .rank_players_by_stat(team_id, stat, min_games)?
                .iter()
                .enumerate()
            {
                println!(
                    "{}. #{} {} {} — {:.2}/game over {} games",
                    i + 1,
                    r.player.jersey_number,
                    r.player.first_name,
                    r.player.last_name,
                    r.average,
                    r.games_played
                );
            }
        }
        Command::HeadToHead { team_a, team_b } => {
            let history = query.head_to_head(team_a, team_b)?;
            if history.is_empty() {
                println!("no matches between teams {team_a} and {team_b}");
            }
            for m in history {
                println!(
                    "{}  match {}: home {} {} - {} away {}",
                    m.match_date.format("%Y-%m-%d"),
                    m.id.unwrap_or_default(),
                    m.home_team_id,
                    m.home_score,
                    m.away_score,
                    m.away_team_id
                );
            }
        }
        Command::PlayStats { play_id, team_id } => {
            let eff = query.play_effectiveness(play_id, team_id)?;
            println!(
                "play {}: used {} times across {} matches, {:.1}% success",
                play_id, eff.total_uses, eff.matches_used, eff.success_rate
            );
        }
    }

    Ok(())
}
