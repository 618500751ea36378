//! Command surface for the paragon match tracker.
//!
//! Front ends can embed the tracker through:
//! - [`run_cli`] for full parsed CLI execution.
//! - [`run_command`] for execution against an open [`Tracker`].
//! - [`Tracker`] directly for list/search/add/update/remove/analyze.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use paragon_tracker_core::{
    format_winrate, Analysis, MatchRecord, ParagonBreakdown, RatingSeries, RecordField,
    RecordFields, WinRateLine,
};

pub mod config;
pub mod tracker;

pub use config::TrackerConfig;
pub use tracker::{Tracker, TrackerError, UpdateOutcome};

#[derive(Debug, Parser)]
#[command(name = "pst")]
#[command(about = "Paragon match tracker")]
pub struct Cli {
    /// Database file; falls back to $PARAGON_TRACKER_DB, then the user data directory.
    #[arg(long)]
    db: Option<PathBuf>,

    /// JSON array of character names every paragon must belong to.
    #[arg(long)]
    roster_file: Option<PathBuf>,

    /// Restrict paragons to the built-in roster.
    #[arg(long)]
    known_roster: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    List(ListArgs),
    Search(SearchArgs),
    Add(RecordArgs),
    Update(UpdateArgs),
    Delete(DeleteArgs),
    Analyze(AnalyzeArgs),
    Roster(ListArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(long)]
    field: FieldArg,
    #[arg(long, default_value = "")]
    pattern: String,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    #[arg(long)]
    my_paragon: String,
    #[arg(long)]
    opp_paragon: String,
    #[arg(long, default_value = "OTP")]
    turn_order: String,
    #[arg(long, default_value = "WIN")]
    result: String,
    #[arg(long)]
    my_mmr: String,
    #[arg(long)]
    date: String,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[arg(long)]
    id: i64,
    #[command(flatten)]
    record: RecordArgs,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(long = "id", required = true)]
    ids: Vec<i64>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FieldArg {
    #[value(name = "my_paragon")]
    MyParagon,
    #[value(name = "opp_paragon")]
    OppParagon,
    #[value(name = "turn_order")]
    TurnOrder,
    #[value(name = "result")]
    Result,
    #[value(name = "my_mmr")]
    MyMmr,
    #[value(name = "date")]
    Date,
}

impl From<RecordArgs> for RecordFields {
    fn from(args: RecordArgs) -> Self {
        Self {
            my_paragon: args.my_paragon,
            opp_paragon: args.opp_paragon,
            turn_order: args.turn_order,
            result: args.result,
            my_mmr: args.my_mmr,
            date: args.date,
        }
    }
}

/// Executes the parsed top-level CLI command.
///
/// # Errors
/// Returns an error when configuration, storage, or the command fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    let roster = config::resolve_roster(cli.roster_file.as_deref(), cli.known_roster)?;
    let db_path = config::resolve_db_path(cli.db);
    tracing::debug!(
        db = %db_path.display(),
        roster_enforced = roster.is_enforced(),
        "opening tracker"
    );

    let mut tracker = Tracker::open(TrackerConfig::new(db_path).with_roster(roster))?;
    run_command(cli.command, &mut tracker)
}

/// Executes one command against an open tracker.
///
/// # Errors
/// Returns an error when the input is rejected or storage fails.
pub fn run_command(command: Command, tracker: &mut Tracker) -> Result<()> {
    match command {
        Command::List(args) => {
            let records = tracker.list_all()?;
            print_records(&records, args.json)
        }
        Command::Search(args) => {
            let records = tracker.search(map_field(args.field), &args.pattern)?;
            print_records(&records, args.json)
        }
        Command::Add(args) => {
            let id = tracker.add(&RecordFields::from(args))?;
            let Some(record) = tracker.store().get_by_id(id)? else {
                return Err(anyhow!("record {id} vanished after insert"));
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::Update(args) => {
            let id = args.id;
            let outcome = tracker.update(id, &RecordFields::from(args.record))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "id": id,
                    "outcome": outcome,
                }))?
            );
            Ok(())
        }
        Command::Delete(args) => {
            let removed = tracker.remove(&args.ids)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "requested": args.ids,
                    "removed": removed,
                }))?
            );
            Ok(())
        }
        Command::Analyze(args) => {
            let analysis = tracker.analyze()?;
            if args.json {
                let payload = build_analysis_json_payload(&analysis);
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_analysis(&analysis);
            }
            Ok(())
        }
        Command::Roster(args) => {
            let names = tracker.roster().names().collect::<Vec<_>>();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else if names.is_empty() {
                println!("no roster configured: any alphabetic name is accepted");
            } else {
                for name in names {
                    println!("{name}");
                }
            }
            Ok(())
        }
    }
}

fn map_field(value: FieldArg) -> RecordField {
    match value {
        FieldArg::MyParagon => RecordField::MyParagon,
        FieldArg::OppParagon => RecordField::OppParagon,
        FieldArg::TurnOrder => RecordField::TurnOrder,
        FieldArg::Result => RecordField::Result,
        FieldArg::MyMmr => RecordField::MyMmr,
        FieldArg::Date => RecordField::Date,
    }
}

fn print_records(records: &[MatchRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    println!(
        "{:<6} {:<12} {:<14} {:<10} {:<6} {:<7} date",
        "id", "my_paragon", "opp_paragon", "turn_order", "result", "my_mmr"
    );
    println!("{}", "-".repeat(70));
    for record in records {
        println!(
            "{:<6} {:<12} {:<14} {:<10} {:<6} {:<7} {}",
            record.id,
            record.my_paragon,
            record.opp_paragon,
            record.turn_order.as_str(),
            record.result.as_str(),
            record
                .my_mmr
                .map_or_else(|| "?".to_string(), |value| value.to_string()),
            record.date
        );
    }
    Ok(())
}

fn print_analysis(analysis: &Analysis) {
    if analysis.breakdowns.is_empty() {
        println!("No data available for analysis");
        return;
    }

    for breakdown in &analysis.breakdowns {
        print_breakdown(breakdown);
        println!();
    }
    print_rating_series(&analysis.rating_series);
}

fn print_breakdown(breakdown: &ParagonBreakdown) {
    println!("{} Analysis", breakdown.paragon);
    println!(
        "{:<14} {:>7} {:>8} {:>7} {:>7} {:>8} {:>7} {:>7} {:>8}",
        "opp_paragon", "total", "winrate", "otp", "otp_won", "otp_wr", "otd", "otd_won", "otd_wr"
    );
    println!("{}", "-".repeat(86));
    print_winrate_line(&breakdown.overall);
    for line in &breakdown.matchups {
        print_winrate_line(line);
    }
}

fn print_winrate_line(line: &WinRateLine) {
    println!(
        "{:<14} {:>7} {:>8} {:>7} {:>7} {:>8} {:>7} {:>7} {:>8}",
        line.opponent,
        line.total_matches,
        format_winrate(line.total_winrate),
        line.otp_matches,
        line.otp_wins,
        format_winrate(line.otp_winrate),
        line.otd_matches,
        line.otd_wins,
        format_winrate(line.otd_winrate)
    );
}

fn print_rating_series(series: &RatingSeries) {
    println!("MMR Changes");
    if series.is_empty() {
        println!("No valid MMR data");
        return;
    }

    let labels = series.tick_labels();
    for (index, point) in series.points.iter().enumerate() {
        let label = labels
            .iter()
            .find(|(tick, _)| *tick == index)
            .map_or("", |(_, date)| *date);
        println!("{index:>4} {label:<10} {:>6}", point.rating);
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct AnalysisJsonPayload {
    contract_version: String,
    breakdowns: Vec<ParagonBreakdown>,
    rating_series: RatingSeriesJson,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RatingSeriesJson {
    dates: Vec<String>,
    ratings: Vec<u32>,
    tick_indices: Vec<usize>,
}

fn build_analysis_json_payload(analysis: &Analysis) -> AnalysisJsonPayload {
    let series = &analysis.rating_series;
    AnalysisJsonPayload {
        contract_version: "analysis.v1".to_string(),
        breakdowns: analysis.breakdowns.clone(),
        rating_series: RatingSeriesJson {
            dates: series.dates().map(str::to_string).collect(),
            ratings: series.ratings().collect(),
            tick_indices: series.tick_indices(),
        },
    }
}
