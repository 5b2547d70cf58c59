mod commands;
mod config;
mod server;
mod sheets;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    LogArgs, SettingsUpdate, cmd_dashboard, cmd_history, cmd_log, cmd_settings_set,
    cmd_settings_show, cmd_show, cmd_trends,
};
use crate::config::{BackendKind, Config};
use trimline_core::models::Sex;
use trimline_core::service::TrackerService;
use trimline_core::store::RecordStore;

#[derive(Parser)]
#[command(
    name = "trimline",
    version,
    about = "Track daily calories, steps and weight against a target",
    long_about = "Track daily calories, steps and weight against a target.\n\n\
        Entries live in a spreadsheet-style store: local CSV files by default, \
        or a Google Sheets document configured in config.json."
)]
struct Cli {
    /// Table backend (default: from config.json, else csv)
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendKind>,
    /// Age in years used for the BMR estimate (overrides config)
    #[arg(long, global = true)]
    age: Option<f64>,
    /// Sex used for the BMR estimate: male or female (overrides config)
    #[arg(long, global = true)]
    sex: Option<Sex>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log calories, steps and weight for a day (replaces that day's entry)
    Log {
        /// Calories eaten
        calories: u32,
        /// Body weight
        #[arg(short, long)]
        weight: f64,
        /// Unit for --weight: kg or lbs
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Steps walked
        #[arg(short, long, default_value = "0")]
        steps: u32,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the entry for a day (default: today)
    Show {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the most recent entries
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "5")]
        days: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Average intake, BMR and progress toward the target weight
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Weight, step and calorie trends
    Trends {
        /// Also write the trends table to the store
        #[arg(long)]
        publish: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change profile settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show height, start weight, target weight and target date
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change one or more settings
    Set {
        /// Height in cm
        #[arg(long)]
        height: Option<f64>,
        /// Start weight
        #[arg(long)]
        weight: Option<f64>,
        /// Target weight
        #[arg(long)]
        target_weight: Option<f64>,
        /// Target date (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        target_date: Option<String>,
        /// Unit for the weights: kg or lbs
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(serving: bool) {
    let default = if serving { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Serve { .. }));

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let store = RecordStore::open(config.open_backend(cli.backend)?)?;
    let svc = TrackerService::new(store, config.profile(cli.age, cli.sex));

    match cli.command {
        Commands::Log {
            calories,
            weight,
            unit,
            steps,
            date,
            notes,
            json,
        } => cmd_log(
            &svc,
            LogArgs {
                calories,
                weight,
                unit,
                steps,
                date,
                notes,
            },
            json,
        ),
        Commands::Show { date, json } => cmd_show(&svc, date, json),
        Commands::History { days, json } => cmd_history(&svc, days, json),
        Commands::Dashboard { json } => cmd_dashboard(&svc, json),
        Commands::Trends { publish, json } => cmd_trends(&svc, publish, json),
        Commands::Settings { command } => match command {
            SettingsCommands::Show { json } => cmd_settings_show(&svc, json),
            SettingsCommands::Set {
                height,
                weight,
                target_weight,
                target_date,
                unit,
                json,
            } => cmd_settings_set(
                &svc,
                SettingsUpdate {
                    height,
                    weight,
                    target_weight,
                    target_date,
                    unit,
                },
                json,
            ),
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let (api_key, new_api_key) = if no_auth {
                (None, false)
            } else {
                let (key, new) = config.load_or_create_api_key()?;
                (Some(key), new)
            };
            // Store calls block, so the runtime only exists for `serve`.
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(server::start_server(svc, port, &bind, api_key, new_api_key))
        }
    }
}
