use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use congestion_forecast::config::{AppConfig, EventSourceKind};
use congestion_forecast::{
    AccessEvent, CsvEventSource, Database, EventApiClient, EventSource, FileArtifactStore,
    ForecastService, RetrainSchedule, ServiceSettings, Severity, SystemClock, TimeRange,
};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

type Service = ForecastService<Source, FileArtifactStore, SystemClock>;

#[derive(Parser, Debug)]
#[command(name = "congestion-forecast")]
#[command(about = "Congestion forecasting from access events")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on events in an optional RFC 3339 time range
    Train {
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
    /// Train on the full event history
    TrainHistorical,
    /// Retrain on the trailing window of events
    WeeklyUpdate {
        #[arg(long)]
        range_days: Option<i64>,
    },
    /// Forecast a single weekday (0=Sunday) and hour
    Predict {
        #[arg(long)]
        weekday: u32,
        #[arg(long)]
        hour: u32,
    },
    /// Rank the configured candidate slots by forecast congestion
    Suggest {
        #[arg(long)]
        top: Option<usize>,
    },
    /// List slots at or above a severity threshold (low, medium, high)
    Alerts {
        #[arg(long)]
        threshold: Option<String>,
    },
    /// Forecast the next hours from now
    Upcoming {
        #[arg(long, default_value_t = 12)]
        hours: u32,
    },
    /// Export stored events from the database to CSV
    ExportEvents {
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Run the periodic retraining loop
    Daemon,
}

/// Event source selected by configuration.
///
/// The database connection is opened on first use so commands that only
/// read the stored bundle never touch PostgreSQL.
enum Source {
    Database {
        url: String,
        db: OnceCell<Database>,
    },
    Api(EventApiClient),
    Csv(CsvEventSource),
}

impl Source {
    fn from_config(config: &AppConfig) -> Result<Self> {
        match config.events.source {
            EventSourceKind::Database => {
                let url = config
                    .database
                    .url
                    .clone()
                    .context("DATABASE_URL must be set for the database event source")?;
                Ok(Self::Database {
                    url,
                    db: OnceCell::new(),
                })
            }
            EventSourceKind::Api => {
                let url = config
                    .events
                    .api_url
                    .clone()
                    .context("events.api_url must be set for the api event source")?;
                Ok(Self::Api(EventApiClient::new(url, &config.network)?))
            }
            EventSourceKind::Csv => {
                let path = config
                    .events
                    .csv_path
                    .clone()
                    .context("events.csv_path must be set for the csv event source")?;
                Ok(Self::Csv(CsvEventSource::new(path)))
            }
        }
    }

    async fn database(&self) -> Result<Option<&Database>> {
        match self {
            Self::Database { url, db } => {
                let db = db
                    .get_or_try_init(|| async {
                        tracing::info!("Connecting to database...");
                        let database = Database::new(url).await?;
                        tracing::info!("Database connected successfully");
                        Ok::<_, anyhow::Error>(database)
                    })
                    .await?;
                Ok(Some(db))
            }
            _ => Ok(None),
        }
    }
}

impl EventSource for Source {
    async fn fetch_events(&self, range: TimeRange) -> Result<Vec<AccessEvent>> {
        match self {
            Self::Database { .. } => {
                let db = self
                    .database()
                    .await?
                    .context("Database source without a connection")?;
                db.fetch_events(range).await
            }
            Self::Api(client) => client.fetch_events(range).await,
            Self::Csv(source) => source.fetch_events(range).await,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("congestion_forecast=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let store = FileArtifactStore::new(config.model.path.clone());
    let source = Source::from_config(&config)?;
    let service = ForecastService::with_settings(
        source,
        store,
        SystemClock,
        ServiceSettings::from(&config),
    );

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(run(args.command, &service, &config))
}

async fn run(command: Command, service: &Service, config: &AppConfig) -> Result<()> {
    match command {
        Command::Train { from, to } => print_json(&service.train(from, to).await?),
        Command::TrainHistorical => print_json(&service.train_historical().await?),
        Command::WeeklyUpdate { range_days } => {
            print_json(&service.weekly_update(range_days).await?)
        }
        Command::Predict { weekday, hour } => print_json(&service.predict(weekday, hour)?),
        Command::Suggest { top } => print_json(&service.suggestions(top)?),
        Command::Alerts { threshold } => {
            let threshold = threshold.as_deref().map(Severity::parse_or_low);
            let alerts = service.alerts(threshold)?;
            for alert in &alerts {
                tracing::info!("{}", alert.message());
            }
            print_json(&alerts)
        }
        Command::Upcoming { hours } => print_json(&service.upcoming(hours)?),
        Command::ExportEvents { output_dir } => {
            let db = service
                .source()
                .database()
                .await?
                .context("export-events requires the database event source")?;
            let path = db.export_to_csv(&output_dir, service.clock()).await?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Daemon => run_daemon(service, config).await,
    }
}

/// Run in daemon mode - retrain whenever the schedule says so
async fn run_daemon(service: &Service, config: &AppConfig) -> Result<()> {
    tracing::info!("Starting Congestion Forecast in daemon mode");

    let schedule = RetrainSchedule::new(&config.training)?;
    tracing::info!(
        "Schedule configured: retrain every {} days over the last {} days",
        schedule.interval().num_days(),
        schedule.window_days()
    );

    let check_secs = config.training.check_interval_secs.max(1);
    tracing::info!("Starting check loop with interval: {} seconds", check_secs);

    let mut interval = tokio::time::interval(Duration::from_secs(check_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let last_trained = match service.last_trained() {
            Ok(last) => last,
            Err(e) => {
                tracing::warn!("Failed to read stored bundle, retraining: {}", e);
                None
            }
        };

        if !schedule.is_due(last_trained, service.clock()) {
            tracing::debug!(
                "Next retrain due at {}",
                schedule.next_due(last_trained, service.clock())
            );
            continue;
        }

        match service.weekly_update(Some(schedule.window_days())).await {
            Ok(metadata) => {
                tracing::info!("Retrained on {} slots", metadata.n);
            }
            Err(e) => {
                tracing::error!("Scheduled retrain failed: {}", e);
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
