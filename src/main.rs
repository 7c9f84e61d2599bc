use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use bnb_alerts::config::Config;
use bnb_alerts::constants::DETECTION_MAX_RESULTS;
use bnb_alerts::logging::init_tracing;
use bnb_alerts::models::{
    room_id_from_url, ChannelPreferences, Frequency, NewWatch, UserContact, UserId, Watch,
    WatchId, WatchStatus,
};
use bnb_alerts::notification::NotificationGateway;
use bnb_alerts::providers::{ListingProvider, ProviderBackend, SearchQuery};
use bnb_alerts::services::{
    AvailabilityChecker, BookingDetector, ScanOutcome, ScanProcessor, Scheduler, WatchPatch,
    WatchService,
};
use bnb_alerts::storage::LocalStore;

#[derive(Parser, Debug)]
#[command(name = "bnb-alerts")]
#[command(version, about = "Airbnb availability alerts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler until Ctrl-C
    Run,
    /// Run a single scheduler iteration
    Tick,
    /// Scan one watch now and advance its schedule
    Scan { watch_id: String },
    /// Infer booked listings by comparing an undated and a dated search
    Detect {
        #[arg(long)]
        location: String,
        #[arg(long)]
        check_in: NaiveDate,
        #[arg(long)]
        check_out: NaiveDate,
        #[arg(long, default_value_t = 2)]
        adults: u32,
        #[arg(long, default_value_t = 0)]
        children: u32,
        #[arg(long, default_value_t = DETECTION_MAX_RESULTS)]
        max: usize,
    },
    /// Manage alert recipients
    #[command(subcommand)]
    User(UserCommand),
    /// Manage watches
    #[command(subcommand)]
    Watch(WatchCommand),
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Add or replace a user's contact details
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Disable email alerts
        #[arg(long)]
        no_email: bool,
        /// Enable SMS alerts
        #[arg(long)]
        sms: bool,
    },
}

#[derive(Subcommand, Debug)]
enum WatchCommand {
    Create {
        #[arg(long)]
        user: String,
        /// Listing URL, e.g. https://www.airbnb.com/rooms/12345
        #[arg(long)]
        url: String,
        /// Defaults to the id in the listing URL
        #[arg(long)]
        property_id: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        check_in: NaiveDate,
        #[arg(long)]
        check_out: NaiveDate,
        #[arg(long, default_value_t = 2)]
        guests: u32,
        #[arg(long, default_value = "")]
        price: String,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long, default_value = "daily", value_parser = parse_frequency)]
        frequency: Frequency,
        #[arg(long)]
        partial_match: bool,
    },
    List {
        #[arg(long)]
        user: String,
    },
    Update {
        #[arg(long)]
        user: String,
        id: String,
        #[arg(long, value_parser = parse_frequency)]
        frequency: Option<Frequency>,
        #[arg(long)]
        status: Option<WatchStatus>,
        #[arg(long)]
        partial_match: Option<bool>,
    },
    Delete {
        #[arg(long)]
        user: String,
        id: String,
    },
    /// Show the scan history of a watch
    Logs { id: String },
}

// Unlike stored records, unknown frequencies are rejected here.
fn parse_frequency(value: &str) -> Result<Frequency, String> {
    value.parse()
}

/// Shared collaborators of all commands
struct App {
    config: Config,
    store: Arc<LocalStore>,
    provider: Arc<ProviderBackend>,
}

impl App {
    async fn load(config: Config) -> Result<Self> {
        let store = LocalStore::open(&config.data_file)
            .await
            .with_context(|| format!("Failed to open data file {}", config.data_file.display()))?;
        let provider = ProviderBackend::from_config(&config.provider)?;
        if provider.is_mock() {
            warn!("Mock provider active: scans use generated listings, set APIFY_API_TOKEN for real data");
        }

        Ok(Self {
            config,
            store: Arc::new(store),
            provider: Arc::new(provider),
        })
    }

    fn scheduler(&self) -> Result<Arc<Scheduler>> {
        let provider: Arc<dyn ListingProvider> = self.provider.clone();
        let processor = ScanProcessor::new(
            AvailabilityChecker::new(provider),
            NotificationGateway::from_config(&self.config)?,
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.config.scheduler.notification_cooldown,
        );

        Ok(Arc::new(Scheduler::new(
            self.store.clone(),
            Arc::new(processor),
            self.config.scheduler.cadence,
            self.config.scheduler.check_interval,
        )))
    }

    fn watch_service(&self) -> WatchService {
        WatchService::new(
            self.store.clone(),
            self.config.scheduler.cadence,
            self.config.max_active_watches,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;
    init_tracing(config.log_json);

    let app = App::load(config).await?;

    match cli.command {
        Command::Run => {
            let scheduler = app.scheduler()?;
            scheduler.start();
            info!("Scheduler running, press Ctrl-C to stop");

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            info!("Shutting down, waiting for the current batch");
            scheduler.shutdown().await;
        }
        Command::Tick => {
            let report = app.scheduler()?.tick().await?;
            println!(
                "due: {}, completed: {}, failed: {}, expired: {}",
                report.due, report.completed, report.failed, report.expired
            );
        }
        Command::Scan { watch_id } => {
            let id = WatchId::from(watch_id);
            match app.scheduler()?.scan_now(&id).await? {
                Some(ScanOutcome::Completed { result, notified }) => {
                    println!("{id}: {result:?} (notified: {notified})")
                }
                Some(ScanOutcome::Failed { error }) => println!("{id}: scan failed: {error}"),
                None => bail!("Watch {id} not found, paused or expired"),
            }
        }
        Command::Detect {
            location,
            check_in,
            check_out,
            adults,
            children,
            max,
        } => {
            if check_out <= check_in {
                bail!("--check-out must be after --check-in");
            }
            let query = SearchQuery {
                location,
                adults,
                children,
                max_results: max,
                ..Default::default()
            };
            let report = BookingDetector::new(app.provider.clone())
                .detect(&query, check_in, check_out)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::User(UserCommand::Add {
            id,
            email,
            phone,
            no_email,
            sms,
        }) => {
            let user = UserContact {
                id: UserId::from(id),
                email,
                phone,
                preferences: ChannelPreferences {
                    email_enabled: !no_email,
                    sms_enabled: sms,
                },
            };
            println!("Saved user {}", user.id);
            app.store.upsert_user(user).await?;
        }
        Command::Watch(command) => run_watch_command(&app, command).await?,
    }

    Ok(())
}

async fn run_watch_command(app: &App, command: WatchCommand) -> Result<()> {
    let service = app.watch_service();
    let now = Utc::now();

    match command {
        WatchCommand::Create {
            user,
            url,
            property_id,
            name,
            location,
            check_in,
            check_out,
            guests,
            price,
            image_url,
            frequency,
            partial_match,
        } => {
            let new = NewWatch {
                property_id: property_id
                    .or_else(|| room_id_from_url(&url))
                    .unwrap_or_default(),
                property_name: name,
                property_url: url,
                location,
                image_url,
                check_in_date: check_in,
                check_out_date: check_out,
                guests,
                price,
                frequency,
                partial_match,
            };
            let watch = service.create(&UserId::from(user), new, now).await?;
            print_watch(&watch);
        }
        WatchCommand::List { user } => {
            let watches = service.list(&UserId::from(user)).await?;
            if watches.is_empty() {
                println!("No watches");
            }
            for watch in &watches {
                print_watch(watch);
            }
        }
        WatchCommand::Update {
            user,
            id,
            frequency,
            status,
            partial_match,
        } => {
            let patch = WatchPatch {
                frequency,
                status,
                partial_match,
            };
            let watch = service
                .update(&UserId::from(user), &WatchId::from(id), patch, now)
                .await?;
            print_watch(&watch);
        }
        WatchCommand::Delete { user, id } => {
            let id = WatchId::from(id);
            service.delete(&UserId::from(user), &id).await?;
            println!("Deleted watch {id}");
        }
        WatchCommand::Logs { id } => {
            let logs = app.store.scan_logs_for(&WatchId::from(id)).await?;
            if logs.is_empty() {
                println!("No scans recorded");
            }
            for log in logs {
                let outcome = match (log.result, &log.error_message) {
                    (Some(result), _) => format!("{result:?}"),
                    (None, Some(error)) => format!("error: {error}"),
                    (None, None) => format!("{:?}", log.status),
                };
                println!(
                    "{}  {:>6} ms  {}",
                    log.created_at.format("%Y-%m-%d %H:%M:%S"),
                    log.response_time_ms,
                    outcome
                );
            }
        }
    }

    Ok(())
}

fn print_watch(watch: &Watch) {
    println!("{} [{}] {}", watch.id, watch.status, watch.property_name);
    println!(
        "   {} | {} to {} | {} guests",
        watch.location, watch.check_in_date, watch.check_out_date, watch.guests
    );
    println!("   URL: {}", watch.property_url);
    println!(
        "   Frequency: {} | Next scan: {} | Last scan: {}",
        watch.frequency,
        watch
            .next_scan_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string()),
        watch
            .last_scanned_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string()),
    );
    if let Some(error) = &watch.error_message {
        println!("   Error: {}", error);
    }
    println!();
}
