use std::fmt;
use std::sync::Arc;

use beacon_core::scroll::ScrollPosition;
use serde_json::json;
use services::config::{self, TelemetryConfig};
use services::dashboard::{format_count, format_duration, format_growth, format_percentage};
use services::{
    Clock, DashboardService, DashboardState, LifecycleBinder, LifecycleSignal, PageVisitTracker,
    StaticEnvironment, Visibility,
};
use transport::Backend;

const DEMO_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEMO_ORIGIN: &str = "https://agro.example";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    Config(services::ConfigError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<services::ConfigError> for ArgsError {
    fn from(err: services::ConfigError) -> Self {
        Self::Config(err)
    }
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- demo      [--api-url <url>] [--in-memory]");
    eprintln!("  cargo run -p app -- dashboard [--api-url <url>] [--limit <n>] [--days <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --api-url {}", config::DEFAULT_API_URL);
    eprintln!("  --limit {}", config::DEFAULT_DASHBOARD_LIMIT);
    eprintln!("  --days {}", config::DEFAULT_TREND_DAYS);
    eprintln!();
    eprintln!("Environment:");
    eprintln!(
        "  {}, {}, {}, RUST_LOG",
        config::API_URL_VAR,
        config::DASHBOARD_LIMIT_VAR,
        config::TREND_DAYS_VAR
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Demo,
    Dashboard,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "demo" => Some(Self::Demo),
            "dashboard" => Some(Self::Dashboard),
            _ => None,
        }
    }
}

struct Args {
    config: TelemetryConfig,
    in_memory: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut config = TelemetryConfig::from_env()?;
        let mut in_memory = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api-url" => {
                    let value = require_value(args, "--api-url")?;
                    config.api_base_url = config::normalize_base_url(&value)?;
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    config.dashboard_limit = config::parse_positive("--limit", &value)?;
                }
                "--days" => {
                    let value = require_value(args, "--days")?;
                    config.trend_days = config::parse_positive("--days", &value)?;
                }
                "--in-memory" => in_memory = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { config, in_memory })
    }
}

fn page(path: &str) -> String {
    format!("{DEMO_ORIGIN}{path}")
}

/// Scroll geometry for a whole-number percentage of a 3000px page.
fn scrolled_to(percent: u32) -> ScrollPosition {
    ScrollPosition::new(f64::from(percent) * 22.0, 3_000.0, 800.0)
}

/// Drive one simulated page load through the tracker, awaiting every send.
async fn simulate_visit(backend: &Backend, clock: &Clock) {
    let env = Arc::new(
        StaticEnvironment::new(
            DEMO_USER_AGENT,
            format!("{}?utm_source=demo&utm_medium=cli", page("/")),
        )
        .with_title("AgroConnect"),
    );
    let tracker = PageVisitTracker::new(clock.clone(), env.clone(), Arc::clone(&backend.sink));
    let mut binder = LifecycleBinder::new(tracker);

    if let Some(delivery) = binder.init() {
        delivery.settled().await;
    }
    for percent in [10, 25, 50] {
        if let Some(delivery) = binder.handle(LifecycleSignal::Scroll(scrolled_to(percent))) {
            delivery.settled().await;
        }
    }

    env.navigate(page("/products"), "Products");
    binder
        .tracker_mut()
        .record_visit(&page("/products"), "Products", "products", None)
        .settled()
        .await;
    binder
        .tracker()
        .track_button_click("request-quote", "product-card")
        .settled()
        .await;

    env.navigate(page("/contact"), "Contact");
    binder
        .tracker_mut()
        .record_visit(&page("/contact"), "Contact", "contact", None)
        .settled()
        .await;
    binder
        .tracker()
        .track_form_submission("contact", json!({ "farmType": "dairy" }))
        .settled()
        .await;

    for signal in [
        LifecycleSignal::VisibilityChange(Visibility::Hidden),
        LifecycleSignal::VisibilityChange(Visibility::Visible),
        LifecycleSignal::Unload,
    ] {
        if let Some(delivery) = binder.handle(signal) {
            delivery.settled().await;
        }
    }

    log::info!("demo session {} finished", binder.tracker().session_id());
    binder.dispose();
}

fn print_dashboard(state: &DashboardState) {
    let view = match state {
        DashboardState::Ready(view) => view,
        DashboardState::Failed { message } => {
            println!("{message} (retry by running the command again)");
            return;
        }
        DashboardState::Loading => {
            println!("loading...");
            return;
        }
    };

    let summary = &view.summary;
    let performance = &summary.performance_metrics;
    println!("Total visits      {}", format_count(summary.total_visits));
    println!("Unique sessions   {}", format_count(summary.unique_sessions));
    println!("Contacts          {}", format_count(summary.total_contacts));
    println!("Avg time on page  {}", format_duration(summary.avg_time_on_page));
    println!(
        "Conversion rate   {}",
        format_percentage(summary.contact_conversion_rate)
    );
    println!("Today             {}", format_count(summary.today_visits));
    println!(
        "Growth            visits {}, contacts {}",
        format_growth(performance.visit_growth_rate),
        format_growth(performance.contact_growth_rate)
    );

    println!();
    println!("Most visited pages:");
    for entry in &view.top_pages {
        println!("  {:>6}  {}", format_count(entry.visit_count), entry.page_url);
    }

    println!();
    println!("Daily trend (visits / contacts):");
    for point in &view.trend {
        println!("  {}  {} / {}", point.date, point.visits, point.contacts);
    }

    for (title, distribution) in [
        ("Devices", &summary.device_distribution),
        ("Browsers", &summary.browser_distribution),
        ("Page categories", &summary.page_category_distribution),
    ] {
        println!();
        println!("{title}:");
        for (label, count) in distribution {
            println!("  {label:<12} {}", format_count(*count));
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Demo,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Demo,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let clock = Clock::default_clock();
    let backend = if parsed.in_memory {
        let (backend, _log) = Backend::in_memory(clock.clone());
        backend
    } else {
        log::info!("using analytics API at {}", parsed.config.api_base_url);
        Backend::http(&parsed.config.api_base_url)
    };
    let dashboard = DashboardService::from_config(Arc::clone(&backend.source), &parsed.config);

    match cmd {
        Command::Demo => {
            simulate_visit(&backend, &clock).await;
            if parsed.in_memory {
                print_dashboard(&dashboard.load().await);
            }
            Ok(())
        }
        Command::Dashboard => {
            print_dashboard(&dashboard.load().await);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
