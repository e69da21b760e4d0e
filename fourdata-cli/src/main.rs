use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fourdata_cli::auth::{authorize_url, transition, AuthEvent, AuthState, JwtSessionExchange, Provider};
use fourdata_cli::config::AppConfig;
use fourdata_cli::display::{
    display_chips, display_draw_details, display_import_summary, display_lucky, display_next_draw,
    display_number_details, display_page, display_recent_searches, display_status, display_summaries,
};
use fourdata_cli::explore::{number_details, RecentSearches};
use fourdata_cli::identity::{AuthStateStore, IdentityProvider};
use fourdata_cli::import;
use fourdata_cli::listing::{home_preview, view_all};
use fourdata_cli::lucky::DailyValueGenerator;
use fourdata_cli::profile::ensure_profile;
use fourdata_cli::schedule::next_draw;
use fourdata_cli::subscription::{check_subscription, subscribe, LocalPurchases, PurchaseProvider, SubscribeOutcome};
use fourdata_db::db::{count_results, fetch_draw_details, fetch_recent_summaries, get_profile, migrate, open_db};
use fourdata_db::models::{ProbabilityFilter, ProbabilitySource};
use fourdata_db::rusqlite::Connection;
use fourdata_db::store::SqliteSecureStore;

#[derive(Parser)]
#[command(name = "fourdata", about = "4D results, probabilities and daily lucky numbers")]
struct Cli {
    /// Configuration file (defaults to ./fourdata.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import draw results from a CSV file
    ImportResults {
        #[arg(short, long, default_value = "assets/results.csv")]
        file: PathBuf,
    },

    /// Import next-draw probabilities from a CSV file
    ImportProbs {
        #[arg(short, long, default_value = "assets/probabilities.csv")]
        file: PathBuf,

        #[arg(short, long, default_value = "default")]
        source: ProbabilitySource,
    },

    /// Import the draw calendar from a CSV file
    ImportDates {
        #[arg(short, long, default_value = "assets/draw_dates.csv")]
        file: PathBuf,
    },

    /// Show the database path
    DbPath,

    /// Lucky number, next draw and a sample of strong numbers
    Home {
        #[arg(short, long)]
        source: Option<ProbabilitySource>,
    },

    /// Today's lucky number
    Lucky {
        /// Resolve for this user id instead of the signed-in one
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Top prizes of the latest draws
    Results {
        #[arg(short, long, default_value = "30")]
        last: u32,
    },

    /// All prizes of one draw
    Draw {
        /// YYYY-MM-DD or DD/MM/YYYY
        date: String,
    },

    /// Probability and history of one number
    Number {
        number: String,

        #[arg(short, long)]
        source: Option<ProbabilitySource>,
    },

    /// Recent number searches
    Searches {
        #[command(subcommand)]
        action: Option<SearchAction>,
    },

    /// Every number ranked by probability (premium)
    List {
        /// all, top (90%+), or a decile start: 50, 60, 70, 80
        #[arg(short, long)]
        filter: Option<String>,

        #[arg(short, long, default_value = "1")]
        page: u32,

        #[arg(short, long)]
        source: Option<ProbabilitySource>,
    },

    /// Start sign-in with an OAuth provider
    Login {
        #[arg(short, long, default_value = "google")]
        provider: Provider,
    },

    /// Finish sign-in with the redirect URL received from the provider
    Callback { uri: String },

    /// Sign out
    Logout,

    /// Signed-in user and plan
    Status,

    /// Buy a subscription package
    Subscribe {
        #[arg(short, long, default_value = "monthly")]
        package: String,
    },

    /// Restore purchases for the signed-in user
    Restore,
}

#[derive(Subcommand)]
enum SearchAction {
    /// Forget one entry by position
    Remove { index: usize },
    /// Forget all entries
    Clear,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref())?;
    let path = config.database_path();
    let conn = open_db(&path)?;
    migrate(&conn)?;

    let store = SqliteSecureStore::new(&conn);
    let auth = AuthStateStore::new(&store);
    let mut purchases = LocalPurchases::new(&store, &config.subscription.entitlement);
    let source_or = |s: Option<ProbabilitySource>| s.unwrap_or(config.listing.default_source);

    match cli.command {
        Command::ImportResults { file } => {
            display_import_summary(&import::import_results(&conn, &file)?);
            Ok(())
        }
        Command::ImportProbs { file, source } => {
            display_import_summary(&import::import_probabilities(&conn, &file, source)?);
            Ok(())
        }
        Command::ImportDates { file } => {
            display_import_summary(&import::import_draw_dates(&conn, &file)?);
            Ok(())
        }
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::Home { source } => cmd_home(&conn, &config, &store, &auth, source_or(source)),
        Command::Lucky { user } => cmd_lucky(&store, &auth, user.as_deref()),
        Command::Results { last } => cmd_results(&conn, last),
        Command::Draw { date } => cmd_draw(&conn, &date),
        Command::Number { number, source } => cmd_number(&conn, &store, source_or(source), &number),
        Command::Searches { action } => cmd_searches(&store, action),
        Command::List { filter, page, source } => {
            let filter = match filter {
                Some(raw) => ProbabilityFilter::parse(&raw)?,
                None => config.listing.default_filter,
            };
            cmd_list(&conn, &config, &auth, &mut purchases, source_or(source), filter, page)
        }
        Command::Login { provider } => cmd_login(&config, &auth, provider),
        Command::Callback { uri } => cmd_callback(&conn, &auth, &mut purchases, &uri),
        Command::Logout => {
            auth.save(&transition(auth.load(), AuthEvent::SignOut))?;
            println!("Signed out.");
            Ok(())
        }
        Command::Status => {
            let state = auth.load();
            let profile = match state.session() {
                Some(session) => get_profile(&conn, &session.user_id)?,
                None => None,
            };
            let premium = check_subscription(&auth, &mut purchases, &config.subscription.entitlement);
            display_status(&state, profile.as_ref(), premium);
            Ok(())
        }
        Command::Subscribe { package } => cmd_subscribe(&config, &auth, &mut purchases, &package),
        Command::Restore => {
            let user_id = require_user(&auth)?;
            purchases.log_in(&user_id)?;
            let info = purchases.restore()?;
            if info.is_active(&config.subscription.entitlement) {
                println!("Purchases restored: premium is active.");
            } else {
                println!("No active subscription found.");
            }
            Ok(())
        }
    }
}

fn require_user(identity: &impl IdentityProvider) -> Result<String> {
    match identity.current_user_id() {
        Some(user_id) => Ok(user_id),
        None => bail!("Not signed in. Run: fourdata login"),
    }
}

fn cmd_home(
    conn: &Connection,
    config: &AppConfig,
    store: &SqliteSecureStore<'_>,
    auth: &AuthStateStore<&SqliteSecureStore<'_>>,
    source: ProbabilitySource,
) -> Result<()> {
    if config.lucky.enabled {
        let value = DailyValueGenerator::new(store).resolve_today(auth);
        display_lucky(&value);
    }

    let now = Local::now().naive_local();
    display_next_draw(next_draw(conn, now, config.schedule.cutoff_hour)?);

    let chips = home_preview(conn, source, config.listing.home_limit, &mut rand::rng())?;
    display_chips(&chips);
    Ok(())
}

fn cmd_lucky(
    store: &SqliteSecureStore<'_>,
    auth: &AuthStateStore<&SqliteSecureStore<'_>>,
    user: Option<&str>,
) -> Result<()> {
    let mut generator = DailyValueGenerator::new(store);
    let value = match user {
        Some(user) => generator.resolve(Some(user), Local::now().date_naive()),
        None => generator.resolve_today(auth),
    };
    display_lucky(&value);
    Ok(())
}

fn cmd_results(conn: &Connection, last: u32) -> Result<()> {
    if count_results(conn)? == 0 {
        println!("Empty database. Run first: fourdata import-results");
        return Ok(());
    }
    display_summaries(&fetch_recent_summaries(conn, last)?);
    Ok(())
}

fn cmd_draw(conn: &Connection, raw_date: &str) -> Result<()> {
    let date = import::parse_date(raw_date)?.format("%Y-%m-%d").to_string();
    match fetch_draw_details(conn, &date)? {
        Some(details) => display_draw_details(&details),
        None => println!("No results for {}.", date),
    }
    Ok(())
}

fn cmd_number(
    conn: &Connection,
    store: &SqliteSecureStore<'_>,
    source: ProbabilitySource,
    number: &str,
) -> Result<()> {
    let details = number_details(conn, source, number)?;
    display_number_details(&details);
    RecentSearches::new(store).record(number)?;
    Ok(())
}

fn cmd_searches(store: &SqliteSecureStore<'_>, action: Option<SearchAction>) -> Result<()> {
    let recent = RecentSearches::new(store);
    match action {
        None => display_recent_searches(&recent.load()),
        Some(SearchAction::Remove { index }) => display_recent_searches(&recent.remove(index)?),
        Some(SearchAction::Clear) => {
            recent.clear()?;
            println!("Recent searches cleared.");
        }
    }
    Ok(())
}

fn cmd_list(
    conn: &Connection,
    config: &AppConfig,
    auth: &AuthStateStore<&SqliteSecureStore<'_>>,
    purchases: &mut LocalPurchases<&SqliteSecureStore<'_>>,
    source: ProbabilitySource,
    filter: ProbabilityFilter,
    page: u32,
) -> Result<()> {
    if !check_subscription(auth, purchases, &config.subscription.entitlement) {
        println!("The full ranking is a premium feature. Run: fourdata subscribe");
        return Ok(());
    }
    let page = view_all(conn, source, filter, page, config.listing.per_page)?;
    display_page(&page, &filter.to_string());
    Ok(())
}

fn cmd_login(config: &AppConfig, auth: &AuthStateStore<&SqliteSecureStore<'_>>, provider: Provider) -> Result<()> {
    let redirect_uri = config.auth.redirect_uri.clone();
    let url = authorize_url(&config.auth.base_url, provider, &redirect_uri)?;
    let state = transition(
        auth.load(),
        AuthEvent::Start {
            provider,
            redirect_uri,
        },
    );
    if let AuthState::Failed { error } = &state {
        bail!("{}", error);
    }
    auth.save(&state)?;

    println!("Open this URL to sign in with {}:\n\n  {}\n", provider, url);
    println!("Then run: fourdata callback '<redirect URL>'");
    Ok(())
}

fn cmd_callback(
    conn: &Connection,
    auth: &AuthStateStore<&SqliteSecureStore<'_>>,
    purchases: &mut LocalPurchases<&SqliteSecureStore<'_>>,
    uri: &str,
) -> Result<()> {
    let state = auth.finish_sign_in(uri, &JwtSessionExchange)?;

    match state {
        AuthState::Authenticated { session } => {
            let profile = ensure_profile(conn, &session, &mut rand::rng())?;
            purchases.log_in(&session.user_id)?;
            println!("Signed in as {}.", profile.username);
            Ok(())
        }
        AuthState::Failed { error } => bail!("Sign-in failed: {}", error),
        other => bail!("Sign-in incomplete ({})", other.name()),
    }
}

fn cmd_subscribe(
    config: &AppConfig,
    auth: &AuthStateStore<&SqliteSecureStore<'_>>,
    purchases: &mut LocalPurchases<&SqliteSecureStore<'_>>,
    package: &str,
) -> Result<()> {
    let user_id = require_user(auth)?;
    purchases.log_in(&user_id)?;
    match subscribe(purchases, package, &config.subscription.entitlement)? {
        SubscribeOutcome::Activated => println!("Premium unlocked."),
        SubscribeOutcome::Pending => println!("Purchase received; premium will activate shortly."),
        SubscribeOutcome::Cancelled => println!("Purchase cancelled."),
    }
    Ok(())
}
