use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kb_client::{ApiClient, ClientConfig, Dashboard};
use kb_core::{
    messages, ChatRequest, DocumentQuery, DocumentStatus, RetryPolicy, SearchRequest, SourceInput, SourceKind,
    SourceType,
};
use kb_transport::{Latency, TransportConfig, TransportKind, UnmatchedPolicy};
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

mod duration;
mod logging;
mod output;

use duration::HumanDuration;
use output::Output;

#[derive(Parser, Debug)]
#[command(name = "kb", author, version, about = "Knowledge-base dashboard in the terminal", long_about = None)]
pub struct Cli {
    /// Backend API base URL (default http://localhost:5001/api)
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Answer from built-in fixtures instead of the network
    #[arg(long, global = true)]
    mock: bool,
    /// Where the login session is kept (default ~/.kb/session.json)
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,
    /// Retry network failures and 5xx responses this many times
    #[arg(long, global = true, default_value_t = 0)]
    retries: u32,
    /// Print response data as JSON
    #[arg(long, global = true)]
    json: bool,
    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and log in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    Logout,
    /// Show the logged-in user
    Whoami,
    Documents {
        #[command(subcommand)]
        command: DocumentCommands,
    },
    /// Keyword search across the knowledge base
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        #[arg(long)]
        source_type: Option<SourceType>,
    },
    /// Ask the assistant a question
    Chat {
        message: String,
        /// Continue an earlier conversation
        #[arg(long)]
        conversation: Option<String>,
    },
    Sources {
        #[command(subcommand)]
        command: SourceCommands,
    },
    Analytics {
        #[command(subcommand)]
        command: AnalyticsCommands,
    },
    Scheduler {
        #[command(subcommand)]
        command: SchedulerCommands,
    },
    Upload {
        #[command(subcommand)]
        command: UploadCommands,
    },
    /// Overview, newest documents and scheduler state in one screen
    Dashboard {
        /// Refresh periodically (e.g. 30s, 5m, 1h15m)
        #[arg(long)]
        watch: Option<HumanDuration>,
        #[arg(long, default_value_t = kb_client::dashboard::DEFAULT_RECENT)]
        recent: usize,
    },
    /// Run the fixture backend over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1:5001")]
        bind: SocketAddr,
        #[arg(long)]
        latency: Option<Latency>,
        #[arg(long)]
        unmatched: Option<UnmatchedPolicy>,
    },
}

#[derive(Subcommand, Debug)]
enum DocumentCommands {
    List {
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        status: Option<DocumentStatus>,
        #[arg(long)]
        source_type: Option<SourceType>,
        #[arg(long)]
        source_id: Option<i64>,
        #[arg(long)]
        page: Option<usize>,
        #[arg(long)]
        page_size: Option<usize>,
    },
    Get { id: i64 },
    Delete { id: i64 },
    /// Queue a document for reprocessing
    Reprocess { id: i64 },
}

#[derive(Subcommand, Debug)]
enum SourceCommands {
    List,
    Add {
        name: String,
        url: String,
        #[arg(long, default_value = "rss")]
        kind: SourceKind,
        /// Fetch interval in minutes
        #[arg(long, default_value_t = 60)]
        interval: u32,
        #[arg(long)]
        category: Option<String>,
        /// Create the source switched off
        #[arg(long)]
        disabled: bool,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        kind: Option<SourceKind>,
        #[arg(long)]
        interval: Option<u32>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
    },
    Remove { id: i64 },
    Toggle { id: i64 },
    /// Check that the source is reachable
    Test { id: i64 },
    /// Crawl the source now
    Fetch { id: i64 },
}

#[derive(Subcommand, Debug)]
enum AnalyticsCommands {
    Overview,
    Trends {
        #[arg(long)]
        days: Option<u32>,
    },
    Keywords {
        #[arg(long)]
        limit: Option<usize>,
    },
    Clusters,
}

#[derive(Subcommand, Debug)]
enum SchedulerCommands {
    Status,
    Start,
    Stop,
    /// Run a job immediately
    Run { id: i64 },
}

#[derive(Subcommand, Debug)]
enum UploadCommands {
    File {
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
    },
    Url {
        url: String,
        #[arg(long)]
        title: Option<String>,
    },
}

impl Commands {
    /// Everything but these needs a stored session.
    fn is_public(&self) -> bool {
        matches!(
            self,
            Commands::Login { .. } | Commands::Register { .. } | Commands::Logout | Commands::Serve { .. }
        )
    }
}

fn client_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.base_url {
        config.transport.http.base_url = url.clone();
    }
    if cli.mock {
        config.transport.kind = TransportKind::Mock;
    }
    if let Some(path) = &cli.session_file {
        config.session_path = path.clone();
    }
    if cli.retries > 0 {
        config.retry = Some(RetryPolicy::with_retries(cli.retries));
    }
    Ok(config)
}

fn read_password(given: Option<String>) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    let password = line.trim_end_matches(&['\r', '\n'][..]).to_string();
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

async fn serve(bind: SocketAddr, latency: Option<Latency>, unmatched: Option<UnmatchedPolicy>) -> Result<()> {
    let mut mock = TransportConfig::from_env()?.mock;
    if let Some(latency) = latency {
        mock.latency = latency;
    }
    if let Some(unmatched) = unmatched {
        mock.unmatched = unmatched;
    }
    info!("🎭 Serving fixtures ({:?} latency, {:?} unmatched routes)", mock.latency, mock.unmatched);
    println!("🎭 Fixture backend on http://{}/api (Ctrl-C to stop)", bind);
    kb_web::serve(bind, kb_web::AppState::new(mock)).await?;
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let out = Output { json: cli.json };

    let config = client_config(&cli)?;
    debug!("Client config: {:?}", config);
    let client = ApiClient::from_config(&config)?.on_unauthorized(|| {
        eprintln!("💡 Your session has expired. Run `kb login` to sign in again.");
    });

    if !cli.command.is_public() && !client.session().is_logged_in() {
        bail!(messages::LOGIN_REQUIRED);
    }

    match cli.command {
        Commands::Login { email, password } => {
            let password = read_password(password)?;
            let auth = client.auth().login(&email, &password).await?;
            out.emit(&auth.data.user, output::user)?;
            out.message("✅ Logged in");
        }
        Commands::Register {
            username,
            email,
            password,
        } => {
            let password = read_password(password)?;
            let auth = client.auth().register(&username, &email, &password).await?;
            out.emit(&auth.data.user, output::user)?;
            out.message("✅ Account created, you are logged in");
        }
        Commands::Logout => {
            if let Err(e) = client.auth().logout().await {
                debug!("Logout call failed: {}", e);
            }
            out.message("👋 Logged out");
        }
        Commands::Whoami => {
            // Fixture sessions die with the process; in mock mode the stored user is the answer.
            if client.transport_name() == "mock" {
                match client.session().user() {
                    Some(user) => out.emit(&user, output::user)?,
                    None => bail!(messages::LOGIN_REQUIRED),
                }
            } else {
                let me = client.auth().me().await?;
                out.emit(&me.data, output::user)?;
            }
        }
        Commands::Documents { command } => documents(&client, out, command).await?,
        Commands::Search {
            query,
            top_k,
            source_type,
        } => {
            let request = SearchRequest {
                top_k,
                source_type,
                ..SearchRequest::new(query)
            };
            let result = client.search().search(&request).await?;
            out.emit(&result.data, output::search)?;
        }
        Commands::Chat { message, conversation } => {
            let request = ChatRequest {
                message,
                conversation_id: conversation,
                history: Vec::new(),
            };
            let reply = client.search().chat(&request).await?;
            out.emit(&reply.data, output::chat)?;
        }
        Commands::Sources { command } => sources(&client, out, command).await?,
        Commands::Analytics { command } => analytics(&client, out, command).await?,
        Commands::Scheduler { command } => scheduler(&client, out, command).await?,
        Commands::Upload { command } => {
            let uploaded = match command {
                UploadCommands::File { path, title } => client.upload().file(&path, title.as_deref()).await?,
                UploadCommands::Url { url, title } => client.upload().url(&url, title.as_deref()).await?,
            };
            out.emit(&uploaded.data, output::document)?;
        }
        Commands::Dashboard { watch, recent } => {
            let dashboard = Dashboard::new(client.clone()).with_recent(recent);
            match watch {
                None => {
                    let snapshot = dashboard.fetch().await?;
                    out.emit(&snapshot, output::snapshot)?;
                }
                Some(interval) => {
                    info!("Refreshing every {}", interval);
                    loop {
                        match dashboard.refresh().await {
                            Some(snapshot) => out.emit(&snapshot?, output::snapshot)?,
                            None => debug!("Skipped a stale dashboard refresh"),
                        }
                        tokio::select! {
                            _ = tokio::time::sleep(interval.0) => {}
                            _ = tokio::signal::ctrl_c() => break,
                        }
                    }
                }
            }
        }
        Commands::Serve {
            bind,
            latency,
            unmatched,
        } => serve(bind, latency, unmatched).await?,
    }
    Ok(())
}

async fn documents(client: &ApiClient, out: Output, command: DocumentCommands) -> Result<()> {
    match command {
        DocumentCommands::List {
            keyword,
            status,
            source_type,
            source_id,
            page,
            page_size,
        } => {
            let query = DocumentQuery {
                keyword,
                status,
                source_type,
                source_id,
                page,
                page_size,
            };
            let docs = client.documents().list(&query).await?;
            out.emit(docs.data.as_slice(), output::documents)?;
        }
        DocumentCommands::Get { id } => {
            let doc = client.documents().get(id).await?;
            out.emit(&doc.data, output::document)?;
        }
        DocumentCommands::Delete { id } => {
            client.documents().delete(id).await?;
            out.message(&format!("🗑️ Document #{} deleted", id));
        }
        DocumentCommands::Reprocess { id } => {
            let doc = client.documents().reprocess(id).await?;
            out.emit(&doc.data, output::document)?;
        }
    }
    Ok(())
}

async fn sources(client: &ApiClient, out: Output, command: SourceCommands) -> Result<()> {
    let api = client.collection();
    match command {
        SourceCommands::List => {
            let sources = api.list_sources().await?;
            out.emit(sources.data.as_slice(), output::sources)?;
        }
        SourceCommands::Add {
            name,
            url,
            kind,
            interval,
            category,
            disabled,
        } => {
            let input = SourceInput {
                name: Some(name),
                url: Some(url),
                kind: Some(kind),
                enabled: Some(!disabled),
                interval_minutes: Some(interval),
                category,
            };
            let source = api.create_source(&input).await?;
            out.emit(&source.data, output::source)?;
        }
        SourceCommands::Update {
            id,
            name,
            url,
            kind,
            interval,
            category,
            enabled,
        } => {
            let input = SourceInput {
                name,
                url,
                kind,
                enabled,
                interval_minutes: interval,
                category,
            };
            if input == SourceInput::default() {
                bail!("Nothing to update; pass at least one field");
            }
            let source = api.update_source(id, &input).await?;
            out.emit(&source.data, output::source)?;
        }
        SourceCommands::Remove { id } => {
            api.delete_source(id).await?;
            out.message(&format!("🗑️ Source #{} removed", id));
        }
        SourceCommands::Toggle { id } => {
            let source = api.toggle_source(id).await?;
            out.emit(&source.data, output::source)?;
        }
        SourceCommands::Test { id } => {
            let result = api.test_source(id).await?;
            out.emit(&result.data, output::source_test)?;
        }
        SourceCommands::Fetch { id } => {
            let result = api.fetch_source(id).await?;
            out.emit(&result.data, output::crawl)?;
        }
    }
    Ok(())
}

async fn analytics(client: &ApiClient, out: Output, command: AnalyticsCommands) -> Result<()> {
    let api = client.analytics();
    match command {
        AnalyticsCommands::Overview => out.emit(&api.overview().await?.data, output::overview)?,
        AnalyticsCommands::Trends { days } => out.emit(api.trends(days).await?.data.as_slice(), output::trends)?,
        AnalyticsCommands::Keywords { limit } => {
            out.emit(api.keywords(limit).await?.data.as_slice(), output::keywords)?
        }
        AnalyticsCommands::Clusters => out.emit(&api.clusters().await?.data, output::clusters)?,
    }
    Ok(())
}

async fn scheduler(client: &ApiClient, out: Output, command: SchedulerCommands) -> Result<()> {
    let api = client.scheduler();
    match command {
        SchedulerCommands::Status => out.emit(&api.status().await?.data, output::scheduler)?,
        SchedulerCommands::Start => out.emit(&api.start().await?.data, output::scheduler)?,
        SchedulerCommands::Stop => out.emit(&api.stop().await?.data, output::scheduler)?,
        SchedulerCommands::Run { id } => out.emit(&api.run_job(id).await?.data, output::crawl)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
