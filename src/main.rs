//! webagent CLI - search and captcha solving with provider fallback.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use webagent::{
    quota::FileQuotaStore, AttemptRecord, CaptchaRequest, CaptchaSolver, Capability, Credentials,
    DispatchError, DispatcherBuilder, ProviderDispatcher, SearchClient,
};

/// webagent - search and captcha solving across interchangeable providers
#[derive(Parser)]
#[command(name = "webagent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Persist daily quota counters in this JSON file
    #[arg(long, global = true, env = "WEBAGENT_QUOTA_FILE")]
    quota_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the web with the best available provider
    Search(SearchArgs),

    /// Solve a captcha with the best available vendor
    #[command(subcommand)]
    Captcha(CaptchaCommand),

    /// List registered providers and their availability
    Providers,
}

#[derive(Args)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Number of results to request
    #[arg(short, long, default_value = "10")]
    num: u32,

    /// Use only this provider: serpapi, google_cs, bing, duckduckgo
    #[arg(short, long)]
    provider: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum CaptchaCommand {
    /// Solve a text image captcha
    Image(ImageArgs),

    /// Solve a reCAPTCHA (v2 by default)
    Recaptcha(RecaptchaArgs),

    /// Solve an hCaptcha
    Hcaptcha(SiteArgs),
}

#[derive(Args)]
struct ImageArgs {
    /// Image file to upload
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    file: Option<PathBuf>,

    /// Image URL (http(s) or data:)
    #[arg(long)]
    url: Option<String>,

    /// Use only this vendor: 2captcha, anticaptcha
    #[arg(short, long)]
    provider: Option<String>,
}

#[derive(Args)]
struct SiteArgs {
    /// Site key from the page
    #[arg(long)]
    sitekey: String,

    /// URL of the page showing the captcha
    #[arg(long)]
    page_url: String,

    /// Use only this vendor: 2captcha, anticaptcha
    #[arg(short, long)]
    provider: Option<String>,
}

#[derive(Args)]
struct RecaptchaArgs {
    #[command(flatten)]
    site: SiteArgs,

    /// Solve reCAPTCHA v3 instead of v2
    #[arg(long)]
    v3: bool,

    /// v3 page action
    #[arg(long, default_value = "verify")]
    action: String,

    /// v3 minimum score
    #[arg(long, default_value = "0.3")]
    min_score: f32,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let dispatcher = Arc::new(build_dispatcher(cli.quota_file.as_ref())?);

    let outcome = match cli.command {
        Commands::Search(args) => run_search(dispatcher, args).await,
        Commands::Captcha(command) => run_captcha(dispatcher, command).await,
        Commands::Providers => {
            list_providers(&dispatcher);
            Ok(())
        }
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => match e.downcast_ref::<DispatchError>() {
            Some(DispatchError::Exhausted(attempts)) => {
                print_exhausted(attempts);
                Ok(ExitCode::FAILURE)
            }
            _ => Err(e),
        },
    }
}

fn build_dispatcher(quota_file: Option<&PathBuf>) -> Result<ProviderDispatcher> {
    let mut builder = DispatcherBuilder::new(Credentials::from_env());
    if let Some(path) = quota_file {
        let store = FileQuotaStore::open(path)
            .with_context(|| format!("Failed to open quota file {}", path.display()))?;
        builder = builder.with_quota_store(Arc::new(store));
    }
    Ok(builder.build()?)
}

fn list_providers(dispatcher: &ProviderDispatcher) {
    println!("Registered providers (in fallback order):\n");
    for capability in Capability::ALL {
        println!("  {}:", capability);
        for adapter in dispatcher.adapters(capability) {
            let status = if adapter.is_available() {
                "available"
            } else {
                "unavailable"
            };
            println!(
                "    {:<12} priority {:>3}  {}",
                adapter.name(),
                adapter.priority(),
                status
            );
        }
        println!();
    }
    println!("Credentials: SERPAPI_KEY, GOOGLE_CS_API_KEY + GOOGLE_CS_CX, BING_API_KEY,");
    println!("             TWOCAPTCHA_KEY, ANTICAPTCHA_KEY");
}

async fn run_search(dispatcher: Arc<ProviderDispatcher>, args: SearchArgs) -> Result<()> {
    let client = SearchClient::new(dispatcher);
    let results = client
        .search(&args.query, args.num, args.provider.as_deref())
        .await?;

    match args.format {
        OutputFormat::Text => {
            println!(
                "\nSearch results for \"{}\" from {} ({} results in {}ms):\n",
                args.query,
                results.provider,
                results.payload.len(),
                results.latency.as_millis()
            );

            for hit in &results.payload {
                println!("{}. {}", hit.position, hit.title);
                println!("   URL: {}", hit.url);
                if !hit.snippet.is_empty() {
                    println!("   {}", truncate(&hit.snippet, 150));
                }
                println!();
            }

            for skipped in &results.skipped {
                eprintln!("skipped {}", skipped);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        OutputFormat::Compact => {
            for hit in &results.payload {
                println!("{}\t{}", hit.title, hit.url);
            }
        }
    }

    Ok(())
}

async fn run_captcha(dispatcher: Arc<ProviderDispatcher>, command: CaptchaCommand) -> Result<()> {
    let (request, provider) = match command {
        CaptchaCommand::Image(args) => {
            let request = match (args.file, args.url) {
                (Some(path), _) => {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    CaptchaRequest::Image { bytes }
                }
                (None, Some(url)) => CaptchaRequest::ImageUrl { url },
                (None, None) => anyhow::bail!("Either --file or --url is required"),
            };
            (request, args.provider)
        }
        CaptchaCommand::Recaptcha(args) => {
            let request = if args.v3 {
                CaptchaRequest::RecaptchaV3 {
                    sitekey: args.site.sitekey,
                    page_url: args.site.page_url,
                    action: args.action,
                    min_score: args.min_score,
                }
            } else {
                CaptchaRequest::RecaptchaV2 {
                    sitekey: args.site.sitekey,
                    page_url: args.site.page_url,
                }
            };
            (request, args.site.provider)
        }
        CaptchaCommand::Hcaptcha(args) => (
            CaptchaRequest::HCaptcha {
                sitekey: args.sitekey,
                page_url: args.page_url,
            },
            args.provider,
        ),
    };

    let solver = CaptchaSolver::new(dispatcher);
    let result = solver.solve(request, provider.as_deref()).await?;
    eprintln!(
        "Solved by {} in {}ms",
        result.provider,
        result.latency.as_millis()
    );
    println!("{}", result.payload.code);
    Ok(())
}

fn print_exhausted(attempts: &[AttemptRecord]) {
    eprintln!("No provider could serve the request:");
    for attempt in attempts {
        eprintln!("  {}", attempt);
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
