mod client;
mod config;
mod controller;
mod detail;
mod models;
mod paging;
mod tui;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use client::{ListingSource, RemotiveClient};
use config::{Config, Overrides};
use detail::DetailView;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "remoteboard")]
#[command(about = "Browse remote job listings from the terminal")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Job board endpoint
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Listings per page
    #[arg(long, global = true)]
    page_size: Option<usize>,

    /// Referral tag added to apply links
    #[arg(long, global = true)]
    via: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Default)]
struct QueryArgs {
    /// Free-text search
    #[arg(short, long, default_value = "")]
    search: String,

    /// Category name, exactly as listed by `categories`
    #[arg(short, long)]
    category: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive board (default)
    Browse {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Print one page of listings
    List {
        #[command(flatten)]
        query: QueryArgs,

        /// Page number, starting at 1
        #[arg(short, long, default_value = "1")]
        page: usize,
    },

    /// Print the categories present on the board
    Categories,

    /// Show a listing's details and apply link
    Show {
        /// Listing ID
        id: u64,

        #[command(flatten)]
        query: QueryArgs,
    },
}

fn init_logging(command: &Commands) -> Result<()> {
    if let Commands::Browse { .. } = command {
        // The board owns the terminal, so log to a file instead.
        let path = Config::log_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("remoteboard=info")),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("remoteboard=warn")),
            )
            .init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Browse {
        query: QueryArgs::default(),
    });
    init_logging(&command)?;

    let overrides = Overrides {
        api_url: cli.api_url,
        page_size: cli.page_size,
        via: cli.via,
    };
    let config = Config::load(cli.config.as_deref(), overrides)?;
    info!(api_url = %config.api_url, page_size = config.page_size, "configuration loaded");

    let client = RemotiveClient::new(&config)?;

    match command {
        Commands::Browse { query } => {
            let source: Arc<dyn ListingSource> = Arc::new(client);
            tui::run_board(&config, source, &query.search, query.category.as_deref())?;
        }

        Commands::List { query, page } => {
            let fetched = client
                .search(&query.search, query.category.as_deref())
                .context("Failed to fetch listings")?;
            let result = paging::paginate(&fetched.listings, page, config.page_size);

            if fetched.listings.is_empty() {
                println!("{}", tui::EMPTY_MESSAGE);
            } else if result.items.is_empty() {
                println!(
                    "Page {} is out of range (1-{}).",
                    page, result.total_pages
                );
            } else {
                println!(
                    "{:<9} {:<36} {:<22} {:<20} {:<16}",
                    "ID", "TITLE", "COMPANY", "CATEGORY", "SALARY"
                );
                println!("{}", "-".repeat(107));
                for job in result.items {
                    println!(
                        "{:<9} {:<36} {:<22} {:<20} {:<16}",
                        job.id,
                        truncate(&job.title, 34),
                        truncate(&detail::or_not_provided(Some(job.company_name.as_str())), 20),
                        truncate(&detail::or_not_provided(job.category.as_deref()), 18),
                        truncate(&detail::or_not_provided(job.salary.as_deref()), 16),
                    );
                }
                let window: Vec<String> = paging::page_window(page, result.total_pages, config.window_delta)
                    .map(|p| if p == page { format!("[{}]", p) } else { p.to_string() })
                    .collect();
                println!(
                    "\nPage {} of {} ({} jobs)   {}",
                    page,
                    result.total_pages,
                    fetched.listings.len(),
                    window.join(" ")
                );
            }
            if fetched.rejected > 0 {
                println!("({} malformed listing(s) skipped)", fetched.rejected);
            }
        }

        Commands::Categories => {
            let fetched = client
                .search("", None)
                .context("Failed to fetch listings")?;
            let categories = paging::extract_categories(&fetched.listings);
            if categories.is_empty() {
                println!("No categories found.");
            } else {
                for category in categories {
                    println!("{}", category);
                }
            }
        }

        Commands::Show { id, query } => {
            let fetched = client
                .search(&query.search, query.category.as_deref())
                .context("Failed to fetch listings")?;
            let listing = fetched
                .listings
                .iter()
                .find(|l| l.id == id)
                .ok_or_else(|| anyhow!("Job #{} not found in the current results", id))?;

            let width = crossterm::terminal::size()
                .map(|(cols, _)| cols as usize)
                .unwrap_or(100)
                .min(100);
            let view = DetailView::new(listing, &config.via, width);

            println!("{}", view.title);
            println!("{}", "=".repeat(view.title.chars().count().min(width)));
            for (label, value) in &view.fields {
                println!("{}: {}", label, value);
            }
            println!("\n--- Job description ---");
            if view.description.is_empty() {
                println!("(No description provided)");
            } else {
                for line in &view.description {
                    println!("{}", line);
                }
            }
            println!("\nApply: {}", view.apply_url);
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
