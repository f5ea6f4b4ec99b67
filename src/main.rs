use clap::{Parser, Subcommand};
use tracing::{error, info};

use newsletter_scraper::config::Config;
use newsletter_scraper::constants;
use newsletter_scraper::error::ScraperError;
use newsletter_scraper::logging;
use newsletter_scraper::pipeline::Orchestrator;

#[derive(Parser)]
#[command(name = "newsletter_scraper")]
#[command(about = "Multi-source newsletter metadata scraper")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the aggregation pipeline
    Run {
        /// Path to configuration file
        #[arg(long, default_value = "config.toml")]
        config: String,
        /// Specific sources to run (comma-separated). Available: rss, feedspot, curated_list, substack
        #[arg(long)]
        sources: Option<String>,
        /// Keep only records with all required fields present
        #[arg(long)]
        complete_only: bool,
        /// Maximum number of newsletters to keep
        #[arg(long)]
        limit: Option<usize>,
        /// Skip the email verification step
        #[arg(long)]
        skip_email_verification: bool,
        /// Output format(s), comma-separated (csv,json)
        #[arg(long)]
        output: Option<String>,
        /// Search keywords (comma-separated), for sources that support search
        #[arg(long)]
        keywords: Option<String>,
    },
    /// List the supported source adapters
    Sources,
}

fn load_config(path: &str) -> Result<Config, ScraperError> {
    match Config::load(path) {
        Ok(config) => Ok(config),
        // A missing default config file is fine; explicit paths must exist
        Err(ScraperError::Config(msg)) if path == "config.toml" => {
            info!("{}; using built-in defaults", msg);
            Ok(Config::default())
        }
        Err(e) => Err(e),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::split_list;

    #[test]
    fn comma_lists_are_trimmed_and_emptied() {
        assert_eq!(split_list("rss, feedspot"), vec!["rss", "feedspot"]);
        assert_eq!(split_list("csv,,json,"), vec!["csv", "json"]);
        assert!(split_list("  ,").is_empty());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            sources,
            complete_only,
            limit,
            skip_email_verification,
            output,
            keywords,
        } => {
            let mut config = load_config(&config)?;
            if let Some(sources) = sources {
                config.sources.enabled = split_list(&sources);
            }
            if complete_only {
                config.run.complete_only = true;
            }
            if let Some(limit) = limit {
                config.run.limit = Some(limit);
            }
            if skip_email_verification {
                config.run.skip_email_verification = true;
            }
            if let Some(output) = output {
                config.output.formats = split_list(&output);
            }
            if let Some(keywords) = keywords {
                config.run.keywords = split_list(&keywords);
            }

            println!("🚀 Running newsletter aggregation pipeline...");
            match Orchestrator::new(config).run().await {
                Ok(result) => {
                    info!("Pipeline finished");
                    println!("\n📊 Run summary:");
                    for (source, count) in &result.records_seen {
                        println!("   {}: {} records", source, count);
                    }
                    println!("   Canonical newsletters: {}", result.canonical_records);
                    println!("   Kept: {}", result.records_kept);
                    println!("   Dropped incomplete: {}", result.dropped_incomplete);
                    println!("   Malformed: {}", result.malformed_records);
                    println!("   Duration: {:.2}s", result.duration_seconds);

                    if !result.failed_sources.is_empty() {
                        println!("\n⚠️  Failed sources:");
                        for (source, reason) in &result.failed_sources {
                            println!("   - {}: {}", source, reason);
                        }
                    }
                }
                Err(e) => {
                    error!("Pipeline failed: {}", e);
                    println!("❌ Pipeline failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Sources => {
            println!("Supported sources:");
            for source in constants::supported_sources() {
                println!("   - {}", source);
            }
        }
    }
    Ok(())
}
