#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formprobe::scenarios::{self, Category, ScenarioId};
use formprobe::{HarnessConfig, OutputFormat, ProbeError, ScenarioReport, ViewportSize};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_SCENARIO_FAILED: i32 = 1;
const EXIT_COMMAND_ERROR: i32 = 1;

#[derive(Parser)]
#[command(name = "formprobe")]
#[command(about = "End-to-end scenarios for web registration forms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios against a live form page
    Run {
        /// Only scenarios in this category (repeatable)
        #[arg(short, long)]
        category: Vec<Category>,

        /// Only this scenario (repeatable)
        #[arg(short, long)]
        scenario: Vec<ScenarioId>,

        /// URL of the form page
        #[arg(short, long)]
        url: Option<String>,

        /// Browser to use (firefox or chrome)
        #[arg(short, long)]
        browser: Option<String>,

        /// WebDriver endpoint (defaults to the browser's standard port)
        #[arg(long)]
        webdriver_url: Option<String>,

        /// Run browser in visible mode (disables headless)
        #[arg(long = "no-headless")]
        no_headless: bool,

        /// Set viewport size (WIDTHxHEIGHT, e.g., 1920x1080)
        #[arg(long)]
        viewport: Option<String>,

        /// Directory for failure screenshots
        #[arg(long)]
        screenshot_dir: Option<PathBuf>,

        /// Do not capture failure screenshots
        #[arg(long, conflicts_with = "screenshot_dir")]
        no_screenshots: bool,

        /// Per-strategy lookup timeout in milliseconds
        #[arg(long)]
        lookup_timeout_ms: Option<u64>,

        /// Stop after the first failing scenario
        #[arg(long)]
        fail_fast: bool,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// List available scenarios
    List {
        /// Only scenarios in this category (repeatable)
        #[arg(short, long)]
        category: Vec<Category>,

        /// Output format
        #[arg(short, long, default_value = "simple")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => std::process::exit(EXIT_SUCCESS),
        Ok(false) => std::process::exit(EXIT_SCENARIO_FAILED),
        Err(err) => {
            let exit_code = err
                .downcast_ref::<ProbeError>()
                .map(ProbeError::exit_code)
                .unwrap_or(EXIT_COMMAND_ERROR);

            // Output JSON error to stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": format!("{:#}", err),
                "exit_code": exit_code
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            // Also log to stderr for human reading
            eprintln!("Error: {:#}", err);
            std::process::exit(exit_code);
        }
    }
}

/// Returns whether every selected scenario passed
async fn run() -> Result<bool> {
    // Initialize tracing to stderr (so JSON output to stdout remains clean)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formprobe=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            category,
            scenario,
            url,
            browser,
            webdriver_url,
            no_headless,
            viewport,
            screenshot_dir,
            no_screenshots,
            lookup_timeout_ms,
            fail_fast,
            format,
        } => {
            let mut config = HarnessConfig::from_env()?;
            if let Some(url) = url {
                config.base_url = url;
            }
            if let Some(browser) = browser {
                config.browser = browser.parse()?;
            }
            if webdriver_url.is_some() {
                config.webdriver_url = webdriver_url;
            }
            if no_headless {
                config.headless = false;
            }
            if let Some(viewport) = viewport {
                config.viewport = Some(ViewportSize::parse(&viewport)?);
            }
            if no_screenshots {
                config.screenshot_dir = None;
            } else if screenshot_dir.is_some() {
                config.screenshot_dir = screenshot_dir;
            }
            if let Some(timeout) = lookup_timeout_ms {
                config.lookup_timeout_ms = timeout;
            }
            config.validate()?;

            let selected = scenarios::select(&category, &scenario);
            info!(
                "Running {} scenario(s) against {}",
                selected.len(),
                config.base_url
            );

            let mut reports = Vec::with_capacity(selected.len());
            for id in selected {
                let report = scenarios::run_scenario(&config, id).await;
                let failed = !report.passed;
                if matches!(format, OutputFormat::Simple) {
                    print_report_line(&report);
                }
                reports.push(report);
                if failed && fail_fast {
                    break;
                }
            }

            let passed = reports.iter().filter(|r| r.passed).count();
            let all_passed = passed == reports.len();
            match format {
                OutputFormat::Json => {
                    let summary = json!({
                        "passed": passed,
                        "failed": reports.len() - passed,
                        "scenarios": reports,
                    });
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                OutputFormat::Simple => {
                    println!();
                    println!("{} passed, {} failed", passed, reports.len() - passed);
                }
            }
            Ok(all_passed)
        }

        Commands::List { category, format } => {
            let selected = scenarios::select(&category, &[]);
            match format {
                OutputFormat::Json => {
                    let listing: Vec<_> = selected
                        .iter()
                        .map(|id| {
                            json!({
                                "name": id.name(),
                                "categories": id.categories(),
                                "description": id.description(),
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&listing)?);
                }
                OutputFormat::Simple => {
                    for id in selected {
                        let categories: Vec<String> =
                            id.categories().iter().map(|c| c.to_string()).collect();
                        println!(
                            "{:<24} {:<32} {}",
                            id.name(),
                            categories.join(","),
                            id.description()
                        );
                    }
                }
            }
            Ok(true)
        }
    }
}

fn print_report_line(report: &ScenarioReport) {
    let status = if report.passed { "PASS" } else { "FAIL" };
    println!("{} {} ({}ms)", status, report.scenario, report.duration_ms);
    if let Some(error) = &report.error {
        println!("    {}", error);
    }
    if let Some(screenshot) = &report.screenshot {
        println!("    screenshot: {}", screenshot);
    }
}
