use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use platforms::models::Platform;
use reconciler::processor::BatchOptions;
use reconciler::FetchWindow;
use std::process;

const DEFAULT_CONFIG: &str = "config/social-report.toml";

fn days_arg() -> Arg {
    Arg::new("days")
        .short('d')
        .long("days")
        .value_name("N")
        .value_parser(value_parser!(i64))
        .help("Look back N days (defaults to days_lookback)")
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .action(ArgAction::SetTrue)
        .help(help)
}

fn cli() -> Command {
    Command::new("social-report")
        .version("1.0")
        .about("Collects social media post metrics and reconciles them into a sheet")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Sets a custom config file"),
        )
        .arg(flag("log-json", "Emit logs as JSON").global(true))
        .subcommand(
            Command::new("fetch")
                .about("Fetch recent posts and print their metrics")
                .arg(days_arg().conflicts_with("since"))
                .arg(
                    Arg::new("since")
                        .long("since")
                        .value_name("YYYY-MM-DD")
                        .help("Fetch posts published on or after this date"),
                )
                .arg(
                    Arg::new("platform")
                        .short('p')
                        .long("platform")
                        .value_parser(["all", "facebook", "instagram", "twitter"])
                        .default_value("all"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Fetch recent posts and add or update their rows")
                .arg(days_arg())
                .arg(flag("dry-run", "Show what would change without writing"))
                .arg(flag("continue-on-error", "Keep going when a row write fails"))
                .arg(flag("json", "Print the summary as JSON")),
        )
        .subcommand(
            Command::new("update-sheet")
                .about("Refresh metrics for rows already in the sheet")
                .arg(
                    Arg::new("min-age-days")
                        .long("min-age-days")
                        .value_name("N")
                        .value_parser(value_parser!(i64))
                        .help("Only rows for posts at least N days old"),
                )
                .arg(flag("dry-run", "Show what would change without writing"))
                .arg(flag("continue-on-error", "Keep going when a row write fails"))
                .arg(flag("json", "Print the summary as JSON")),
        )
        .subcommand(
            Command::new("lookup")
                .about("Fetch metrics for a single post URL")
                .arg(
                    Arg::new("url")
                        .short('u')
                        .long("url")
                        .value_name("URL")
                        .required(true),
                ),
        )
        .subcommand(Command::new("status").about("Show configured platforms and row store"))
}

fn batch_options(matches: &ArgMatches) -> BatchOptions {
    BatchOptions {
        dry_run: matches.get_flag("dry-run"),
        continue_on_error: matches.get_flag("continue-on-error"),
    }
}

async fn dispatch(matches: &ArgMatches) -> anyhow::Result<()> {
    let config_path = matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_CONFIG);

    match matches.subcommand() {
        Some(("fetch", sub)) => {
            let window = match (sub.get_one::<i64>("days"), sub.get_one::<String>("since")) {
                (Some(days), _) => Some(FetchWindow::Days(*days)),
                (None, Some(since)) => Some(FetchWindow::Since(
                    NaiveDate::parse_from_str(since, "%Y-%m-%d")
                        .with_context(|| format!("Invalid --since date: {}", since))?,
                )),
                (None, None) => None,
            };
            let platform = match sub.get_one::<String>("platform").map(|s| s.as_str()) {
                None | Some("all") => None,
                Some(name) => Some(name.parse::<Platform>()?),
            };
            reconciler::run_fetch(config_path, window, platform).await?;
        }
        Some(("run", sub)) => {
            reconciler::run_reconcile(
                config_path,
                sub.get_one::<i64>("days").copied(),
                batch_options(sub),
                sub.get_flag("json"),
            )
            .await?;
        }
        Some(("update-sheet", sub)) => {
            reconciler::run_update_sheet(
                config_path,
                sub.get_one::<i64>("min-age-days").copied(),
                batch_options(sub),
                sub.get_flag("json"),
            )
            .await?;
        }
        Some(("lookup", sub)) => {
            let url = sub
                .get_one::<String>("url")
                .ok_or_else(|| anyhow!("--url is required"))?;
            reconciler::run_lookup(config_path, url).await?;
        }
        Some(("status", _)) => reconciler::run_status(config_path)?,
        _ => {
            println!("No subcommand specified. Use --help for usage information.");
            process::exit(1);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    reconciler::init_tracing(matches.get_flag("log-json"));

    if let Err(e) = dispatch(&matches).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
