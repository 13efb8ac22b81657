// src/bin/cli.rs

//! vrn CLI
//!
//! Runs the release notifier and manages subscriptions from the shell.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use vrn::{
    context::AppContext,
    error::{AppError, Result},
    models::{Config, NotificationTarget, TitleId},
    pipeline::{Orchestrator, shutdown_signal},
    services::TitleChange,
};

/// vrn - Manga Release Notifier
#[derive(Parser, Debug)]
#[command(name = "vrn", version, about = "Manga chapter release notifier")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "storage/config.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll every tracked title until interrupted
    Run,

    /// Run a single scrape and notify cycle
    Once,

    /// Subscribe a target to one or more titles
    Subscribe {
        target: String,
        #[arg(required = true)]
        titles: Vec<String>,
    },

    /// Remove a target's subscription to one or more titles
    Unsubscribe {
        target: String,
        #[arg(required = true)]
        titles: Vec<String>,
    },

    /// List the titles a target is subscribed to
    Subscriptions { target: String },

    /// List the tracked titles
    Titles,

    /// List stored releases of a title, newest first
    Releases { title: String },

    /// List releases still waiting for notification
    Pending,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging. `RUST_LOG` wins over everything else; otherwise the
/// level starts at info (debug when verbose) until the config is loaded.
fn init_logging(verbose: bool) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
        .format_timestamp_secs()
        .init();
    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        });
    }
}

/// Apply `logging.level` from the config unless `-v` or `RUST_LOG` is set.
fn apply_config_level(verbose: bool, level: &str) {
    if verbose || std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    match level.parse::<log::LevelFilter>() {
        Ok(filter) => log::set_max_level(filter),
        Err(_) => log::warn!("Unknown logging.level '{level}', keeping info"),
    }
}

fn report_changes(verb: &str, target: &NotificationTarget, changes: &[TitleChange]) -> Result<()> {
    let mut failed = 0;
    for change in changes {
        match &change.result {
            Ok(()) => println!("{verb} {target} {}", change.title),
            Err(e) => {
                failed += 1;
                println!("{}: {e}", change.title);
            }
        }
    }
    if failed > 0 {
        return Err(AppError::validation(format!(
            "{failed} of {} title(s) failed",
            changes.len()
        )));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    apply_config_level(cli.verbose, &config.logging.level);

    if let Command::Validate = cli.command {
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {e}");
            return Err(e);
        }
        log::info!("Config OK ({} titles)", config.titles.len());
        return Ok(());
    }

    let ctx = AppContext::from_config(config, Path::new(".")).await?;

    match cli.command {
        Command::Run => {
            let shutdown = shutdown_signal()?;
            let orchestrator = Orchestrator::new(ctx);
            orchestrator.run(shutdown).await;
        }

        Command::Once => {
            let orchestrator = Orchestrator::new(ctx);
            let report = orchestrator.run_cycle().await;
            println!(
                "titles={} admitted={} not_newer={} scrape_errors={} conflicts={} store_errors={} deliveries={} failed_deliveries={} marked_notified={}",
                report.titles,
                report.admitted,
                report.not_newer,
                report.scrape_errors,
                report.conflicts,
                report.store_errors,
                report.deliveries,
                report.failed_deliveries,
                report.marked_notified
            );
        }

        Command::Subscribe { target, titles } => {
            let target = NotificationTarget::new(target);
            let changes = ctx.subscription_service().subscribe(&target, &titles).await;
            report_changes("subscribed", &target, &changes)?;
        }

        Command::Unsubscribe { target, titles } => {
            let target = NotificationTarget::new(target);
            let changes = ctx
                .subscription_service()
                .unsubscribe(&target, &titles)
                .await;
            report_changes("unsubscribed", &target, &changes)?;
        }

        Command::Subscriptions { target } => {
            let target = NotificationTarget::new(target);
            let titles = ctx.subscription_service().subscriptions(&target).await?;
            if titles.is_empty() {
                println!("{target} has no subscriptions");
            }
            for title in titles {
                println!("{}\t{}", title.id, title.description);
            }
        }

        Command::Titles => {
            for title in ctx.subscription_service().available() {
                println!("{}\t{}", title.id, title.description);
            }
        }

        Command::Releases { title } => {
            let id = TitleId::new(&title);
            if !ctx.catalog.contains(&id) {
                return Err(AppError::not_found(format!("title '{id}' is not tracked")));
            }
            for release in ctx.releases.list(&id).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    release.label(),
                    if release.notified { "notified" } else { "pending" },
                    release.discovered_at.to_rfc3339(),
                    release.url
                );
            }
        }

        Command::Pending => {
            let mut total = 0;
            for id in ctx.catalog.ids() {
                for release in ctx.releases.get_unnotified(&id).await? {
                    total += 1;
                    println!("{id}\t{}\t{}", release.label(), release.url);
                }
            }
            log::info!("{total} release(s) pending notification");
        }

        Command::Validate => {}
    }

    Ok(())
}
