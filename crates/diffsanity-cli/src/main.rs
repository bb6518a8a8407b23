mod commands;
mod logging;
mod progress;

use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{CacheArgs, CheckArgs, Cli, Commands, HashArgs};
use diffsanity_core::config::load_configuration;
use diffsanity_core::report::{found_line, missing_line, summary_line, write_missing_list};
use diffsanity_core::{AppConfig, ScanOptions, ScanOutcome, Verdict, VerifyEngine};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info, warn};

const FATAL_EXIT_CODE: u8 = 2;

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match load_configuration(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return ExitCode::from(FATAL_EXIT_CODE);
        }
    };

    let result = match args.command {
        Some(Commands::Check(check)) => run_check(config, &check),
        Some(Commands::Hash(hash)) => run_hash(config, &hash),
        Some(Commands::Version) => {
            println!("diffsanity {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::PrintConfig) => print_config(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

fn apply_cache_args(config: &mut AppConfig, args: &CacheArgs) {
    if let Some(algorithm) = args.algorithm {
        config.hash_algorithm = algorithm;
    }
    if args.no_cache {
        config.use_manifest = false;
    }
    if args.no_rewrite_cache {
        config.rewrite_manifest = false;
    }
    config.ignore_patterns.extend(args.ignore.iter().cloned());
}

fn run_check(mut config: AppConfig, args: &CheckArgs) -> anyhow::Result<ExitCode> {
    apply_cache_args(&mut config, &args.cache);
    if args.skip_raw {
        config.skip_raw_files = true;
    }
    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate;
    }
    if args.sequential {
        config.parallel_scans = false;
    }

    let options = ScanOptions::from_config(&config).context("Invalid settings")?;
    let engine = VerifyEngine::new(options);
    let reporter = CliReporter::new();
    let verification = engine
        .verify(&args.source, &args.backup, &reporter)
        .with_context(|| {
            format!(
                "Could not verify {} against {}",
                args.source.display(),
                args.backup.display()
            )
        })?;

    for (_, path) in verification.present() {
        println!("{}", found_line(path));
    }
    for item in &verification.missing {
        eprintln!("{}", missing_line(item).red());
    }

    log_outcome("Source", &verification.source);
    log_outcome("Backup", &verification.backup);

    if let Some(list) = &args.missing_list {
        write_missing_list(list, &args.source, &verification.missing)
            .with_context(|| format!("Could not write missing list {}", list.display()))?;
    }

    let summary = summary_line(verification.verdict, verification.missing.len());
    match verification.verdict {
        Verdict::AllPresent => println!("{}", summary.green()),
        Verdict::Missing => println!("{}", summary.red()),
        Verdict::Incomplete => println!("{}", summary.yellow()),
    }

    Ok(ExitCode::from(verification.verdict.exit_code()))
}

fn run_hash(mut config: AppConfig, args: &HashArgs) -> anyhow::Result<ExitCode> {
    apply_cache_args(&mut config, &args.cache);

    let options = ScanOptions::from_config(&config).context("Invalid settings")?;
    let engine = VerifyEngine::new(options);
    let reporter = CliReporter::new();
    let outcome = engine
        .hash_directory(&args.dir, &reporter)
        .with_context(|| format!("Could not hash {}", args.dir.display()))?;

    for (digest, path) in outcome.index.iter() {
        println!("{}  {}", digest, args.dir.join(path).display());
    }
    log_outcome("Directory", &outcome);

    if outcome.failures.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(Verdict::Incomplete.exit_code()))
    }
}

fn print_config(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let rendered = toml::to_string_pretty(config).context("Could not render configuration")?;
    println!("{}", rendered);
    Ok(ExitCode::SUCCESS)
}

fn log_outcome(label: &str, outcome: &ScanOutcome) {
    let stats = &outcome.stats;
    info!(
        "{} {}: {} files, {} distinct, {} cached, {} hashed in {}",
        label,
        outcome.root.display(),
        format!("{}", stats.files_indexed).cyan(),
        format!("{}", outcome.index.len()).cyan(),
        format!("{}", stats.cache_hits).green(),
        format!("{}", stats.cache_misses).yellow(),
        format!("{:.2}s", stats.duration.as_secs_f64()).green(),
    );
    if stats.decode_fallbacks > 0 {
        info!(
            "{} files could not be decoded and were hashed byte for byte",
            stats.decode_fallbacks
        );
    }
    if stats.skipped_raw > 0 {
        info!("{} raw files skipped", stats.skipped_raw);
    }
    if stats.skipped_by_sampling > 0 {
        info!("{} files left out by sampling", stats.skipped_by_sampling);
    }
    if stats.manifest_stale {
        warn!(
            "Manifest in {} was written with different settings and was ignored",
            outcome.root.display()
        );
    }
    if stats.manifest_bad_lines > 0 {
        warn!(
            "{} unreadable manifest lines skipped in {}",
            stats.manifest_bad_lines,
            outcome.root.display()
        );
    }
    for failure in &outcome.failures {
        warn!(
            "Not verified: {}: {}",
            outcome.root.join(&failure.path).display(),
            failure.error
        );
    }
}
