use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::unbounded;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tweetcount::cli::{Cli, LaunchMode};
use tweetcount::cluster::{self, WaitPolicy};
use tweetcount::config::RunConfig;
use tweetcount::config_file::ConfigFile;
use tweetcount::error::ProtocolError;
use tweetcount::output;
use tweetcount::partition::Rank;
use tweetcount::platform::{signal_exit_code, Ctrl, ExitCode, SignalHandler};

fn main() {
    let (args, cli) = process_args_with_config();
    setup_logging(cli.verbose);

    let config = match RunConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tweetcount: Error: {}", e);
            ExitCode::InvalidUsage.exit();
        }
    };

    // Child rank started by a coordinator in process launch mode
    if let Some(rank) = cli.worker_rank {
        match cluster::run_worker_process(&config, Rank::new(rank)) {
            Ok(exit) => {
                debug!(rank, replies = exit.replies, "Worker released");
                ExitCode::Success.exit();
            }
            Err(e) => fail(e),
        }
    }

    let (ctrl_tx, ctrl_rx) = unbounded::<Ctrl>();
    let _signal_handler = match SignalHandler::new(ctrl_tx) {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!("tweetcount: Failed to initialize signal handling: {}", e);
            ExitCode::GeneralError.exit();
        }
    };

    let wait = WaitPolicy::unbounded()
        .with_deadline(config.cluster.recv_timeout)
        .with_cancel(ctrl_rx);

    let result = match config.cluster.launch {
        LaunchMode::Threads => cluster::run_threads(&config, wait),
        LaunchMode::Processes => child_command(&args)
            .and_then(|(program, child_args)| cluster::run_processes(&config, wait, &program, &child_args)),
    };

    match result {
        Ok(table) => {
            println!("{}", output::render(&table, &config.search, &config.output));
            ExitCode::Success.exit();
        }
        Err(e) => fail(e),
    }
}

/// Report a fatal error and exit with the matching code
fn fail(e: anyhow::Error) -> ! {
    eprintln!("tweetcount: Error: {:#}", e);

    let cancelled = e
        .downcast_ref::<ProtocolError>()
        .is_some_and(ProtocolError::is_cancelled);
    if cancelled {
        signal_exit_code().unwrap_or(ExitCode::SignalInt).exit();
    }
    ExitCode::GeneralError.exit();
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tweetcount={},warn", level)));

    // stdout is reserved for results and, in child ranks, protocol frames
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Program and arguments used to start worker ranks as child processes.
///
/// Children get the already expanded arguments so they see exactly the
/// configuration this process runs with.
fn child_command(args: &[String]) -> Result<(PathBuf, Vec<String>)> {
    let program = std::env::current_exe().context("Cannot locate the tweetcount executable")?;
    let mut child_args: Vec<String> = args.iter().skip(1).cloned().collect();
    child_args.push("--ignore-config".to_string());
    Ok((program, child_args))
}

fn extract_config_file_arg(args: &[String]) -> Option<String> {
    args.iter().enumerate().find_map(|(i, arg)| {
        if arg == "--config-file" {
            args.get(i + 1).cloned()
        } else {
            arg.strip_prefix("--config-file=").map(str::to_string)
        }
    })
}

/// Apply config file defaults and aliases, then parse the command line
fn process_args_with_config() -> (Vec<String>, Cli) {
    let raw_args: Vec<String> = std::env::args().collect();
    let config_file_path = extract_config_file_arg(&raw_args);

    if raw_args.iter().any(|arg| arg == "--show-config") {
        if let Err(e) = ConfigFile::show_config() {
            eprintln!("tweetcount: Config file error: {}", e);
            ExitCode::GeneralError.exit();
        }
        ExitCode::Success.exit();
    }

    let processed_args = if raw_args.iter().any(|arg| arg == "--ignore-config") {
        raw_args
    } else {
        match ConfigFile::load_with_custom_path(config_file_path.as_deref())
            .and_then(|config_file| config_file.process_args(raw_args))
        {
            Ok(processed) => processed,
            Err(e) => {
                eprintln!("tweetcount: Config error: {:#}", e);
                ExitCode::GeneralError.exit();
            }
        }
    };

    let cli = Cli::try_parse_from(&processed_args).unwrap_or_else(|e| e.exit());
    (processed_args, cli)
}
