//! Bonfire CLI - git-backed save backups for Dark Souls III.

use clap::Parser;

mod commands;
mod output;
mod services;

use commands::{Cli, Commands, ConfigAction};

fn main() {
    let cli = Cli::parse();
    output::set_quiet(cli.quiet);

    let default_level = if matches!(cli.command, Commands::Watch) {
        "info"
    } else {
        "warn"
    };
    init_tracing(default_level);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Init { repo_url } => commands::init::run(config, repo_url.as_deref()),
        Commands::Sync { auto } => commands::sync::run(config, auto),
        Commands::Status { json } => commands::status::run(config, json),
        Commands::Restore { to, yes } => commands::restore::run(config, to.as_deref(), yes),
        Commands::Pull => commands::pull::run(config),
        Commands::Info { json } => commands::info::run(config, json),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(config),
            ConfigAction::Path => commands::config::path(config),
            ConfigAction::Set { key, value } => commands::config::set(config, &key, &value),
        },
        Commands::Watch => commands::watch::run(config),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

/// Log to stderr, filtered by `BONFIRE_LOG` (or `RUST_LOG`).
fn init_tracing(default_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_env("BONFIRE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
