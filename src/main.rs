mod api;
mod cli;
mod commands;
mod config;
mod controller;
mod endpoint;
mod error;
mod gate;
mod reconciler;
mod service;
mod store;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::OperatorConfig;
use identity::KeystoneAuthenticator;
use reconciler::{Reconciler, Settings};
use std::io;
use store::FileStore;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: OperatorConfig,
}

impl Context {
    pub fn store(&self) -> FileStore {
        FileStore::new(self.config.store_path())
    }

    pub fn reconciler(&self) -> Reconciler<FileStore, KeystoneAuthenticator> {
        let settings = Settings {
            keystone_api_name: self.config.keystone_api_name.clone(),
            bootstrap_delay: self.config.bootstrap_delay(),
        };
        Reconciler::with_settings(
            self.store(),
            KeystoneAuthenticator::with_timeout(self.config.http_timeout()),
            settings,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "ksvc", &mut io::stdout());
        return Ok(());
    }

    let mut config = OperatorConfig::load(cli.config.as_deref())?;
    if let Some(store) = &cli.store {
        config.store_dir = store.display().to_string();
    }

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config,
    };

    match cli.command {
        Command::Reconcile { key } => commands::reconcile::reconcile(&ctx, &key),
        Command::Plan { key, json } => commands::reconcile::plan(&ctx, &key, json),
        Command::Run { namespace, once } => commands::run::run(&ctx, namespace, once),
        Command::Status { key } => commands::status::run(&ctx, key.as_ref()),
        Command::Completions { .. } => Ok(()),
    }
}
