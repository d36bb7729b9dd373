//! BounceNSend - bounce de la session Pro Tools ouverte et envoi via MASV
//!
//! Lancé à la main ou depuis un raccourci (Keyboard Maestro, ...). Par
//! défaut les destinataires sont demandés dans une boîte de dialogue ;
//! `--cli` passe en mode texte.

mod logs;
mod ui;

use anyhow::{Context, Result};
use bnsconfig::{Config, encryption::encrypt_secret, init_config};
use bnsmasv::{MasvConfigExt, TransferMode, TransferTarget};
use bnsprotools::ProToolsConfigExt;
use bnsworkflow::{BounceAndSend, Settings, WorkflowReport};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::info;
use ui::Surface;

#[derive(Parser, Debug)]
#[command(name = "BounceNSend")]
#[command(about = "Bounce the active Pro Tools session and send it through MASV")]
#[command(version)]
struct Args {
    /// Text prompt instead of dialogs
    #[arg(long)]
    cli: bool,

    /// Comma-separated recipient emails (skips the prompt)
    #[arg(long, value_name = "EMAILS")]
    recipients: Option<String>,

    /// Deliver to this MASV portal subdomain instead of recipients
    #[arg(long, value_name = "SUBDOMAIN", conflicts_with = "recipients")]
    portal: Option<String>,

    /// Portal password, if the portal requires one
    #[arg(long, env = "MASV_PORTAL_PASSWORD", hide_env_values = true)]
    portal_password: Option<String>,

    /// Transfer mechanism: http or agent (default: masv.mode)
    #[arg(long)]
    mode: Option<TransferMode>,

    /// Configuration directory (default: BNS_CONFIG, ./.bouncensend, ~/.bouncensend)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the encrypted form of a secret, to paste into config.yaml
    EncryptSecret { value: String },
    /// Store settings in config.yaml (the API key is encrypted)
    Configure(ConfigureArgs),
}

#[derive(clap::Args, Debug, Default)]
struct ConfigureArgs {
    /// MASV API key
    #[arg(long)]
    api_key: Option<String>,

    /// MASV team id
    #[arg(long)]
    team_id: Option<String>,

    /// PTSL host
    #[arg(long)]
    protools_host: Option<String>,

    /// PTSL port
    #[arg(long)]
    protools_port: Option<u16>,

    /// Minimum log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Log to the console
    #[arg(long)]
    log_console: Option<bool>,
}

enum Outcome {
    Sent(WorkflowReport),
    Cancelled,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let surface = Surface::new(args.cli);

    if let Some(Commands::EncryptSecret { value }) = &args.command {
        return match encrypt_secret(value) {
            Ok(encrypted) => {
                println!("{}", encrypted);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("✗ ERROR: {:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    if let Some(Commands::Configure(options)) = &args.command {
        let saved = init_config(args.config_dir.as_deref().unwrap_or(""))
            .and_then(|config| Ok((configure(&config, options)?, config)));
        return match saved {
            Ok((keys, config)) => {
                println!("Saved {} to {}", keys.join(", "), config.file_path());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("✗ ERROR: {:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    match run(&args, surface).await {
        Ok(Outcome::Sent(report)) => {
            surface.success(&report);
            ExitCode::SUCCESS
        }
        Ok(Outcome::Cancelled) => {
            surface.cancelled();
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            surface.failure(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args, surface: Surface) -> Result<Outcome> {
    let config = init_config(args.config_dir.as_deref().unwrap_or(""))
        .context("Failed to load configuration")?;
    logs::init_logging(&config);

    let mut settings = Settings::from_config(&config)?;
    if let Some(mode) = args.mode {
        settings = settings.with_mode(mode)?;
    }

    let target = match preset_target(args, &settings)? {
        Some(target) => target,
        None => {
            let recipients = surface.ask_recipients();
            if recipients.is_empty() {
                return Ok(Outcome::Cancelled);
            }
            TransferTarget::Email { recipients }
        }
    };

    info!("BOUNCE AND SEND TO MASV ({} mode)", settings.mode);
    let protools = config.protools_client()?;
    let report = BounceAndSend::new(settings).run(protools, target).await?;
    Ok(Outcome::Sent(report))
}

/// Écrit dans `config.yaml` les réglages fournis; retourne les clés modifiées
fn configure(config: &Config, options: &ConfigureArgs) -> Result<Vec<&'static str>> {
    if let Some(level) = options.log_level.as_deref() {
        if !logs::is_valid_level(level) {
            anyhow::bail!("Unknown log level: {}", level);
        }
    }

    let mut saved = Vec::new();
    if let Some(api_key) = options.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        config.set_masv_api_key(api_key)?;
        saved.push("masv.api_key");
    }
    if let Some(team_id) = options.team_id.as_deref() {
        config.set_masv_team_id(team_id.trim())?;
        saved.push("masv.team_id");
    }
    if let Some(host) = options.protools_host.as_deref() {
        config.set_protools_host(host.trim())?;
        saved.push("protools.host");
    }
    if let Some(port) = options.protools_port {
        config.set_protools_port(port)?;
        saved.push("protools.port");
    }
    if let Some(level) = options.log_level.as_deref() {
        config.set_log_min_level(level.trim().to_uppercase())?;
        saved.push("host.logger.min_level");
    }
    if let Some(enabled) = options.log_console {
        config.set_log_enable_console(enabled)?;
        saved.push("host.logger.enable_console");
    }

    if saved.is_empty() {
        anyhow::bail!("Nothing to configure (see --help)");
    }
    Ok(saved)
}

/// Cible connue sans interroger l'opérateur : options de la ligne de
/// commande, sinon portail par défaut de la configuration.
fn preset_target(args: &Args, settings: &Settings) -> Result<Option<TransferTarget>> {
    if args.recipients.is_some() || args.portal.is_some() {
        let recipients = args.recipients.as_deref().map(ui::parse_recipients);
        let target = TransferTarget::from_options(
            recipients.as_deref(),
            args.portal.as_deref(),
            args.portal_password.as_deref(),
        )?;
        return Ok(Some(target));
    }

    match settings.portal_subdomain.as_deref() {
        Some(subdomain) => Ok(Some(TransferTarget::from_options(
            None,
            Some(subdomain),
            args.portal_password
                .as_deref()
                .or(settings.portal_password.as_deref()),
        )?)),
        None => Ok(None),
    }
}
