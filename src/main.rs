use anyhow::{Context, Result};
use clap::Parser;
use fluxread::ai::AiClient;
use fluxread::api::MinifluxClient;
use fluxread::app::{App, AppEvent};
use fluxread::config::{Config, SERVER_ENV};
use fluxread::settings::storage::LocalStorage;
use fluxread::settings::SettingsStore;
use fluxread::version::{self, BuildInfo, VersionChecker};
use fluxread::{opml, ui};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Get the config directory path (~/.config/fluxread/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("fluxread"))
}

#[derive(Parser, Debug)]
#[command(name = "fluxread", version, about = "Terminal client for Miniflux")]
struct Args {
    /// Miniflux server URL (overrides config.toml and FLUXREAD_SERVER)
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Upload an OPML file to the server, then exit
    #[arg(long, value_name = "FILE")]
    import_opml: Option<PathBuf>,

    /// Write the server's subscriptions as OPML, then exit
    #[arg(long, value_name = "FILE")]
    export_opml: Option<PathBuf>,

    /// Restore all settings to their defaults before starting
    #[arg(long)]
    reset_settings: bool,
}

/// Sends logs to `fluxread.log` when RUST_LOG is set.
///
/// The TUI owns the terminal, so nothing is ever written to stderr.
fn init_logging(config_dir: &Path) -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        return Ok(());
    }
    let log_path = config_dir.join("fluxread.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn minutes(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value * 60))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // Settings and the API token live here; keep it user-only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            eprintln!(
                "Warning: failed to set permissions on {}: {e}",
                config_dir.display()
            );
        }
    }

    init_logging(&config_dir)?;

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config.toml")?;
    let env = |key: &str| {
        if key == SERVER_ENV && args.server.is_some() {
            return args.server.clone();
        }
        std::env::var(key).ok()
    };
    let connection = config.connection(env).with_context(|| {
        format!(
            "Set server_url and api_token in {} or use FLUXREAD_SERVER / FLUXREAD_TOKEN",
            config_dir.join("config.toml").display()
        )
    })?;

    let timeout = config.request_timeout();
    let client = MinifluxClient::new(&connection.server_url, &connection.token, timeout)
        .context("Failed to create Miniflux client")?;

    if let Some(path) = &args.import_opml {
        let (content, summary) = opml::read_import_file(path)
            .await
            .with_context(|| format!("Cannot import {}", path.display()))?;
        client
            .import_opml(content)
            .await
            .context("Server rejected the OPML import")?;
        println!(
            "Imported {} feeds in {} folders from {}",
            summary.feeds,
            summary.folders,
            path.display()
        );
        return Ok(());
    }

    if let Some(path) = &args.export_opml {
        let content = client.export_opml().await.context("Failed to export OPML")?;
        opml::write_export(path, &content)?;
        println!("Exported subscriptions to {}", path.display());
        return Ok(());
    }

    let storage = LocalStorage::open(config_dir.join("storage.json"))
        .context("Failed to open local storage")?;
    let mut settings = SettingsStore::load(storage);
    if args.reset_settings {
        settings.reset().context("Failed to reset settings")?;
        println!("Settings reset to defaults.");
    }

    let ai = AiClient::new(timeout).context("Failed to create AI client")?;
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(64);
    let mut app = App::new(client, ai, settings, config.theme.clone(), event_tx);

    for warning in app.keybindings.apply_overrides(&config.keybindings) {
        tracing::warn!("{warning}");
        eprintln!("Warning: {warning}");
    }

    let debug = version::debug_flag(std::env::var(version::DEBUG_ENV).ok().as_deref())
        || config.version_check_debug;
    match VersionChecker::new(
        config.version_url(|k| std::env::var(k).ok()),
        BuildInfo::current(),
        debug,
        timeout,
    ) {
        Ok(checker) => app.version_checker = Some(checker),
        Err(e) => tracing::warn!(error = %e, "Version check disabled"),
    }
    app.counters_interval = minutes(config.counters_refresh_minutes);
    app.version_interval = minutes(config.version_check_interval_minutes);

    tracing::info!(server = %connection.server_url, "Starting fluxread");
    ui::run(&mut app, event_rx).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_flags() {
        let args = Args::parse_from([
            "fluxread",
            "--server",
            "https://rss.example.com",
            "--reset-settings",
        ]);
        assert_eq!(args.server.as_deref(), Some("https://rss.example.com"));
        assert!(args.reset_settings);
        assert!(args.import_opml.is_none());
    }

    #[test]
    fn test_minutes_zero_disables() {
        assert_eq!(minutes(0), None);
        assert_eq!(minutes(5), Some(Duration::from_secs(300)));
    }
}
