use cache::{clear_cache, list_cache, show_cache_path, verify_cache};
use clap::Parser;
use cli::{Args, CacheAction, Commands};
use download::download_release;
use kvm_config::config::{self, config_path, generate_default_config, get_config, set_config_path};
use kvm_core::KvmResult;
use kvm_dl::{error::DownloadError, http_client::configure_http_client};
use kvm_utils::path::resolve_path;
use logging::setup_logging;
use release::{list_releases, resolve_token, show_latest};
use tracing::{debug, info};
use ureq::{
    http::{HeaderMap, HeaderName, HeaderValue},
    Proxy,
};
use utils::{target_platform, COLOR, PROGRESS};

mod cache;
mod cli;
mod download;
mod logging;
mod progress;
mod release;
mod utils;

/// Parses `Name: value` header arguments, dropping malformed entries.
fn parse_headers(headers: &[String]) -> HeaderMap {
    headers
        .iter()
        .filter_map(|header| {
            let (key, value) = header.split_once(':')?;
            let name = key.trim().parse::<HeaderName>().ok()?;
            let value = value.trim().parse::<HeaderValue>().ok()?;
            Some((name, value))
        })
        .collect()
}

fn configure_http(args: &Args, timeout: std::time::Duration) -> KvmResult<()> {
    let proxy = args
        .proxy
        .as_deref()
        .map(Proxy::new)
        .transpose()
        .map_err(DownloadError::from)?;
    let user_agent = args.user_agent.clone();
    let headers = args.header.as_deref().map(parse_headers);

    configure_http_client(|config| {
        if proxy.is_some() {
            config.proxy = proxy;
        }
        if let Some(user_agent) = user_agent {
            config.user_agent = Some(user_agent);
        }
        if let Some(headers) = headers {
            config.headers = Some(headers);
        }
        config.timeout = Some(timeout);
    });

    Ok(())
}

fn handle_cli() -> KvmResult<()> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        *COLOR.write().unwrap_or_else(|p| p.into_inner()) = false;
    }

    if args.quiet || args.no_progress {
        *PROGRESS.write().unwrap_or_else(|p| p.into_inner()) = false;
    }

    if let Some(ref c) = args.config {
        set_config_path(resolve_path(c)?);
    }

    if let Commands::DefConfig = args.command {
        generate_default_config()?;
        return Ok(());
    }

    config::init()?;
    let config = get_config();
    debug!("Using configuration at {}", config_path().display());

    configure_http(&args, config.get_http_timeout()?)?;

    let platform = || target_platform(args.os.as_deref(), args.arch.as_deref());

    match args.command {
        Commands::Latest => show_latest(&config, platform()?)?,
        Commands::List {
            ref minor,
            limit,
        } => list_releases(&config, platform()?, minor.clone(), limit)?,
        Commands::Resolve {
            ref token,
        } => resolve_token(&config, platform()?, token)?,
        Commands::Download {
            ref version,
            ref output,
        } => download_release(&config, platform()?, version.clone(), output.clone())?,
        Commands::Cache {
            ref action,
        } => {
            match action {
                CacheAction::List => list_cache(&config)?,
                CacheAction::Clear => clear_cache(&config)?,
                CacheAction::Path => show_cache_path(&config)?,
                CacheAction::Verify => verify_cache(&config)?,
            }
        }
        Commands::Env => {
            info!("KVM_CONFIG={}", config_path().display());
            info!("KVM_CACHE={}", config.get_cache_path()?.display());
            info!("KVM_OUTPUT={}", config.get_output_path()?.display());
            info!("KVM_PLATFORM={}", platform()?);
        }
        Commands::DefConfig => {}
    }

    Ok(())
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli() {
        progress::stop();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
