use std::{cell::OnceCell, path::PathBuf, rc::Rc};

use indicatif::ProgressBar;
use kvm_config::config::Config;
use kvm_core::{
    fetch::{EndpointTemplates, FetchPipeline, FetchStage},
    registry::{CacheLayout, Registry},
    release::Platform,
    KvmResult,
};
use kvm_utils::path::resolve_path;
use nu_ansi_term::Color::{Blue, Cyan, Green};
use tracing::info;

use crate::{
    progress::{create_download_job, create_spinner_job, handle_download_progress},
    utils::{release_index, Colored},
};

pub const VERSION_TARGET_ENV: &str = "KVM_VERSION_TARGET";

/// Picks the requested version: the argument, then `$KVM_VERSION_TARGET`, then latest.
pub fn requested_version(arg: Option<String>) -> Option<String> {
    arg.or_else(|| std::env::var(VERSION_TARGET_ENV).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn output_path(config: &Config, output: Option<&str>) -> KvmResult<PathBuf> {
    match output {
        Some(path) => Ok(resolve_path(path)?),
        None => Ok(config.get_output_path()?),
    }
}

pub fn download_release(
    config: &Config,
    platform: Platform,
    version: Option<String>,
    output: Option<String>,
) -> KvmResult<()> {
    let token = requested_version(version);
    let dest = output_path(config, output.as_deref())?;

    let layout = CacheLayout::new(config.get_cache_path()?);
    let store = layout.blob_store();
    let mut registry = Registry::open(layout.registry_file(), &store)?;
    let index = release_index(config, platform);

    let spinner = create_spinner_job("resolving version");
    let bar: Rc<OnceCell<ProgressBar>> = Rc::new(OnceCell::new());
    let progress_bar = Rc::clone(&bar);

    let result = FetchPipeline::new(&index, &mut registry, EndpointTemplates::from(config))
        .on_stage(|stage| {
            match stage {
                FetchStage::DownloadVerifyStore => {
                    spinner.finish_and_clear();
                    bar.get_or_init(|| create_download_job("kubectl"));
                }
                FetchStage::Done => spinner.finish_and_clear(),
                stage => spinner.set_message(stage.to_string()),
            }
        })
        .on_progress(move |event| {
            if let Some(pb) = progress_bar.get() {
                handle_download_progress(event, pb);
            }
        })
        .fetch(token.as_deref(), &dest);

    spinner.finish_and_clear();
    if let Some(pb) = bar.get() {
        pb.finish_and_clear();
    }

    let report = result?;
    let source = if report.cache_hit {
        "from cache"
    } else {
        "downloaded"
    };

    info!(
        "{} {} ({}) {} to {}",
        Colored(Green, "kubectl"),
        Colored(Green, report.release.version),
        Colored(Cyan, report.release.platform()),
        source,
        Colored(Blue, report.path.display())
    );
    info!("sha256: {}", report.digest);

    Ok(())
}
