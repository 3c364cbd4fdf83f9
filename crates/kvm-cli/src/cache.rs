use kvm_config::config::Config;
use kvm_core::{
    registry::{CacheLayout, Registry},
    KvmResult,
};
use tracing::{info, warn};

pub fn list_cache(config: &Config) -> KvmResult<()> {
    let layout = CacheLayout::new(config.get_cache_path()?);
    let store = layout.blob_store();
    let registry = Registry::open(layout.registry_file(), &store)?;

    if registry.is_empty() {
        info!("Cache is empty");
        return Ok(());
    }

    for line in registry.list() {
        info!("{}", line);
    }

    Ok(())
}

pub fn clear_cache(config: &Config) -> KvmResult<()> {
    let layout = CacheLayout::new(config.get_cache_path()?);
    let store = layout.blob_store();
    let mut registry = Registry::open(layout.registry_file(), &store)?;

    let removed = registry.clear()?;
    info!("Removed {} cache entries from {}", removed, layout.root().display());

    Ok(())
}

pub fn verify_cache(config: &Config) -> KvmResult<()> {
    let store = CacheLayout::new(config.get_cache_path()?).blob_store();
    let digests = store.list()?;

    let mut corrupted = 0;
    for digest in &digests {
        if store.verify(digest)? == Some(false) {
            warn!("Blob {} does not match its digest", digest);
            corrupted += 1;
        }
    }

    info!(
        "Verified {} blobs, {} corrupted",
        digests.len(),
        corrupted
    );
    if corrupted > 0 {
        info!("Run `kvm cache clear` to remove corrupted entries");
    }

    Ok(())
}

pub fn show_cache_path(config: &Config) -> KvmResult<()> {
    info!("{}", config.get_cache_path()?.display());
    Ok(())
}
