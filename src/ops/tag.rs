//! Move an asset's current tag to a new name.

use crate::error::Result;
use crate::registry_path::RegistryPath;
use crate::store::RegistryStore;
use std::fs;
use tracing::{info, warn};

/// Rename one asset's tag in store metadata, then best-effort on disk.
///
/// The source tag is the address's explicit tag, else the asset's current
/// default. A metadata rename whose source tag is absent is a silent
/// success no-op. The directory rename happens after the metadata write and
/// is not atomic with it; a crash between the two leaves a documented
/// inconsistency window, and a failed directory rename only warns.
///
/// # Errors
///
/// Returns store resolution and IO errors from the metadata step.
pub fn tag_asset(store: &mut RegistryStore, path: &RegistryPath, new_tag: &str) -> Result<()> {
    let genome = path.require_genome()?.to_string();
    let asset = &path.asset;
    let old_tag = match path.tag {
        Some(ref tag) => tag.clone(),
        None => store.default_tag(&genome, asset, false)?,
    };

    if !store.tag_asset(&genome, asset, &old_tag, new_tag) {
        info!(genome, asset, old_tag, "source tag absent, nothing to rename");
        return Ok(());
    }
    store.write()?;

    let old_dir = store.tag_dir(&genome, asset, &old_tag);
    let new_dir = store.tag_dir(&genome, asset, new_tag);
    if old_dir.exists() {
        if let Err(error) = fs::rename(&old_dir, &new_dir) {
            warn!(
                from = %old_dir.display(),
                to = %new_dir.display(),
                %error,
                "metadata renamed but directory rename failed"
            );
        }
    }

    info!(genome, asset, old_tag, new_tag, "tag renamed");
    Ok(())
}
