//! Validated install: acquisition followed by structural validation, with
//! rollback when what landed is not a usable module.

use crate::validate::validate_module;
use cogmod_core::{Error, Result};
use cogmod_store::Installer;
use std::path::PathBuf;
use tracing::warn;

/// A successful validated install: where the module landed, plus any
/// validation warnings for the caller to surface.
#[derive(Debug)]
pub struct InstallOutcome {
    pub path: PathBuf,
    pub warnings: Vec<String>,
}

/// Install from `source`, then validate what landed. A module that fails
/// validation is removed again, store directory and manifest entry both,
/// before the validation errors surface. All-or-nothing from the caller's
/// perspective.
pub async fn install_validated(
    installer: &Installer,
    source: &str,
    name_override: Option<&str>,
) -> Result<InstallOutcome> {
    let path = installer.install(source, name_override).await?;
    let report = validate_module(&path);
    if report.is_valid() {
        return Ok(InstallOutcome {
            path,
            warnings: report.warnings,
        });
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    warn!("rolling back invalid install '{name}'");
    installer.uninstall(&name)?;

    Err(Error::acquisition(format!(
        "module from {source} failed validation and was rolled back: {}",
        report.errors.join("; ")
    )))
}
