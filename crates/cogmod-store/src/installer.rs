//! Module installer — multi-source acquisition into the user-global store.
//!
//! Sources dispatch by prefix, first match wins: `local:`, `registry:`,
//! `github:`, `git+`, GitHub https URLs (branch-archive download), bare
//! filesystem paths, and finally an explicit registry-then-local fallback
//! for anything unrecognized. All clone/download/extract work happens in a
//! scoped temp directory that is removed on every exit path.
//!
//! The store itself is unlocked: two simultaneous installs of one name race
//! and the last writer wins, a directory-level replace with no merge. The
//! reference system is a single-process CLI, so this is accepted rather
//! than guarded.

use crate::loader::is_module_dir;
use crate::manifest::{record_install, remove_entry, ManifestEntry};
use crate::registry_client::RegistryClient;
use cogmod_core::{expand_tilde, manifest_path, user_modules_dir, Error, Result};
use flate2::read::GzDecoder;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Conventional nesting depths probed inside an extracted repository
/// archive, in order.
const ARCHIVE_PROBE_PREFIXES: &[&str] = &["", "cognitive/modules", "modules"];

pub struct Installer {
    registry: RegistryClient,
    client: Client,
    store_dir: PathBuf,
    manifest_path: PathBuf,
}

struct Acquired {
    target: PathBuf,
    github_url: Option<String>,
    module_path: Option<String>,
}

impl Installer {
    pub fn new(registry: RegistryClient) -> Self {
        Self {
            registry,
            client: Client::new(),
            store_dir: user_modules_dir(),
            manifest_path: manifest_path(),
        }
    }

    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = dir.into();
        self
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Install a module from a source URI into the user-global store and
    /// record its provenance. Post-install validation (and the rollback on
    /// its failure) is the caller's job; acquisition failures here leave no
    /// partial directory behind because the copy is the last step.
    pub async fn install(&self, source: &str, name_override: Option<&str>) -> Result<PathBuf> {
        let acquired = self.acquire(source, name_override).await?;
        let name = dir_name(&acquired.target)?;
        record_install(
            &self.manifest_path,
            &name,
            ManifestEntry::now(source, acquired.github_url, acquired.module_path),
        )?;
        info!("installed '{name}' from {source} -> {}", acquired.target.display());
        Ok(acquired.target)
    }

    /// Remove a module from the user-global store. Returns false when the
    /// store has no module of that name.
    pub fn uninstall(&self, name: &str) -> Result<bool> {
        let target = self.store_dir.join(name);
        if !target.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&target)?;
        remove_entry(&self.manifest_path, name)?;
        info!("uninstalled '{name}'");
        Ok(true)
    }

    async fn acquire(&self, source: &str, name_override: Option<&str>) -> Result<Acquired> {
        if let Some(name) = source.strip_prefix("registry:") {
            return self.acquire_from_registry(name, name_override).await;
        }
        if is_direct_source(source) {
            return self.acquire_direct(source, name_override).await;
        }
        // Unrecognized: registry first, then local path. Both attempts and
        // both failure messages stay inspectable.
        match self.acquire_from_registry(source, name_override).await {
            Ok(acquired) => Ok(acquired),
            Err(registry_err) => self
                .acquire_local(Path::new(source), name_override)
                .map_err(|local_err| {
                    Error::acquisition(format!(
                        "'{source}' matched no source prefix; registry lookup failed \
                         ({registry_err}); local-path fallback failed ({local_err})"
                    ))
                }),
        }
    }

    /// Dispatch for sources that name their mechanism. Registry indirection
    /// never reaches here, so this cannot recurse.
    async fn acquire_direct(&self, source: &str, name_override: Option<&str>) -> Result<Acquired> {
        if let Some(path) = source.strip_prefix("local:") {
            self.acquire_local(&expand_tilde(path), name_override)
        } else if source.starts_with("github:") || source.starts_with("git+") {
            self.acquire_git(source, name_override).await
        } else if source.starts_with("https://github.com") {
            self.acquire_archive(source, name_override).await
        } else if source.starts_with('/') || source.starts_with("./") || source.starts_with("..") {
            self.acquire_local(Path::new(source), name_override)
        } else {
            Err(Error::acquisition(format!("unsupported source: {source}")))
        }
    }

    fn acquire_local(&self, path: &Path, name_override: Option<&str>) -> Result<Acquired> {
        if !path.exists() {
            return Err(Error::not_found(format!("source path {}", path.display())));
        }
        if !is_module_dir(path) {
            return Err(Error::not_found(format!(
                "no module descriptor (module.yaml, MODULE.md, or module.md) in {}",
                path.display()
            )));
        }
        let name = match name_override {
            Some(n) => n.to_string(),
            None => dir_name(path)?,
        };
        let target = self.copy_into_store(path, &name)?;
        Ok(Acquired { target, github_url: None, module_path: None })
    }

    async fn acquire_from_registry(
        &self,
        name: &str,
        name_override: Option<&str>,
    ) -> Result<Acquired> {
        let entry = self.registry.resolve(name).await?;
        info!("registry resolved '{name}' -> {}", entry.source);
        if entry.source.starts_with("registry:") {
            return Err(Error::acquisition(format!(
                "registry entry '{name}' points back into the registry"
            )));
        }
        let target_name = name_override.unwrap_or(name);
        self.acquire_direct(&entry.source, Some(target_name)).await
    }

    async fn acquire_git(&self, source: &str, name_override: Option<&str>) -> Result<Acquired> {
        let (url, subdir) = parse_git_source(source)?;

        let scratch = TempDir::new()?;
        let checkout = scratch.path().join("repo");
        shallow_clone(&url, &checkout).await?;

        let module_src = match subdir.as_deref() {
            Some(rel) => checkout.join(rel),
            None => checkout.clone(),
        };
        if !module_src.exists() {
            return Err(Error::not_found(format!(
                "subdir '{}' in {url}",
                subdir.as_deref().unwrap_or("")
            )));
        }
        if !is_module_dir(&module_src) {
            return Err(Error::not_found(format!(
                "no module descriptor under '{}' in {url}",
                subdir.as_deref().unwrap_or(".")
            )));
        }

        let name = match name_override {
            Some(n) => n.to_string(),
            None => dir_name(&module_src)?,
        };
        let target = self.copy_into_store(&module_src, &name)?;
        Ok(Acquired {
            target,
            github_url: Some(url),
            module_path: subdir,
        })
        // scratch dropped here: the checkout is removed on every exit path
    }

    async fn acquire_archive(&self, source: &str, name_override: Option<&str>) -> Result<Acquired> {
        let (org, repo, module_path) = parse_github_url(source)?;

        let scratch = TempDir::new()?;
        let extracted_root = self.download_and_extract(&org, &repo, scratch.path()).await?;
        let module_src = resolve_in_archive(&extracted_root, module_path.as_deref())?;

        let name = match name_override {
            Some(n) => n.to_string(),
            None => dir_name(&module_src)?,
        };
        let target = self.copy_into_store(&module_src, &name)?;
        Ok(Acquired {
            target,
            github_url: Some(format!("https://github.com/{org}/{repo}")),
            module_path,
        })
    }

    /// Download a branch tarball (`main`, then `master` on 404) and unpack
    /// it under `scratch`. Returns the extracted repository root.
    async fn download_and_extract(&self, org: &str, repo: &str, scratch: &Path) -> Result<PathBuf> {
        for branch in ["main", "master"] {
            let url =
                format!("https://github.com/{org}/{repo}/archive/refs/heads/{branch}.tar.gz");
            debug!("downloading {url}");
            let response = self
                .client
                .get(&url)
                .timeout(DOWNLOAD_TIMEOUT)
                .send()
                .await
                .map_err(|e| Error::acquisition(format!("archive download failed: {e}")))?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            if !response.status().is_success() {
                return Err(Error::acquisition(format!(
                    "archive download returned {} for {url}",
                    response.status()
                )));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::acquisition(format!("archive download failed: {e}")))?;

            tar::Archive::new(GzDecoder::new(bytes.as_ref()))
                .unpack(scratch)
                .map_err(|e| Error::acquisition(format!("archive extraction failed: {e}")))?;

            // GitHub tarballs unpack to a single <repo>-<branch> directory.
            let root = std::fs::read_dir(scratch)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .find(|p| p.is_dir())
                .ok_or_else(|| Error::acquisition("archive contained no directory".to_string()))?;
            return Ok(root);
        }
        Err(Error::acquisition(format!(
            "no branch archive found for {org}/{repo} (tried main, master)"
        )))
    }

    /// Recursive copy into the store under `name`, replacing any prior
    /// directory of that name in full.
    fn copy_into_store(&self, src: &Path, name: &str) -> Result<PathBuf> {
        let target = self.store_dir.join(name);
        if target.exists() {
            std::fs::remove_dir_all(&target)?;
        }
        copy_tree(src, &target)?;
        Ok(target)
    }
}

fn is_direct_source(source: &str) -> bool {
    source.starts_with("local:")
        || source.starts_with("github:")
        || source.starts_with("git+")
        || source.starts_with("https://github.com")
        || source.starts_with('/')
        || source.starts_with("./")
        || source.starts_with("..")
}

/// Resolve the module directory inside an extracted archive, probing the
/// conventional nesting depths in order. Without a module path the
/// extracted root itself must be a valid module.
fn resolve_in_archive(root: &Path, module_path: Option<&str>) -> Result<PathBuf> {
    let Some(rel) = module_path else {
        if is_module_dir(root) {
            return Ok(root.to_path_buf());
        }
        return Err(Error::not_found(
            "extracted repository root is not a module and no module path was given".to_string(),
        ));
    };

    for prefix in ARCHIVE_PROBE_PREFIXES {
        let candidate = if prefix.is_empty() {
            root.join(rel)
        } else {
            root.join(prefix).join(rel)
        };
        if is_module_dir(&candidate) {
            return Ok(candidate);
        }
    }
    Err(Error::not_found(format!(
        "module '{rel}' at any conventional depth in the extracted archive"
    )))
}

/// Parse `github:org/repo[/subpath]` and `git+<url>[#subdir=<path>]` into a
/// clone URL plus optional subdirectory.
fn parse_git_source(source: &str) -> Result<(String, Option<String>)> {
    if let Some(rest) = source.strip_prefix("github:") {
        let mut parts = rest.splitn(3, '/');
        let (Some(org), Some(repo)) = (parts.next(), parts.next()) else {
            return Err(Error::acquisition(format!(
                "invalid github source '{source}' (expected github:org/repo[/path])"
            )));
        };
        if org.is_empty() || repo.is_empty() {
            return Err(Error::acquisition(format!(
                "invalid github source '{source}' (expected github:org/repo[/path])"
            )));
        }
        let subdir = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        return Ok((format!("https://github.com/{org}/{repo}.git"), subdir));
    }

    if let Some(rest) = source.strip_prefix("git+") {
        let (url, fragment) = match rest.split_once('#') {
            Some((url, fragment)) => (url, Some(fragment)),
            None => (rest, None),
        };
        let subdir = fragment.and_then(|f| {
            f.split('&')
                .find_map(|part| part.strip_prefix("subdir="))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        });
        return Ok((url.to_string(), subdir));
    }

    Err(Error::acquisition(format!("not a git source: {source}")))
}

/// Parse `https://github.com/org/repo[/path/to/module]`.
fn parse_github_url(url: &str) -> Result<(String, String, Option<String>)> {
    let rest = url
        .strip_prefix("https://github.com/")
        .ok_or_else(|| Error::acquisition(format!("not a github URL: {url}")))?;
    let mut parts = rest.trim_end_matches('/').splitn(3, '/');
    let (Some(org), Some(repo)) = (parts.next(), parts.next()) else {
        return Err(Error::acquisition(format!(
            "invalid github URL '{url}' (expected https://github.com/org/repo[/path])"
        )));
    };
    if org.is_empty() || repo.is_empty() {
        return Err(Error::acquisition(format!(
            "invalid github URL '{url}' (expected https://github.com/org/repo[/path])"
        )));
    }
    let module_path = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    Ok((
        org.to_string(),
        repo.trim_end_matches(".git").to_string(),
        module_path,
    ))
}

async fn shallow_clone(url: &str, dest: &Path) -> Result<()> {
    debug!("shallow clone {url}");
    let output = Command::new("git")
        .args(["clone", "--depth", "1"])
        .arg(url)
        .arg(dest)
        .output()
        .await
        .map_err(|e| Error::acquisition(format!("failed to run git: {e}")))?;
    if !output.status.success() {
        return Err(Error::acquisition(format!(
            "git clone failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry.map_err(|e| Error::acquisition(format!("copy failed: {e}")))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| Error::acquisition("walked outside the copy root".to_string()))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn dir_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::acquisition(format!("no directory name in {}", path.display())))
}
