//! Integration tests for the store: loader, resolver, installer, registry.

use cogmod_core::{Location, LocationClass, ResolverConfig};
use cogmod_store::{
    load_descriptor, read_manifest, DescriptorFormat, Installer, RegistryClient, Resolver,
};
use std::path::{Path, PathBuf};

const INPUT_SCHEMA: &str = r#"{
  "type": "object",
  "properties": { "text": { "type": "string" } },
  "required": ["text"]
}"#;

const OUTPUT_SCHEMA: &str = r#"{
  "type": "object",
  "properties": { "result": { "type": "object" }, "confidence": { "type": "number" } },
  "required": ["result", "confidence"]
}"#;

const CONSTRAINTS: &str = "operational:\n  stateless: true\n  single_responsibility: true\nconfidence_thresholds:\n  minimum_viable: 0.7\n";

/// Lay down a complete module fixture in the requested descriptor format.
fn write_module(parent: &Path, name: &str, format: DescriptorFormat) -> PathBuf {
    let dir = parent.join(name);
    std::fs::create_dir_all(dir.join("examples")).unwrap();

    let meta_yaml = format!(
        "name: {name}\nversion: 1.2.0\nresponsibility: Summarize things\nexcludes:\n  - translation\n"
    );
    match format {
        DescriptorFormat::V2 => {
            std::fs::write(dir.join("module.yaml"), &meta_yaml).unwrap();
        }
        DescriptorFormat::V1 => {
            std::fs::write(
                dir.join("MODULE.md"),
                format!("---\n{meta_yaml}---\n\n# {name}\n\nDocs body.\n"),
            )
            .unwrap();
        }
        DescriptorFormat::V0 => {
            std::fs::write(
                dir.join("module.md"),
                format!("---\n{meta_yaml}---\n\n# {name}\n\nDocs body.\n"),
            )
            .unwrap();
        }
    }

    std::fs::write(dir.join("input.schema.json"), INPUT_SCHEMA).unwrap();
    std::fs::write(dir.join("output.schema.json"), OUTPUT_SCHEMA).unwrap();
    std::fs::write(dir.join("constraints.yaml"), CONSTRAINTS).unwrap();
    std::fs::write(dir.join("prompt.txt"), "You summarize text.\n").unwrap();
    std::fs::write(dir.join("examples/input.json"), r#"{"text": "hello"}"#).unwrap();
    std::fs::write(
        dir.join("examples/output.json"),
        r#"{"result": {"summary": "hi"}, "confidence": 0.9}"#,
    )
    .unwrap();
    dir
}

fn resolver_over(paths: &[&Path]) -> Resolver {
    let locations = paths
        .iter()
        .map(|p| Location {
            path: p.to_path_buf(),
            class: LocationClass::Injected,
        })
        .collect();
    Resolver::new(ResolverConfig { locations })
}

/// A registry client pointed at an unroutable address, so only the cache
/// (when present) can answer.
fn offline_registry(cache_path: &Path) -> RegistryClient {
    RegistryClient::new("http://127.0.0.1:1/registry.json").with_cache_path(cache_path)
}

// ==================== loader ====================

#[test]
fn all_three_descriptor_formats_load_equivalently() {
    let tmp = tempfile::tempdir().unwrap();
    for format in [DescriptorFormat::V2, DescriptorFormat::V1, DescriptorFormat::V0] {
        let name = format!("summarizer-{format}");
        let dir = write_module(tmp.path(), &name, format);
        let descriptor = load_descriptor(&dir).unwrap();

        assert_eq!(descriptor.format, format);
        assert_eq!(descriptor.name, name);
        assert_eq!(descriptor.meta.version, "1.2.0");
        assert_eq!(descriptor.meta.responsibility, "Summarize things");
        assert_eq!(descriptor.meta.excludes, vec!["translation"]);
        assert_eq!(descriptor.prompt, "You summarize text.\n");
        assert!((descriptor.min_viable_confidence() - 0.7).abs() < 1e-9);
        assert_eq!(descriptor.input_schema["required"][0], "text");
        assert_eq!(descriptor.example_input().unwrap()["text"], "hello");
    }
}

#[test]
fn module_yaml_wins_over_markdown_descriptors() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = write_module(tmp.path(), "both", DescriptorFormat::V0);
    std::fs::write(dir.join("module.yaml"), "name: both\nversion: 2.0.0\nresponsibility: r\n")
        .unwrap();

    let descriptor = load_descriptor(&dir).unwrap();
    assert_eq!(descriptor.format, DescriptorFormat::V2);
    assert_eq!(descriptor.meta.version, "2.0.0");
}

#[test]
fn unterminated_frontmatter_names_the_descriptor_file() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = write_module(tmp.path(), "broken", DescriptorFormat::V0);
    std::fs::write(dir.join("module.md"), "---\nname: broken\n").unwrap();

    let err = load_descriptor(&dir).unwrap_err();
    assert!(err.to_string().contains("module.md"), "got: {err}");
}

#[test]
fn missing_companion_file_names_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = write_module(tmp.path(), "partial", DescriptorFormat::V2);
    std::fs::remove_file(dir.join("output.schema.json")).unwrap();

    let err = load_descriptor(&dir).unwrap_err();
    assert!(err.to_string().contains("output.schema.json"), "got: {err}");
}

#[test]
fn invalid_schema_json_names_the_file() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = write_module(tmp.path(), "badschema", DescriptorFormat::V2);
    std::fs::write(dir.join("input.schema.json"), "{ not json").unwrap();

    let err = load_descriptor(&dir).unwrap_err();
    assert!(err.to_string().contains("input.schema.json"), "got: {err}");
}

// ==================== resolver ====================

#[test]
fn find_honors_search_path_order() {
    let high = tempfile::tempdir().unwrap();
    let low = tempfile::tempdir().unwrap();
    write_module(high.path(), "shadowed", DescriptorFormat::V2);
    write_module(low.path(), "shadowed", DescriptorFormat::V0);
    write_module(low.path(), "only-low", DescriptorFormat::V1);

    let resolver = resolver_over(&[high.path(), low.path()]);

    assert_eq!(
        resolver.find("shadowed").unwrap(),
        high.path().join("shadowed")
    );
    assert_eq!(
        resolver.find("only-low").unwrap(),
        low.path().join("only-low")
    );
    assert!(resolver.find("absent").is_none());
}

#[test]
fn list_all_dedupes_by_first_occurrence() {
    let high = tempfile::tempdir().unwrap();
    let low = tempfile::tempdir().unwrap();
    write_module(high.path(), "dup", DescriptorFormat::V2);
    write_module(low.path(), "dup", DescriptorFormat::V0);
    write_module(low.path(), "extra", DescriptorFormat::V1);
    // Non-module clutter is skipped, not an error.
    std::fs::create_dir(low.path().join("not-a-module")).unwrap();
    std::fs::write(low.path().join("stray.txt"), "x").unwrap();

    let resolver = resolver_over(&[high.path(), low.path()]);
    let all = resolver.list_all();

    assert_eq!(all.len(), 2);
    let dup = all.iter().find(|m| m.name == "dup").unwrap();
    assert_eq!(dup.format, DescriptorFormat::V2);
    assert_eq!(dup.path, high.path().join("dup"));
    assert!(all.iter().any(|m| m.name == "extra"));
}

// ==================== installer ====================

#[tokio::test]
async fn local_install_copies_and_records_provenance() {
    let src = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let module = write_module(src.path(), "mymod", DescriptorFormat::V2);
    let store = home.path().join("modules");
    let manifest = home.path().join("installed.json");

    let installer = offline_installer(&store, &manifest, home.path());
    let source = format!("local:{}", module.display());
    let target = installer.install(&source, None).await.unwrap();

    assert_eq!(target, store.join("mymod"));
    assert!(target.join("module.yaml").is_file());
    assert!(target.join("examples/output.json").is_file());

    let entries = read_manifest(&manifest);
    assert_eq!(entries["mymod"].source, source);
    assert!(entries["mymod"].github_url.is_none());
    assert!(!entries["mymod"].installed_at.is_empty());
}

#[tokio::test]
async fn reinstall_replaces_the_directory_wholesale() {
    let src = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let module = write_module(src.path(), "mymod", DescriptorFormat::V2);
    let store = home.path().join("modules");
    let manifest = home.path().join("installed.json");
    let installer = offline_installer(&store, &manifest, home.path());
    let source = format!("local:{}", module.display());

    installer.install(&source, None).await.unwrap();
    // A file present in the old install but absent from the new source must
    // not survive the reinstall.
    std::fs::write(store.join("mymod/stale.txt"), "old").unwrap();
    std::fs::remove_file(module.join("prompt.txt")).unwrap();
    std::fs::write(module.join("prompt.txt"), "Updated prompt.\n").unwrap();

    installer.install(&source, None).await.unwrap();
    assert!(!store.join("mymod/stale.txt").exists());
    assert_eq!(
        std::fs::read_to_string(store.join("mymod/prompt.txt")).unwrap(),
        "Updated prompt.\n"
    );
}

#[tokio::test]
async fn install_honors_name_override() {
    let src = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let module = write_module(src.path(), "upstream-name", DescriptorFormat::V2);
    let store = home.path().join("modules");
    let manifest = home.path().join("installed.json");
    let installer = offline_installer(&store, &manifest, home.path());

    let target = installer
        .install(&format!("local:{}", module.display()), Some("renamed"))
        .await
        .unwrap();

    assert_eq!(target, store.join("renamed"));
    assert!(read_manifest(&manifest).contains_key("renamed"));
}

#[tokio::test]
async fn local_install_rejects_non_module_directories() {
    let src = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let not_module = src.path().join("plain");
    std::fs::create_dir(&not_module).unwrap();
    std::fs::write(not_module.join("readme.txt"), "nope").unwrap();

    let installer = offline_installer(
        &home.path().join("modules"),
        &home.path().join("installed.json"),
        home.path(),
    );
    let err = installer
        .install(&format!("local:{}", not_module.display()), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("module"), "got: {err}");
    // Nothing landed in the store.
    assert!(!home.path().join("modules/plain").exists());
}

#[tokio::test]
async fn uninstall_removes_module_and_manifest_entry() {
    let src = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let module = write_module(src.path(), "mymod", DescriptorFormat::V2);
    let store = home.path().join("modules");
    let manifest = home.path().join("installed.json");
    let installer = offline_installer(&store, &manifest, home.path());

    installer
        .install(&format!("local:{}", module.display()), None)
        .await
        .unwrap();
    assert!(installer.uninstall("mymod").unwrap());
    assert!(!store.join("mymod").exists());
    assert!(!read_manifest(&manifest).contains_key("mymod"));

    // Second removal is a no-op, not an error.
    assert!(!installer.uninstall("mymod").unwrap());
}

#[tokio::test]
async fn incomplete_module_installs_then_rolls_back_cleanly() {
    // A descriptor alone is enough to acquire; callers that validate after
    // install roll back with uninstall, leaving neither directory nor
    // manifest entry behind.
    let src = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    let half = src.path().join("halfmod");
    std::fs::create_dir(&half).unwrap();
    std::fs::write(half.join("module.yaml"), "name: halfmod\nversion: 0.1.0\n").unwrap();

    let store = home.path().join("modules");
    let manifest = home.path().join("installed.json");
    let installer = offline_installer(&store, &manifest, home.path());

    let target = installer
        .install(&format!("local:{}", half.display()), None)
        .await
        .unwrap();
    assert!(target.is_dir());
    assert!(read_manifest(&manifest).contains_key("halfmod"));

    assert!(installer.uninstall("halfmod").unwrap());
    assert!(!target.exists());
    assert!(!read_manifest(&manifest).contains_key("halfmod"));
}

#[tokio::test]
async fn unrecognized_source_reports_both_fallback_failures() {
    let home = tempfile::tempdir().unwrap();
    let installer = offline_installer(
        &home.path().join("modules"),
        &home.path().join("installed.json"),
        home.path(),
    );

    let err = installer.install("no-such-thing", None).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("registry"), "got: {message}");
    assert!(message.contains("local"), "got: {message}");
}

fn offline_installer(store: &Path, manifest: &Path, home: &Path) -> Installer {
    Installer::new(offline_registry(&home.join("registry-cache.json")))
        .with_store_dir(store)
        .with_manifest_path(manifest)
}

// ==================== registry ====================

const REGISTRY_INDEX: &str = r#"{
  "modules": {
    "code-reviewer": {
      "description": "Reviews diffs for defects",
      "source": "github:acme/modules/code-reviewer",
      "version": "1.0.0"
    },
    "summarizer": {
      "description": "Summarizes long documents",
      "source": "local:/opt/mods/summarizer",
      "version": "0.3.1"
    }
  }
}"#;

#[tokio::test]
async fn registry_degrades_when_unreachable() {
    let home = tempfile::tempdir().unwrap();
    let client = offline_registry(&home.path().join("registry-cache.json"));

    let index = client.fetch(true).await;
    assert!(index.modules.is_empty());
    assert!(index.error.is_some());

    // Resolution folds the fetch failure into the NotFound message.
    let err = client.resolve("anything").await.unwrap_err();
    assert!(err.to_string().contains("registry"), "got: {err}");
}

#[tokio::test]
async fn cached_index_answers_without_the_network() {
    let home = tempfile::tempdir().unwrap();
    let cache = home.path().join("registry-cache.json");
    std::fs::write(&cache, REGISTRY_INDEX).unwrap();

    let client = offline_registry(&cache);
    let index = client.fetch(true).await;
    assert_eq!(index.modules.len(), 2);
    assert!(index.error.is_none());

    let entry = client.resolve("code-reviewer").await.unwrap();
    assert_eq!(entry.source, "github:acme/modules/code-reviewer");
}

#[tokio::test]
async fn corrupt_cache_falls_through_to_fetch() {
    let home = tempfile::tempdir().unwrap();
    let cache = home.path().join("registry-cache.json");
    std::fs::write(&cache, "{broken").unwrap();

    // The network is unreachable too, so the result is a degraded index
    // rather than a parse panic.
    let client = offline_registry(&cache);
    let index = client.fetch(true).await;
    assert!(index.modules.is_empty());
    assert!(index.error.is_some());
}

#[tokio::test]
async fn search_matches_names_and_descriptions_case_insensitively() {
    let home = tempfile::tempdir().unwrap();
    let cache = home.path().join("registry-cache.json");
    std::fs::write(&cache, REGISTRY_INDEX).unwrap();
    let client = offline_registry(&cache);

    let hits = client.search("REVIEW").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "code-reviewer");

    let hits = client.search("documents").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "summarizer");

    assert!(client.search("zzz").await.is_empty());
}
