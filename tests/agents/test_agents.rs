//! Tests for agent definition loading
//!
//! Directory scanning, project precedence and loader caching

use agent_gateway::agents::{AGENTS_SUBDIR, AgentCatalog, AgentLoader};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_agent(dir: &Path, file: &str, name: &str, body: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join(file),
        format!("---\nname: {name}\ndescription: {name} agent\ntools: [Read, Grep]\n---\n{body}\n"),
    )
    .unwrap();
}

#[test]
fn test_loader_reads_markdown_and_skips_invalid() {
    let dir = TempDir::new().unwrap();
    write_agent(dir.path(), "b.md", "writer", "You write.");
    write_agent(dir.path(), "a.md", "reviewer", "You review.");
    fs::write(dir.path().join("broken.md"), "no frontmatter here").unwrap();
    fs::write(dir.path().join("notes.txt"), "---\nname: ignored\n---\nx\n").unwrap();

    let loader = AgentLoader::load(dir.path());
    assert_eq!(loader.len(), 2);
    assert_eq!(
        loader.list().keys().cloned().collect::<Vec<_>>(),
        vec!["reviewer".to_string(), "writer".to_string()]
    );

    let reviewer = loader.get("reviewer").unwrap();
    assert_eq!(reviewer.system_prompt, "You review.");
    assert_eq!(reviewer.tools, Some(serde_json::json!(["Read", "Grep"])));
    assert!(loader.get("ignored").is_none());
}

#[test]
fn test_missing_directory_is_empty() {
    let dir = TempDir::new().unwrap();
    let loader = AgentLoader::load(dir.path().join("nope"));
    assert!(loader.is_empty());
}

#[test]
fn test_project_agents_take_precedence() {
    let project = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    let catalog = AgentCatalog::with_default_dir(home.path());

    assert_eq!(catalog.resolve_dir(None), home.path());
    assert_eq!(catalog.resolve_dir(Some(project.path())), project.path());

    write_agent(&project.path().join(AGENTS_SUBDIR), "local.md", "local", "Local.");
    assert_eq!(
        catalog.resolve_dir(Some(project.path())),
        project.path().join(AGENTS_SUBDIR)
    );
    assert!(catalog.loader(Some(project.path())).get("local").is_some());
}

#[test]
fn test_loaders_are_cached_until_cleared() {
    let home = TempDir::new().unwrap();
    write_agent(home.path(), "one.md", "one", "First.");
    let catalog = AgentCatalog::with_default_dir(home.path());

    let first = catalog.loader(None);
    assert_eq!(first.len(), 1);

    write_agent(home.path(), "two.md", "two", "Second.");
    assert_eq!(catalog.loader(None).len(), 1);

    catalog.clear();
    assert_eq!(catalog.loader(None).len(), 2);
}
