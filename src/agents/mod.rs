//! Agent definitions loaded from markdown files
//!
//! Each `*.md` file in an agents directory starts with a YAML frontmatter
//! block followed by the agent's system prompt:
//!
//! ```text
//! ---
//! name: reviewer
//! description: Reviews diffs
//! tools: Read, Grep
//! ---
//! You review code.
//! ```
//!
//! Loaders are cached per working directory; a project's `.claude/agents`
//! takes precedence over the directory itself.

use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{GatewayError, Result};

/// Agents directory relative to a project or the home directory
pub const AGENTS_SUBDIR: &str = ".claude/agents";

#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tools: Option<serde_yaml::Value>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

/// One agent definition
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDefinition {
    /// Agent name
    pub name: String,
    /// Short description
    pub description: String,
    /// System prompt body
    pub system_prompt: String,
    /// Allowed-tools hint, as written
    pub tools: Option<serde_json::Value>,
    /// Model hint
    pub model: Option<String>,
    /// Display color hint
    pub color: Option<String>,
}

impl AgentDefinition {
    /// Parse a definition file's contents
    ///
    /// # Errors
    /// Returns error if the frontmatter is missing or invalid, or if the
    /// definition has no name or no body
    pub fn parse(content: &str) -> Result<Self> {
        let (yaml, body) = split_frontmatter(content)
            .ok_or_else(|| GatewayError::invalid_config("No frontmatter found"))?;

        let meta: Frontmatter = if yaml.trim().is_empty() {
            Frontmatter::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| GatewayError::invalid_config(format!("Invalid frontmatter: {e}")))?
        };

        let name = meta
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| GatewayError::invalid_config("Missing 'name' field"))?;

        let system_prompt = body.trim().to_string();
        if system_prompt.is_empty() {
            return Err(GatewayError::invalid_config(format!(
                "Agent {name} has no system prompt content"
            )));
        }

        let tools = meta
            .tools
            .filter(|t| !t.is_null())
            .and_then(|t| serde_json::to_value(t).ok());

        Ok(Self {
            name,
            description: meta.description.unwrap_or_default(),
            system_prompt,
            tools,
            model: meta.model,
            color: meta.color,
        })
    }

    /// JSON summary; the prompt and its length are included on request
    #[must_use]
    pub fn summary(&self, include_prompt: bool) -> serde_json::Value {
        let mut value = serde_json::json!({
            "name": self.name,
            "description": self.description,
            "tools": self.tools,
            "model": self.model,
            "color": self.color,
        });
        if include_prompt {
            value["system_prompt"] = serde_json::json!(self.system_prompt);
            value["system_prompt_length"] = serde_json::json!(self.system_prompt.chars().count());
        }
        value
    }
}

fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let rest = content.strip_prefix("---\n")?;
    if let Some(body) = rest.strip_prefix("---\n") {
        return Some(("", body));
    }
    let end = rest.find("\n---\n")?;
    Some((&rest[..end], &rest[end + 5..]))
}

/// Agent definitions of one directory
#[derive(Debug, Clone)]
pub struct AgentLoader {
    agents_dir: PathBuf,
    agents: BTreeMap<String, AgentDefinition>,
}

impl AgentLoader {
    /// Load every definition in `agents_dir`.
    ///
    /// A missing directory yields an empty loader; unreadable or invalid
    /// files are skipped with a warning.
    #[must_use]
    pub fn load(agents_dir: impl Into<PathBuf>) -> Self {
        let agents_dir = agents_dir.into();
        let mut agents = BTreeMap::new();

        let entries = match std::fs::read_dir(&agents_dir) {
            Ok(entries) => entries,
            Err(_) => {
                log::warn!("Agents directory not found: {}", agents_dir.display());
                return Self { agents_dir, agents };
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
            .collect();
        files.sort();

        for path in files {
            let parsed = std::fs::read_to_string(&path)
                .map_err(GatewayError::from)
                .and_then(|content| AgentDefinition::parse(&content));
            match parsed {
                Ok(agent) => {
                    log::debug!("Loaded agent: {}", agent.name);
                    agents.insert(agent.name.clone(), agent);
                }
                Err(e) => log::warn!("Skipping agent file {}: {e}", path.display()),
            }
        }

        log::info!(
            "Loaded {} agents from {}",
            agents.len(),
            agents_dir.display()
        );
        Self { agents_dir, agents }
    }

    /// Directory the definitions came from
    #[must_use]
    pub fn agents_dir(&self) -> &Path {
        &self.agents_dir
    }

    /// All definitions, by name
    #[must_use]
    pub fn list(&self) -> &BTreeMap<String, AgentDefinition> {
        &self.agents
    }

    /// One definition by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.get(name)
    }

    /// Number of definitions
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no definitions were loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Loaders cached per working directory
pub struct AgentCatalog {
    default_dir: PathBuf,
    loaders: Mutex<HashMap<PathBuf, Arc<AgentLoader>>>,
}

impl AgentCatalog {
    /// Catalog whose default directory is `~/.claude/agents`
    #[must_use]
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_default_dir(home.join(AGENTS_SUBDIR))
    }

    /// Catalog with an explicit default directory
    pub fn with_default_dir(default_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
            loaders: Mutex::new(HashMap::new()),
        }
    }

    /// Directory consulted for `working_directory`
    #[must_use]
    pub fn resolve_dir(&self, working_directory: Option<&Path>) -> PathBuf {
        match working_directory {
            None => self.default_dir.clone(),
            Some(dir) => {
                let project = dir.join(AGENTS_SUBDIR);
                if project.is_dir() {
                    project
                } else {
                    dir.to_path_buf()
                }
            }
        }
    }

    /// Loader for `working_directory`, loading it on first use
    #[must_use]
    pub fn loader(&self, working_directory: Option<&Path>) -> Arc<AgentLoader> {
        let key = working_directory.map_or_else(|| self.default_dir.clone(), Path::to_path_buf);
        if let Some(loader) = self.loaders.lock().get(&key) {
            return loader.clone();
        }

        let loader = Arc::new(AgentLoader::load(self.resolve_dir(working_directory)));
        self.loaders
            .lock()
            .entry(key)
            .or_insert(loader)
            .clone()
    }

    /// Forget every cached loader
    pub fn clear(&self) {
        self.loaders.lock().clear();
    }
}

impl Default for AgentCatalog {
    fn default() -> Self {
        Self::new()
    }
}
