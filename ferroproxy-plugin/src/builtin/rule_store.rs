//! Firewall rule persistence
//!
//! Rules are stored as TOML, one table per rule under a top-level `rules`
//! array, in evaluation order:
//!
//! ```toml
//! [[rules]]
//! action = "deny"
//! domain = "example.org"
//!
//! [[rules]]
//! action = "allow"
//! src_ip = "10.0.0.0/8"
//! dst_port = 443
//! ```

use super::firewall::{Firewall, Rule};
use crate::traits::*;
use async_trait::async_trait;
use ferroproxy_common::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// A condition value as written in the file; every variant is read back as text
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RuleDocument {
    #[serde(default)]
    rules: Vec<BTreeMap<String, Scalar>>,
}

#[derive(Debug, Serialize)]
struct RuleDocumentOut {
    rules: Vec<BTreeMap<String, String>>,
}

/// Location of a persisted rule list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFile {
    path: PathBuf,
}

impl RuleFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<Rule>> {
        load_rules(&self.path)
    }

    pub fn save(&self, rules: &[Rule]) -> Result<()> {
        save_rules(&self.path, rules)
    }
}

/// Read a rule list; an empty document yields no rules.
pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let text = std::fs::read_to_string(path)?;
    parse_rules(&text)
}

pub fn parse_rules(text: &str) -> Result<Vec<Rule>> {
    let document: RuleDocument =
        toml::from_str(text).map_err(|e| ProxyError::Persistence(e.to_string()))?;

    document
        .rules
        .into_iter()
        .enumerate()
        .map(|(index, table)| {
            Rule::from_pairs(table.into_iter().map(|(k, v)| (k, v.to_string())))
                .map_err(|e| ProxyError::Persistence(format!("rule {index}: {e}")))
        })
        .collect()
}

pub fn render_rules_toml(rules: &[Rule]) -> Result<String> {
    let document = RuleDocumentOut {
        rules: rules
            .iter()
            .map(|rule| {
                let mut table = rule.conditions().clone();
                table.insert("action".to_string(), rule.action().to_string());
                table
            })
            .collect(),
    };
    toml::to_string(&document).map_err(|e| ProxyError::Persistence(e.to_string()))
}

pub fn save_rules(path: &Path, rules: &[Rule]) -> Result<()> {
    let text = render_rules_toml(rules)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Loads the firewall's rules on startup and exposes
/// `load-config`, `save-config` and `reset-config`.
pub struct RuleStorePlugin {
    firewall: Firewall,
    file: RuleFile,
}

impl RuleStorePlugin {
    pub fn new(firewall: Firewall, file: RuleFile) -> Self {
        Self { firewall, file }
    }

    pub fn file(&self) -> &RuleFile {
        &self.file
    }
}

#[async_trait]
impl Plugin for RuleStorePlugin {
    fn name(&self) -> &str {
        "rule-store"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Persist firewall rules to TOML and restore them on startup"
    }

    fn requires(&self) -> &[&'static str] {
        &["firewall"]
    }

    async fn init(&mut self) -> std::result::Result<(), BoxError> {
        if !self.file.path().exists() {
            info!(path = %self.file.path().display(), "No rule file, starting with empty rules");
            return Ok(());
        }

        let rules = self.file.load()?;
        info!(
            path = %self.file.path().display(),
            rules = rules.len(),
            "Loaded firewall rules"
        );
        self.firewall.set_rules(rules);
        Ok(())
    }

    fn commands(&self) -> CommandTable {
        let mut table = CommandTable::new();

        let (firewall, default) = (self.firewall.clone(), self.file.clone());
        table.insert(
            "load-config".to_string(),
            command(move |args| {
                let file = args.first().map_or_else(|| default.clone(), RuleFile::new);
                Some(match file.load() {
                    Ok(rules) => {
                        firewall.set_rules(rules);
                        format!("Loaded firewall rules from {}", file.path().display())
                    }
                    Err(e) => format!("Failed to load config: {e}"),
                })
            }),
        );

        let (firewall, default) = (self.firewall.clone(), self.file.clone());
        table.insert(
            "save-config".to_string(),
            command(move |args| {
                let file = args.first().map_or_else(|| default.clone(), RuleFile::new);
                Some(match file.save(&firewall.get_rules()) {
                    Ok(()) => format!("Saved firewall rules to {}", file.path().display()),
                    Err(e) => format!("Failed to save config: {e}"),
                })
            }),
        );

        let firewall = self.firewall.clone();
        table.insert(
            "reset-config".to_string(),
            command(move |_| {
                firewall.clear_rules();
                Some("Cleared firewall rules".to_string())
            }),
        );

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::firewall::{Action, Field};
    use tempfile::TempDir;

    fn sample() -> Vec<Rule> {
        vec![
            Rule::deny().with("domain", "example.org"),
            Rule::allow()
                .with("src_ip", "10.0.0.0/8")
                .with("description", "office network"),
            Rule::deny(),
        ]
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.toml");

        save_rules(&path, &sample()).unwrap();
        assert_eq!(load_rules(&path).unwrap(), sample());
    }

    #[test]
    fn test_scalars_are_stringified() {
        let rules = parse_rules(
            r#"
[[rules]]
action = "DENY"
dst_port = 8080
path = "/admin"

[[rules]]
method = "GET"
"#,
        )
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].action(), Action::Deny);
        assert_eq!(rules[0].get(Field::DstPort), Some("8080"));
        assert_eq!(rules[1].action(), Action::Allow);
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_rules("").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_action_rejected() {
        let err = parse_rules("[[rules]]\naction = \"block\"\n").unwrap_err();
        assert!(matches!(err, ProxyError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_init_loads_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.toml");
        save_rules(&path, &sample()).unwrap();

        let firewall = Firewall::new();
        let mut plugin = RuleStorePlugin::new(firewall.clone(), RuleFile::new(&path));
        plugin.init().await.unwrap();

        assert_eq!(firewall.get_rules(), sample());
    }

    #[tokio::test]
    async fn test_init_without_file_keeps_rules_empty() {
        let dir = TempDir::new().unwrap();
        let firewall = Firewall::new();
        let mut plugin =
            RuleStorePlugin::new(firewall.clone(), RuleFile::new(dir.path().join("absent.toml")));

        plugin.init().await.unwrap();
        assert!(firewall.is_empty());
    }

    #[test]
    fn test_commands() {
        let dir = TempDir::new().unwrap();
        let default = dir.path().join("rules.toml");
        let other = dir.path().join("other.toml");

        let firewall = Firewall::with_rules(sample());
        let plugin = RuleStorePlugin::new(firewall.clone(), RuleFile::new(&default));
        let commands = plugin.commands();

        let out = commands["save-config"](&[]).unwrap();
        assert_eq!(out, format!("Saved firewall rules to {}", default.display()));

        let out = commands["reset-config"](&[]).unwrap();
        assert_eq!(out, "Cleared firewall rules");
        assert!(firewall.is_empty());

        let out = commands["load-config"](&[]).unwrap();
        assert!(out.starts_with("Loaded firewall rules from"));
        assert_eq!(firewall.get_rules(), sample());

        let out = commands["load-config"](&[other.display().to_string()]).unwrap();
        assert!(out.starts_with("Failed to load config:"));
        assert_eq!(firewall.len(), 3);
    }
}
