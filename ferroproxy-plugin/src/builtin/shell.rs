//! Router-style administration commands for the firewall
//!
//! ```text
//! show rules
//! rule add deny src_ip=10.0.0.0/8 desc="office"
//! rule del 0
//! rule show 0
//! write memory
//! ```

use super::firewall::{Action, Field, Firewall, Rule};
use super::rule_store::RuleFile;
use crate::traits::*;
use async_trait::async_trait;

const RULE_USAGE: &str = "Usage: rule add <allow|deny> [key=value ...]\n       rule del <index>\n       rule show <index>";

/// Normalize a `rule add` key; `description` is kept as an annotation.
fn normalize_key(key: &str) -> Option<&'static str> {
    match key.to_ascii_lowercase().as_str() {
        "desc" | "description" => Some("description"),
        other => Field::from_key(other).map(Field::canonical),
    }
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_index(args: &[String]) -> Option<usize> {
    args.get(1)
        .filter(|a| !a.is_empty() && a.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|a| a.parse().ok())
}

/// Shell command handlers over a shared firewall handle
#[derive(Clone)]
pub struct FirewallShell {
    firewall: Firewall,
    store: Option<RuleFile>,
}

impl FirewallShell {
    pub fn new(firewall: Firewall, store: Option<RuleFile>) -> Self {
        Self { firewall, store }
    }

    pub fn show(&self, args: &[String]) -> String {
        match args.first().map(String::as_str) {
            Some("rules") => self.firewall.render(),
            _ => "Usage: show rules".to_string(),
        }
    }

    pub fn write(&self, args: &[String]) -> String {
        if !matches!(args.first().map(String::as_str), Some("memory" | "mem")) {
            return "Usage: write memory".to_string();
        }
        let Some(store) = &self.store else {
            return "Rule store not configured; cannot save".to_string();
        };
        match store.save(&self.firewall.get_rules()) {
            Ok(()) => format!("Firewall rules saved to {}", store.path().display()),
            Err(e) => format!("Failed to save config: {e}"),
        }
    }

    pub fn rule(&self, args: &[String]) -> String {
        let Some(subcommand) = args.first() else {
            return RULE_USAGE.to_string();
        };

        match subcommand.to_ascii_lowercase().as_str() {
            "add" => self.rule_add(&args[1..]),
            "del" | "remove" => {
                let Some(index) = parse_index(args) else {
                    return "Usage: rule del <index>".to_string();
                };
                match self.firewall.remove_rule(index) {
                    Some(_) => format!("Removed rule {index}."),
                    None => "Index out of range".to_string(),
                }
            }
            "show" => {
                let Some(index) = parse_index(args) else {
                    return "Usage: rule show <index>".to_string();
                };
                match self.firewall.get_rules().get(index) {
                    Some(rule) => format!("{index}: {rule}"),
                    None => "Index out of range".to_string(),
                }
            }
            other => format!("Unknown rule subcommand: {other}"),
        }
    }

    fn rule_add(&self, args: &[String]) -> String {
        let Some(action) = args.first() else {
            return "Usage: rule add <allow|deny> key=value ... (see 'help' for supported keys)"
                .to_string();
        };
        let Ok(action) = action.parse::<Action>() else {
            return "Action must be 'allow' or 'deny'".to_string();
        };

        let mut lines = Vec::new();
        let mut rule = Rule::new(action);
        for token in &args[1..] {
            let Some((key, value)) = token.split_once('=') else {
                lines.push(format!("Ignoring invalid token: {token}"));
                continue;
            };
            let Some(key) = normalize_key(key) else {
                lines.push(format!("Unknown key: {key}"));
                continue;
            };
            rule.insert(key, strip_quotes(value));
        }

        lines.push(format!("Rule added: {rule}"));
        self.firewall.add_rule(rule, None);
        lines.join("\n")
    }
}

/// Exposes [`FirewallShell`] through the command registry
pub struct FirewallShellPlugin {
    shell: FirewallShell,
}

impl FirewallShellPlugin {
    pub fn new(firewall: Firewall, store: Option<RuleFile>) -> Self {
        Self {
            shell: FirewallShell::new(firewall, store),
        }
    }
}

#[async_trait]
impl Plugin for FirewallShellPlugin {
    fn name(&self) -> &str {
        "firewall-shell"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Router-style commands for configuring the firewall"
    }

    fn requires(&self) -> &[&'static str] {
        &["firewall"]
    }

    fn commands(&self) -> CommandTable {
        let mut table = CommandTable::new();

        let shell = self.shell.clone();
        table.insert("show".into(), command(move |args| Some(shell.show(args))));
        let shell = self.shell.clone();
        table.insert("rule".into(), command(move |args| Some(shell.rule(args))));
        let shell = self.shell.clone();
        table.insert("write".into(), command(move |args| Some(shell.write(args))));

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::rule_store::load_rules;
    use tempfile::TempDir;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(ToString::to_string).collect()
    }

    #[test]
    fn test_rule_add_normalizes_keys() {
        let firewall = Firewall::new();
        let shell = FirewallShell::new(firewall.clone(), None);

        let out = shell.rule(&args("add DENY ip=10.0.0.0/8 HOST=example.org desc=\"lab\""));
        assert_eq!(
            out,
            "Rule added: action=deny, description=lab, domain=example.org, src_ip=10.0.0.0/8"
        );
        assert_eq!(firewall.len(), 1);
        assert_eq!(firewall.get_rules()[0].get(Field::SrcIp), Some("10.0.0.0/8"));
    }

    #[test]
    fn test_rule_add_reports_bad_tokens() {
        let firewall = Firewall::new();
        let shell = FirewallShell::new(firewall.clone(), None);

        let out = shell.rule(&args("add allow nonsense colour=red method=GET"));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Ignoring invalid token: nonsense");
        assert_eq!(lines[1], "Unknown key: colour");
        assert_eq!(lines[2], "Rule added: action=allow, method=GET");
    }

    #[test]
    fn test_rule_add_rejects_unknown_action() {
        let firewall = Firewall::new();
        let shell = FirewallShell::new(firewall.clone(), None);

        assert_eq!(
            shell.rule(&args("add block")),
            "Action must be 'allow' or 'deny'"
        );
        assert!(shell.rule(&args("add")).starts_with("Usage: rule add"));
        assert!(firewall.is_empty());
    }

    #[test]
    fn test_rule_del_and_show() {
        let firewall = Firewall::with_rules(vec![
            Rule::deny().with("method", "GET"),
            Rule::allow().with("method", "POST"),
        ]);
        let shell = FirewallShell::new(firewall.clone(), None);

        assert_eq!(shell.rule(&args("show 1")), "1: action=allow, method=POST");
        assert_eq!(shell.rule(&args("show 5")), "Index out of range");
        assert_eq!(shell.rule(&args("del x")), "Usage: rule del <index>");
        assert_eq!(shell.rule(&args("remove 0")), "Removed rule 0.");
        assert_eq!(shell.rule(&args("del 3")), "Index out of range");
        assert_eq!(shell.rule(&args("frobnicate")), "Unknown rule subcommand: frobnicate");
        assert_eq!(shell.rule(&[]), RULE_USAGE);
        assert_eq!(firewall.len(), 1);
    }

    #[test]
    fn test_show_rules() {
        let firewall = Firewall::new();
        let shell = FirewallShell::new(firewall.clone(), None);

        assert_eq!(shell.show(&args("rules")), "No firewall rules configured.");
        assert_eq!(shell.show(&[]), "Usage: show rules");

        firewall.add_rule(Rule::deny().with("path", "/admin"), None);
        assert_eq!(shell.show(&args("rules")), "0: action=deny, path=/admin");
    }

    #[test]
    fn test_write_memory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.toml");
        let firewall = Firewall::with_rules(vec![Rule::deny().with("domain", "example.org")]);

        let unsaved = FirewallShell::new(firewall.clone(), None);
        assert_eq!(
            unsaved.write(&args("memory")),
            "Rule store not configured; cannot save"
        );

        let shell = FirewallShell::new(firewall.clone(), Some(RuleFile::new(&path)));
        assert_eq!(shell.write(&args("disk")), "Usage: write memory");
        assert_eq!(
            shell.write(&args("mem")),
            format!("Firewall rules saved to {}", path.display())
        );
        assert_eq!(load_rules(&path).unwrap(), firewall.get_rules());
    }
}
