pub mod firewall;
pub mod logger;
pub mod rule_store;
pub mod shell;

pub use firewall::{Action, Field, Firewall, FirewallPlugin, Rule, Verdict};
pub use logger::AccessLogPlugin;
pub use rule_store::{RuleFile, RuleStorePlugin};
pub use shell::{FirewallShell, FirewallShellPlugin};
