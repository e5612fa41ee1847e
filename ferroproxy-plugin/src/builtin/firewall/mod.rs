//! Ordered first-match firewall
//!
//! Rules are evaluated top to bottom; the first rule whose conditions all hold
//! decides the request. A request matched by no rule is allowed, so a
//! fail-closed policy needs an explicit trailing deny-all rule.

mod rule;

pub use rule::{Action, Field, InvalidAction, Rule};

use crate::traits::*;
use async_trait::async_trait;
use cidr::IpInet;
use ferroproxy_common::DEFAULT_HTTP_PORT;
use ferroproxy_protocol::HttpRequest;
use std::net::IpAddr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Outcome of evaluating the rule list against one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub action: Action,
    /// Index of the deciding rule, `None` when the default applied
    pub matched: Option<usize>,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        self.action == Action::Allow
    }
}

/// Shared handle to the rule list.
///
/// Clones refer to the same rules; the request path and the administration
/// commands all go through this one synchronized API.
#[derive(Debug, Clone, Default)]
pub struct Firewall {
    rules: Arc<RwLock<Vec<Rule>>>,
}

impl Firewall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules: Arc::new(RwLock::new(rules)),
        }
    }

    // Poisoning is ignored: every write leaves a complete rule list.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Rule>> {
        self.rules.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Rule>> {
        self.rules.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current rules
    pub fn get_rules(&self) -> Vec<Rule> {
        self.read().clone()
    }

    pub fn set_rules(&self, rules: Vec<Rule>) {
        *self.write() = rules;
    }

    /// Insert at `index` (clamped to the list length) or append.
    pub fn add_rule(&self, rule: Rule, index: Option<usize>) {
        let mut rules = self.write();
        match index {
            Some(index) => {
                let index = index.min(rules.len());
                rules.insert(index, rule);
            }
            None => rules.push(rule),
        }
    }

    /// Remove the rule at `index`; out-of-range indices are ignored.
    pub fn remove_rule(&self, index: usize) -> Option<Rule> {
        let mut rules = self.write();
        (index < rules.len()).then(|| rules.remove(index))
    }

    pub fn clear_rules(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn evaluate(&self, req: &HttpRequest) -> Verdict {
        let facts = RequestFacts::from_request(req);
        let rules = self.read();

        rules
            .iter()
            .position(|rule| facts.matches(rule))
            .map_or(
                Verdict {
                    action: Action::Allow,
                    matched: None,
                },
                |index| Verdict {
                    action: rules[index].action(),
                    matched: Some(index),
                },
            )
    }

    /// `show-firewall-rules` output
    pub fn render(&self) -> String {
        render_rules(&self.read())
    }
}

fn render_rules(rules: &[Rule]) -> String {
    if rules.is_empty() {
        return "No firewall rules configured.".to_string();
    }
    rules
        .iter()
        .enumerate()
        .map(|(index, rule)| format!("{index}: {rule}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Request attributes the conditions are evaluated against
struct RequestFacts<'a> {
    client_ip: IpAddr,
    client_port: u16,
    dest_host: Option<String>,
    dest_port: u16,
    protocol: &'static str,
    method: &'a str,
    path: &'a str,
}

impl<'a> RequestFacts<'a> {
    fn from_request(req: &'a HttpRequest) -> Self {
        let dest = req
            .header("host")
            .filter(|h| !h.trim().is_empty())
            .map(split_host_port);

        Self {
            client_ip: req.client().ip(),
            client_port: req.client().port(),
            dest_port: dest.as_ref().map_or(DEFAULT_HTTP_PORT, |(_, port)| *port),
            dest_host: dest.map(|(host, _)| host),
            protocol: if req.is_connect() { "tcp" } else { "http" },
            method: req.method(),
            path: req.path(),
        }
    }

    /// All present conditions must hold. A condition value that fails to
    /// parse makes the whole rule non-matching.
    fn matches(&self, rule: &Rule) -> bool {
        Field::ALL.into_iter().all(|field| match rule.get(field) {
            None => true,
            Some(value) => self.check(field, value),
        })
    }

    fn check(&self, field: Field, value: &str) -> bool {
        match field {
            Field::SrcIp => ip_in(self.client_ip, value),
            Field::DstIp => self
                .dest_host
                .as_deref()
                .and_then(|host| host.parse::<IpAddr>().ok())
                .is_some_and(|ip| ip_in(ip, value)),
            Field::Domain => self.dest_host.as_deref().is_some_and(|host| {
                let host = host.to_ascii_lowercase();
                let domain = value.to_ascii_lowercase();
                host == domain || host.ends_with(&format!(".{domain}"))
            }),
            Field::SrcPort => port_eq(self.client_port, value),
            Field::DstPort => port_eq(self.dest_port, value),
            Field::Protocol => self.protocol.eq_ignore_ascii_case(value.trim()),
            Field::Method => self.method.eq_ignore_ascii_case(value),
            Field::Path => self.path.starts_with(value),
        }
    }
}

/// Host and port as the rules see them.
///
/// The port is always stripped from the host, even when it does not parse;
/// an unparseable port counts as the default HTTP port.
fn split_host_port(header: &str) -> (String, u16) {
    let header = header.trim();
    let (host, port) = if let Some(rest) = header.strip_prefix('[') {
        match rest.split_once(']') {
            Some((host, after)) => (host, after.strip_prefix(':')),
            None => (rest, None),
        }
    } else if header.parse::<IpAddr>().is_ok() {
        (header, None)
    } else {
        match header.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (header, None),
        }
    };

    let port = port
        .and_then(|p| p.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_HTTP_PORT);
    (host.to_string(), port)
}

/// Membership in a single address or a CIDR network. Host bits in the
/// network are tolerated (`10.1.2.3/8` means `10.0.0.0/8`).
fn ip_in(ip: IpAddr, network: &str) -> bool {
    let network = network.trim();
    if network.contains('/') {
        network
            .parse::<IpInet>()
            .is_ok_and(|inet| inet.network().contains(&ip))
    } else {
        network.parse::<IpAddr>().is_ok_and(|addr| addr == ip)
    }
}

fn port_eq(port: u16, value: &str) -> bool {
    value.trim().parse::<u16>().is_ok_and(|p| p == port)
}

/// Firewall as a pipeline plugin
pub struct FirewallPlugin {
    firewall: Firewall,
}

impl FirewallPlugin {
    pub fn new(firewall: Firewall) -> Self {
        Self { firewall }
    }

    pub fn firewall(&self) -> &Firewall {
        &self.firewall
    }
}

#[async_trait]
impl Plugin for FirewallPlugin {
    fn name(&self) -> &str {
        "firewall"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Ordered first-match firewall"
    }

    async fn on_request(&self, req: &HttpRequest) -> Result<PluginAction, BoxError> {
        let verdict = self.firewall.evaluate(req);
        if verdict.is_allowed() {
            return Ok(PluginAction::Continue);
        }

        debug!(
            client = %req.client(),
            method = %req.method(),
            target = %req.path(),
            rule = ?verdict.matched,
            "Firewall denied request"
        );
        let reason = match verdict.matched {
            Some(index) => format!("denied by firewall rule {index}"),
            None => "denied by firewall".to_string(),
        };
        Ok(PluginAction::Deny { reason })
    }

    fn commands(&self) -> CommandTable {
        let firewall = self.firewall.clone();
        let mut table = CommandTable::new();
        table.insert(
            "show-firewall-rules".to_string(),
            command(move |_| Some(firewall.render())),
        );
        table
    }
}
