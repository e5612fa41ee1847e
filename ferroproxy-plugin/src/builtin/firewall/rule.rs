use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// What happens to a request matched by a rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Action {
    #[default]
    Allow,
    Deny,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("action must be 'allow' or 'deny', got '{0}'")]
pub struct InvalidAction(pub String);

impl FromStr for Action {
    type Err = InvalidAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Action::Allow),
            "deny" => Ok(Action::Deny),
            _ => Err(InvalidAction(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Allow => f.write_str("allow"),
            Action::Deny => f.write_str("deny"),
        }
    }
}

/// Conditions understood by the rule engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    SrcIp,
    DstIp,
    SrcPort,
    DstPort,
    Domain,
    Protocol,
    Method,
    Path,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::SrcIp,
        Field::DstIp,
        Field::SrcPort,
        Field::DstPort,
        Field::Domain,
        Field::Protocol,
        Field::Method,
        Field::Path,
    ];

    /// Keys accepted for this field, canonical name first, in lookup priority.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            Field::SrcIp => &["src_ip", "src", "source", "ip"],
            Field::DstIp => &["dst_ip", "dst", "dest", "destination"],
            Field::SrcPort => &["src_port", "sport", "source_port"],
            Field::DstPort => &["dst_port", "port", "dest_port"],
            Field::Domain => &["domain", "host"],
            Field::Protocol => &["protocol", "proto"],
            Field::Method => &["method"],
            Field::Path => &["path"],
        }
    }

    pub fn canonical(self) -> &'static str {
        self.keys()[0]
    }

    /// Map a key or alias (any case) to its field.
    pub fn from_key(key: &str) -> Option<Field> {
        let key = key.to_ascii_lowercase();
        Field::ALL
            .into_iter()
            .find(|field| field.keys().contains(&key.as_str()))
    }
}

/// A firewall rule: an action plus a set of `key=value` conditions.
///
/// Keys are stored as given so that persisted rules round-trip unchanged;
/// aliases are resolved at match time. Keys that name no [`Field`] (such as
/// `description`) are kept but never evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    action: Action,
    conditions: BTreeMap<String, String>,
}

impl Rule {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            conditions: BTreeMap::new(),
        }
    }

    pub fn allow() -> Self {
        Self::new(Action::Allow)
    }

    pub fn deny() -> Self {
        Self::new(Action::Deny)
    }

    /// Builder-style condition insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.conditions.insert(key.into(), value.into());
    }

    /// Build a rule from raw `key → value` pairs. An `action` key sets the
    /// action; an absent action means allow.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, InvalidAction>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut rule = Rule::default();
        for (key, value) in pairs {
            let key = key.into();
            let value = value.into();
            if key.eq_ignore_ascii_case("action") {
                rule.action = value.parse()?;
            } else {
                rule.conditions.insert(key, value);
            }
        }
        Ok(rule)
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn conditions(&self) -> &BTreeMap<String, String> {
        &self.conditions
    }

    /// Effective value of a field: the first non-empty value among its keys.
    pub fn get(&self, field: Field) -> Option<&str> {
        field
            .keys()
            .iter()
            .filter_map(|key| self.conditions.get(*key))
            .map(String::as_str)
            .find(|value| !value.is_empty())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action={}", self.action)?;
        for (key, value) in &self.conditions {
            write!(f, ", {key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() {
        assert_eq!("ALLOW".parse::<Action>(), Ok(Action::Allow));
        assert_eq!(" deny ".parse::<Action>(), Ok(Action::Deny));
        assert!("drop".parse::<Action>().is_err());
    }

    #[test]
    fn test_field_aliases() {
        assert_eq!(Field::from_key("SOURCE"), Some(Field::SrcIp));
        assert_eq!(Field::from_key("port"), Some(Field::DstPort));
        assert_eq!(Field::from_key("host"), Some(Field::Domain));
        assert_eq!(Field::from_key("proto"), Some(Field::Protocol));
        assert_eq!(Field::from_key("description"), None);
        assert_eq!(Field::DstIp.canonical(), "dst_ip");
    }

    #[test]
    fn test_canonical_key_wins_over_alias() {
        let rule = Rule::deny().with("src", "10.0.0.1").with("src_ip", "10.0.0.2");
        assert_eq!(rule.get(Field::SrcIp), Some("10.0.0.2"));
    }

    #[test]
    fn test_empty_value_is_absent() {
        let rule = Rule::deny().with("src_ip", "").with("ip", "10.0.0.1");
        assert_eq!(rule.get(Field::SrcIp), Some("10.0.0.1"));
        assert_eq!(Rule::deny().with("path", "").get(Field::Path), None);
    }

    #[test]
    fn test_from_pairs() {
        let rule = Rule::from_pairs([("action", "Deny"), ("domain", "example.org")]).unwrap();
        assert_eq!(rule.action(), Action::Deny);
        assert_eq!(rule.get(Field::Domain), Some("example.org"));

        let default = Rule::from_pairs([("method", "GET")]).unwrap();
        assert_eq!(default.action(), Action::Allow);

        assert!(Rule::from_pairs([("action", "maybe")]).is_err());
    }

    #[test]
    fn test_display() {
        let rule = Rule::deny().with("src_ip", "10.0.0.0/8").with("method", "GET");
        assert_eq!(rule.to_string(), "action=deny, method=GET, src_ip=10.0.0.0/8");
    }
}
