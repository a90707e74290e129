//! DNS overrides: dial a fixed address instead of resolving the URL host.
//!
//! The URL, and with it the `Host` header and TLS server name, stay
//! untouched. Only the address the transport connects to changes.

use std::fmt;

/// Address to dial. Without a port the URL's port is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    Host(String),
    HostPort { host: String, port: u16 },
}

impl ConnectTarget {
    pub fn host(&self) -> &str {
        match self {
            ConnectTarget::Host(host) => host,
            ConnectTarget::HostPort { host, .. } => host,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            ConnectTarget::Host(_) => None,
            ConnectTarget::HostPort { port, .. } => Some(*port),
        }
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectTarget::Host(host) => f.write_str(host),
            ConnectTarget::HostPort { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

impl From<&str> for ConnectTarget {
    fn from(host: &str) -> Self {
        ConnectTarget::Host(host.to_string())
    }
}

impl From<String> for ConnectTarget {
    fn from(host: String) -> Self {
        ConnectTarget::Host(host)
    }
}

impl From<(&str, u16)> for ConnectTarget {
    fn from((host, port): (&str, u16)) -> Self {
        ConnectTarget::HostPort {
            host: host.to_string(),
            port,
        }
    }
}

/// Per-host entry of a [`ConnectOverride::PerHost`] map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectRule {
    Target(ConnectTarget),
    /// Resolve this host normally even when a `*` entry exists.
    NoOverride,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOverride {
    /// Every host goes to this target.
    All(ConnectTarget),
    /// Exact hostnames first, then the `*` wildcard.
    PerHost(Vec<(String, ConnectRule)>),
}

impl ConnectOverride {
    pub fn per_host() -> Self {
        ConnectOverride::PerHost(Vec::new())
    }

    /// Add or replace the rule for `hostname`. Use `"*"` for the wildcard.
    pub fn map(self, hostname: &str, target: impl Into<ConnectTarget>) -> Self {
        self.rule(hostname, ConnectRule::Target(target.into()))
    }

    pub fn skip(self, hostname: &str) -> Self {
        self.rule(hostname, ConnectRule::NoOverride)
    }

    fn rule(self, hostname: &str, rule: ConnectRule) -> Self {
        let mut rules = match self {
            ConnectOverride::PerHost(rules) => rules,
            ConnectOverride::All(target) => vec![("*".to_string(), ConnectRule::Target(target))],
        };
        let hostname = hostname.to_ascii_lowercase();
        match rules.iter_mut().find(|(host, _)| *host == hostname) {
            Some(entry) => entry.1 = rule,
            None => rules.push((hostname, rule)),
        }
        ConnectOverride::PerHost(rules)
    }

    /// Target for `hostname`, or `None` to resolve it normally.
    pub fn resolve(&self, hostname: &str) -> Option<&ConnectTarget> {
        match self {
            ConnectOverride::All(target) => Some(target),
            ConnectOverride::PerHost(rules) => {
                let lookup = |name: &str| {
                    rules
                        .iter()
                        .find(|(host, _)| host.eq_ignore_ascii_case(name))
                        .map(|(_, rule)| rule)
                };
                match lookup(hostname).or_else(|| lookup("*"))? {
                    ConnectRule::Target(target) => Some(target),
                    ConnectRule::NoOverride => None,
                }
            }
        }
    }
}

impl From<&str> for ConnectOverride {
    fn from(host: &str) -> Self {
        ConnectOverride::All(host.into())
    }
}

impl From<ConnectTarget> for ConnectOverride {
    fn from(target: ConnectTarget) -> Self {
        ConnectOverride::All(target)
    }
}
