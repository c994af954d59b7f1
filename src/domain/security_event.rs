use serde::Serialize;
use std::fmt;

/// Classification of a suspicious request pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    PathTraversal,
    DotfileProbe,
    SqlInjectionAttempt,
    ScannerUserAgent,
    RepeatedAuthFailure,
}

impl SecurityEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityEventKind::PathTraversal => "path_traversal",
            SecurityEventKind::DotfileProbe => "dotfile_probe",
            SecurityEventKind::SqlInjectionAttempt => "sql_injection_attempt",
            SecurityEventKind::ScannerUserAgent => "scanner_user_agent",
            SecurityEventKind::RepeatedAuthFailure => "repeated_auth_failure",
        }
    }
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged detection result from inspecting one request.
///
/// Events are created, logged by the caller, and discarded within the same
/// request; this type is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    pub path: String,
    pub detail: String,
}

impl SecurityEvent {
    fn new(kind: SecurityEventKind, path: &str, detail: impl Into<String>) -> Self {
        Self { kind, path: path.to_string(), detail: detail.into() }
    }
}

/// Request metadata the detector inspects, already pulled out of the HTTP
/// request so the detection itself stays pure.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSignals<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    /// Failed-auth counter forwarded by the edge proxy, when present.
    pub auth_failures: Option<u32>,
}

/// Failed-auth attempts at or above this count are flagged.
const AUTH_FAILURE_THRESHOLD: u32 = 5;

const SQL_INJECTION_MARKERS: [&str; 4] =
    ["union select", "or 1=1", "'; drop table", "sleep("];

const SCANNER_USER_AGENTS: [&str; 4] = ["sqlmap", "nikto", "masscan", "nmap"];

const DOTFILE_TARGETS: [&str; 3] = ["/.env", "/.git", "/.aws"];

/// Inspect a request for suspicious patterns.
///
/// Pure function: zero or more events out, no side effects. The ruleset is
/// policy, not architecture; rules are independent and additive, and a
/// single request can produce several events.
pub fn detect_events(signals: &RequestSignals<'_>) -> Vec<SecurityEvent> {
    let mut events = Vec::new();
    let path_lower = signals.path.to_lowercase();

    if path_lower.contains("../") || path_lower.contains("..%2f") {
        events.push(SecurityEvent::new(
            SecurityEventKind::PathTraversal,
            signals.path,
            "parent-directory sequence in path",
        ));
    }

    if let Some(target) = DOTFILE_TARGETS.iter().find(|t| path_lower.contains(**t)) {
        events.push(SecurityEvent::new(
            SecurityEventKind::DotfileProbe,
            signals.path,
            format!("probe for {target}"),
        ));
    }

    if let Some(query) = signals.query {
        // Normalize the common space encodings so markers match raw queries
        let query_lower = query.to_lowercase().replace("%20", " ").replace('+', " ");
        if let Some(marker) = SQL_INJECTION_MARKERS.iter().find(|m| query_lower.contains(**m)) {
            events.push(SecurityEvent::new(
                SecurityEventKind::SqlInjectionAttempt,
                signals.path,
                format!("query contains {marker:?}"),
            ));
        }
    }

    if let Some(agent) = signals.user_agent {
        let agent_lower = agent.to_lowercase();
        if let Some(scanner) = SCANNER_USER_AGENTS.iter().find(|s| agent_lower.contains(**s)) {
            events.push(SecurityEvent::new(
                SecurityEventKind::ScannerUserAgent,
                signals.path,
                format!("user agent matches {scanner}"),
            ));
        }
    }

    if let Some(failures) = signals.auth_failures {
        if failures >= AUTH_FAILURE_THRESHOLD {
            events.push(SecurityEvent::new(
                SecurityEventKind::RepeatedAuthFailure,
                signals.path,
                format!("{failures} failed auth attempts"),
            ));
        }
    }

    events
}
