// Event Domain Model

use serde::{Deserialize, Serialize};

/// Module name used for events that enter from outside the adapters
pub const EXTERNAL_SOURCE: &str = "external";

/// Event Type (names follow the host bus conventions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    IpAddress,
    NetblockOwner,
    InternetName,
    DomainName,
    RawResult,
    OperatingSystem,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::IpAddress => "IP_ADDRESS",
            EventType::NetblockOwner => "NETBLOCK_OWNER",
            EventType::InternetName => "INTERNET_NAME",
            EventType::DomainName => "DOMAIN_NAME",
            EventType::RawResult => "RAW_RESULT",
            EventType::OperatingSystem => "OPERATING_SYSTEM",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "IP_ADDRESS" => Ok(EventType::IpAddress),
            "NETBLOCK_OWNER" => Ok(EventType::NetblockOwner),
            "INTERNET_NAME" => Ok(EventType::InternetName),
            "DOMAIN_NAME" => Ok(EventType::DomainName),
            "RAW_RESULT" => Ok(EventType::RawResult),
            "OPERATING_SYSTEM" => Ok(EventType::OperatingSystem),
            other => Err(format!("unknown event type: {}", other)),
        }
    }
}

/// A single event on the bus.
///
/// Upstream events carry the source label in `module` and have no parent.
/// Events emitted by an adapter carry the adapter's module name and the
/// triggering event as `parent`, so provenance can always be walked back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub data: String,
    #[serde(default = "default_module")]
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Event>>,
}

fn default_module() -> String {
    EXTERNAL_SOURCE.to_string()
}

impl Event {
    /// Create an upstream (root) event
    pub fn new(event_type: EventType, data: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            event_type,
            data: data.into(),
            module: module.into(),
            parent: None,
        }
    }

    /// Create an event produced by `module` in response to `parent`
    pub fn derived(
        event_type: EventType,
        data: impl Into<String>,
        module: impl Into<String>,
        parent: &Event,
    ) -> Self {
        Self {
            event_type,
            data: data.into(),
            module: module.into(),
            parent: Some(Box::new(parent.clone())),
        }
    }

    /// Number of ancestors above this event
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.as_deref();
        while let Some(parent) = current {
            depth += 1;
            current = parent.parent.as_deref();
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_round_trips_host_names() {
        let parsed: EventType = "internet_name".parse().unwrap();
        assert_eq!(parsed, EventType::InternetName);
        assert_eq!(parsed.to_string(), "INTERNET_NAME");
        assert!("SOCIAL_MEDIA".parse::<EventType>().is_err());
    }

    #[test]
    fn test_upstream_event_defaults_module() {
        let event: Event =
            serde_json::from_str(r#"{"event_type":"IP_ADDRESS","data":"10.0.0.1"}"#).unwrap();
        assert_eq!(event.module, EXTERNAL_SOURCE);
        assert!(event.parent.is_none());
    }

    #[test]
    fn test_derived_event_keeps_provenance() {
        let root = Event::new(EventType::NetblockOwner, "10.0.0.0/24", "sfp_whois");
        let ip = Event::derived(EventType::IpAddress, "10.0.0.7", "tool_nmap", &root);
        let os = Event::derived(EventType::OperatingSystem, "Linux 5.X", "tool_nmap", &ip);

        assert_eq!(os.depth(), 2);
        assert_eq!(os.parent.as_ref().unwrap().data, "10.0.0.7");

        let json = serde_json::to_string(&os).unwrap();
        assert!(json.contains("\"event_type\":\"OPERATING_SYSTEM\""));
        assert!(json.contains("\"module\":\"sfp_whois\""));
    }
}
