// Nmap OS fingerprinting
//
// Unlike the raw tools this one reads the report: the `OS details:` line
// becomes an OPERATING_SYSTEM event, and for netblocks every host with a
// match also yields an IP_ADDRESS event.

use super::{ToolMeta, ToolProfile};
use crate::config::{OptionDescriptor, OptionSet, TIMEOUT_OPTION};
use crate::domain::target::{is_ip_or_network, network_within, parse_network};
use crate::domain::{AdapterError, Event, EventType, Outcome, SkipReason};
use ipnetwork::IpNetwork;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

pub const MODULE_NAME: &str = "tool_nmap";
pub const PATH_KEY: &str = "nmappath";
pub const NETBLOCK_SCAN_KEY: &str = "netblockscan";
pub const NETBLOCK_MAX_KEY: &str = "netblockscanmax";
pub const DEFAULT_PATH: &str = "/usr/bin/nmap";
pub const DEFAULT_NETBLOCK_MAX: u8 = 24;

const OS_DETAILS: &str = "OS details:";
const SCAN_REPORT: &str = "scan report for";
const UNRELIABLE_MARKERS: &[&str] = &[
    "No exact OS matches for host",
    "OSScan results may be unreliable",
];

pub const OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor {
        key: PATH_KEY,
        default: DEFAULT_PATH,
        description: "Path to where the nmap binary lives. Must be set.",
    },
    OptionDescriptor {
        key: NETBLOCK_SCAN_KEY,
        default: "true",
        description: "Port scan all IPs within identified owned netblocks?",
    },
    OptionDescriptor {
        key: NETBLOCK_MAX_KEY,
        default: "24",
        description: "Maximum netblock/subnet size to scan IPs within (CIDR value, 24 = /24, 16 = /16, etc.)",
    },
    TIMEOUT_OPTION,
];

static META: ToolMeta = ToolMeta {
    name: "Tool - Nmap",
    summary: "Identify what Operating System might be used.",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NmapOsConfig {
    pub nmap_path: String,
    pub netblock_scan: bool,
    /// Smallest prefix length (largest netblock) still scanned
    pub netblock_max_prefix: u8,
    pub timeout: Duration,
}

impl NmapOsConfig {
    pub fn from_options(options: &OptionSet) -> Self {
        Self {
            nmap_path: options.get_str(PATH_KEY, DEFAULT_PATH),
            netblock_scan: options.get_bool(NETBLOCK_SCAN_KEY, true),
            netblock_max_prefix: options
                .get_i64(NETBLOCK_MAX_KEY, DEFAULT_NETBLOCK_MAX as i64)
                .clamp(0, 128) as u8,
            timeout: options.timeout(),
        }
    }
}

impl Default for NmapOsConfig {
    fn default() -> Self {
        Self::from_options(&OptionSet::new())
    }
}

pub struct NmapOsTool {
    config: NmapOsConfig,
}

impl NmapOsTool {
    pub fn new(config: NmapOsConfig) -> Self {
        Self { config }
    }
}

impl ToolProfile for NmapOsTool {
    fn module_name(&self) -> &'static str {
        MODULE_NAME
    }

    fn meta(&self) -> &'static ToolMeta {
        &META
    }

    fn watched_events(&self) -> &'static [EventType] {
        &[EventType::IpAddress, EventType::NetblockOwner]
    }

    fn produced_events(&self) -> &'static [EventType] {
        &[EventType::OperatingSystem, EventType::IpAddress]
    }

    fn binary_name(&self) -> &'static str {
        "nmap"
    }

    fn configured_path(&self) -> &str {
        &self.config.nmap_path
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    fn validate(&self, target: &str) -> bool {
        is_ip_or_network(target)
    }

    fn precheck(&self, event: &Event) -> Option<Outcome> {
        if event.event_type != EventType::NetblockOwner {
            return None;
        }
        if !self.config.netblock_scan {
            return Some(Outcome::Skipped(SkipReason::NetblockScanDisabled));
        }

        match event.data.parse::<IpNetwork>() {
            Ok(net) if net.prefix() < self.config.netblock_max_prefix => {
                Some(Outcome::Skipped(SkipReason::NetblockTooLarge {
                    prefix: net.prefix(),
                    max_prefix: self.config.netblock_max_prefix,
                }))
            }
            Ok(_) => None,
            Err(e) => Some(Outcome::Failed(AdapterError::UnparseableNetblock {
                netblock: event.data.clone(),
                reason: e.to_string(),
            })),
        }
    }

    /// Also covered when inside a network scanned earlier
    fn already_covered(&self, seen: &HashSet<String>, target: &str) -> bool {
        if seen.contains(target) {
            return true;
        }
        let Some(candidate) = parse_network(target) else {
            return false;
        };
        seen.iter()
            .filter_map(|earlier| parse_network(earlier))
            .any(|earlier| network_within(&candidate, &earlier))
    }

    fn build_args(&self, target: &str) -> Vec<String> {
        vec![
            "-O".to_string(),
            "--osscan-limit".to_string(),
            target.to_string(),
        ]
    }

    fn interpret(&self, output: &str, trigger: &Event) -> Vec<Event> {
        if UNRELIABLE_MARKERS.iter().any(|marker| output.contains(marker)) {
            debug!(target = %trigger.data, "Couldn't reliably detect the OS");
            return Vec::new();
        }

        match trigger.event_type {
            EventType::NetblockOwner => host_os_events(output, trigger),
            _ => os_details(output)
                .map(|os| {
                    vec![Event::derived(
                        EventType::OperatingSystem,
                        os,
                        MODULE_NAME,
                        trigger,
                    )]
                })
                .unwrap_or_default(),
        }
    }
}

/// Last `OS details:` value in the report
fn os_details(output: &str) -> Option<String> {
    output.lines().filter_map(parse_os_line).last()
}

fn parse_os_line(line: &str) -> Option<String> {
    if !line.contains(OS_DETAILS) {
        return None;
    }
    line.split_once(": ")
        .map(|(_, os)| os.trim().to_string())
        .filter(|os| !os.is_empty())
}

/// `Nmap scan report for host.example (10.0.0.7)` or `... for 10.0.0.7`
fn parse_report_host(line: &str) -> Option<String> {
    let (_, rest) = line.split_once(SCAN_REPORT)?;
    let rest = rest.trim();
    let host = match (rest.rfind('('), rest.rfind(')')) {
        (Some(open), Some(close)) if open < close => &rest[open + 1..close],
        _ => rest,
    };
    Some(host.to_string()).filter(|h| !h.is_empty())
}

fn host_os_events(output: &str, trigger: &Event) -> Vec<Event> {
    let mut events = Vec::new();
    let mut current_ip: Option<String> = None;

    for line in output.lines() {
        if let Some(host) = parse_report_host(line) {
            current_ip = Some(host);
            continue;
        }
        let Some(os) = parse_os_line(line) else {
            continue;
        };
        if let Some(ip) = current_ip.take() {
            let ip_event = Event::derived(EventType::IpAddress, ip, MODULE_NAME, trigger);
            let os_event = Event::derived(EventType::OperatingSystem, os, MODULE_NAME, &ip_event);
            events.push(ip_event);
            events.push(os_event);
        }
    }

    events
}
