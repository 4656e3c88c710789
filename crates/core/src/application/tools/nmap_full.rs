// Nmap service scan, forwarded as one raw result

use super::{raw_result, ToolMeta, ToolProfile};
use crate::config::{OptionDescriptor, OptionSet, TIMEOUT_OPTION};
use crate::domain::target::is_ip_or_network;
use crate::domain::{Event, EventType};
use std::time::Duration;

pub const MODULE_NAME: &str = "tool_nmapfull";
pub const PATH_KEY: &str = "nmappath";
pub const DEFAULT_PATH: &str = "/usr/bin/nmap";
const RESULT_LABEL: &str = "Nmap scan result";

pub const OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor {
        key: PATH_KEY,
        default: DEFAULT_PATH,
        description: "Path to where the nmap binary lives. Must be set.",
    },
    TIMEOUT_OPTION,
];

static META: ToolMeta = ToolMeta {
    name: "Tool - Nmap Full",
    summary: "Run an Nmap service/version scan and forward the full report.",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NmapFullConfig {
    pub nmap_path: String,
    pub timeout: Duration,
}

impl NmapFullConfig {
    pub fn from_options(options: &OptionSet) -> Self {
        Self {
            nmap_path: options.get_str(PATH_KEY, DEFAULT_PATH),
            timeout: options.timeout(),
        }
    }
}

impl Default for NmapFullConfig {
    fn default() -> Self {
        Self::from_options(&OptionSet::new())
    }
}

pub struct NmapFullTool {
    config: NmapFullConfig,
}

impl NmapFullTool {
    pub fn new(config: NmapFullConfig) -> Self {
        Self { config }
    }
}

impl ToolProfile for NmapFullTool {
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
        &[EventType::RawResult]
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

    fn build_args(&self, target: &str) -> Vec<String> {
        vec!["-sV".to_string(), target.to_string()]
    }

    fn interpret(&self, output: &str, trigger: &Event) -> Vec<Event> {
        vec![raw_result(RESULT_LABEL, output, MODULE_NAME, trigger)]
    }
}
