// WhatWeb web-technology fingerprinting, forwarded as one raw result

use super::{raw_result, ToolMeta, ToolProfile};
use crate::config::{Aggression, OptionDescriptor, OptionSet, TIMEOUT_OPTION};
use crate::domain::target::is_sanitised_hostname;
use crate::domain::{Event, EventType};
use std::time::Duration;

pub const MODULE_NAME: &str = "tool_whatweb";
pub const PATH_KEY: &str = "whatweb_path";
pub const RUBY_KEY: &str = "ruby_path";
pub const AGGRESSION_KEY: &str = "aggression";
pub const DEFAULT_PATH: &str = "/opt/whatweb/whatweb";
pub const DEFAULT_RUBY: &str = "ruby";
const RESULT_LABEL: &str = "WhatWeb scan result";
const USER_AGENT: &str = "Mozilla/5.0";

pub const OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor {
        key: AGGRESSION_KEY,
        default: "1",
        description: "Set WhatWeb aggression level (1-4).",
    },
    OptionDescriptor {
        key: RUBY_KEY,
        default: DEFAULT_RUBY,
        description: "Path to Ruby interpreter to use for WhatWeb. If just 'ruby' then it must be in your $PATH.",
    },
    OptionDescriptor {
        key: PATH_KEY,
        default: DEFAULT_PATH,
        description: "Path to the whatweb executable file. Must be set.",
    },
    TIMEOUT_OPTION,
];

static META: ToolMeta = ToolMeta {
    name: "Tool - WhatWeb",
    summary: "Identify technologies used on a target website.",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatWebConfig {
    pub whatweb_path: String,
    pub ruby_path: String,
    pub aggression: Aggression,
    pub timeout: Duration,
}

impl WhatWebConfig {
    pub fn from_options(options: &OptionSet) -> Self {
        Self {
            whatweb_path: options.get_str(PATH_KEY, DEFAULT_PATH),
            ruby_path: options.get_str(RUBY_KEY, DEFAULT_RUBY),
            aggression: options
                .get(AGGRESSION_KEY)
                .map(Aggression::from_option)
                .unwrap_or_default(),
            timeout: options.timeout(),
        }
    }
}

impl Default for WhatWebConfig {
    fn default() -> Self {
        Self::from_options(&OptionSet::new())
    }
}

pub struct WhatWebTool {
    config: WhatWebConfig,
}

impl WhatWebTool {
    pub fn new(config: WhatWebConfig) -> Self {
        Self { config }
    }
}

impl ToolProfile for WhatWebTool {
    fn module_name(&self) -> &'static str {
        MODULE_NAME
    }

    fn meta(&self) -> &'static ToolMeta {
        &META
    }

    fn watched_events(&self) -> &'static [EventType] {
        &[EventType::InternetName, EventType::DomainName]
    }

    fn produced_events(&self) -> &'static [EventType] {
        &[EventType::RawResult]
    }

    fn binary_name(&self) -> &'static str {
        "whatweb"
    }

    fn configured_path(&self) -> &str {
        &self.config.whatweb_path
    }

    fn interpreter(&self) -> Option<&str> {
        Some(&self.config.ruby_path).filter(|ruby| !ruby.is_empty()).map(String::as_str)
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    fn validate(&self, target: &str) -> bool {
        is_sanitised_hostname(target)
    }

    fn build_args(&self, target: &str) -> Vec<String> {
        vec![
            "--quiet".to_string(),
            format!("--aggression={}", self.config.aggression.level()),
            "--log-json=-".to_string(),
            format!("--user-agent={}", USER_AGENT),
            "--follow-redirect=never".to_string(),
            target.to_string(),
        ]
    }

    fn interpret(&self, output: &str, trigger: &Event) -> Vec<Event> {
        vec![raw_result(RESULT_LABEL, output, MODULE_NAME, trigger)]
    }
}
