// Wrapped tools
//
// Everything that differs between tools lives behind `ToolProfile`; the
// dedup/error-state/execution flow is shared in `ToolAdapter`.

pub mod nmap_full;
pub mod nmap_os;
pub mod whatweb;

pub use nmap_full::{NmapFullConfig, NmapFullTool};
pub use nmap_os::{NmapOsConfig, NmapOsTool};
pub use whatweb::{WhatWebConfig, WhatWebTool};

use crate::application::adapter::ToolAdapter;
use crate::config::{OptionDescriptor, OptionSet};
use crate::domain::{Event, EventType, Outcome};
use crate::port::ProcessRunner;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Descriptive metadata about a wrapped tool
#[derive(Debug, Clone, Copy)]
pub struct ToolMeta {
    pub name: &'static str,
    pub summary: &'static str,
}

/// Tool-specific behaviour plugged into a `ToolAdapter`
pub trait ToolProfile: Send + Sync {
    /// Module name used as producer tag (e.g. `tool_nmapfull`)
    fn module_name(&self) -> &'static str;

    fn meta(&self) -> &'static ToolMeta;

    fn watched_events(&self) -> &'static [EventType];

    fn produced_events(&self) -> &'static [EventType];

    /// Conventional filename of the binary (e.g. `nmap`)
    fn binary_name(&self) -> &'static str;

    /// Path as configured by the user (file or directory)
    fn configured_path(&self) -> &str;

    /// Interpreter that has to run the binary, if any
    fn interpreter(&self) -> Option<&str> {
        None
    }

    fn timeout(&self) -> Duration;

    /// Accepted input shape
    fn validate(&self, target: &str) -> bool;

    /// Tool-specific early exit, evaluated before dedup
    fn precheck(&self, _event: &Event) -> Option<Outcome> {
        None
    }

    /// True if `target` was already covered by an earlier dispatch
    fn already_covered(&self, seen: &HashSet<String>, target: &str) -> bool {
        seen.contains(target)
    }

    /// Fixed flags and tuning flags, followed by the target
    fn build_args(&self, target: &str) -> Vec<String>;

    /// Turn trimmed, non-empty stdout into events (empty = nothing found)
    fn interpret(&self, output: &str, trigger: &Event) -> Vec<Event>;
}

/// Resolve the executable from a configured file or directory path.
///
/// A path that already ends with the binary name is used as is; anything
/// else is treated as the directory containing it.
pub fn resolve_executable(configured: &str, binary_name: &str) -> PathBuf {
    if configured.ends_with(binary_name) {
        PathBuf::from(configured)
    } else {
        PathBuf::from(configured).join(binary_name)
    }
}

/// Single raw-result event: `"<label>:\n<output>"`
pub fn raw_result(label: &str, output: &str, module: &str, trigger: &Event) -> Event {
    Event::derived(
        EventType::RawResult,
        format!("{}:\n{}", label, output),
        module,
        trigger,
    )
}

/// Names of every tool this build knows about
pub const TOOL_MODULES: &[&str] = &[
    nmap_full::MODULE_NAME,
    nmap_os::MODULE_NAME,
    whatweb::MODULE_NAME,
];

/// Option descriptors for a tool module
pub fn option_descriptors(module: &str) -> Option<&'static [OptionDescriptor]> {
    match module {
        nmap_full::MODULE_NAME => Some(nmap_full::OPTIONS),
        nmap_os::MODULE_NAME => Some(nmap_os::OPTIONS),
        whatweb::MODULE_NAME => Some(whatweb::OPTIONS),
        _ => None,
    }
}

/// Build the profile for one tool module from its options
pub fn build_profile(module: &str, options: &OptionSet) -> Option<Box<dyn ToolProfile>> {
    let profile: Box<dyn ToolProfile> = match module {
        nmap_full::MODULE_NAME => Box::new(NmapFullTool::new(NmapFullConfig::from_options(options))),
        nmap_os::MODULE_NAME => Box::new(NmapOsTool::new(NmapOsConfig::from_options(options))),
        whatweb::MODULE_NAME => Box::new(WhatWebTool::new(WhatWebConfig::from_options(options))),
        _ => return None,
    };

    if let Some(known) = option_descriptors(module) {
        for key in options.unknown_keys(known) {
            warn!(module = %module, key = %key, "Ignoring unknown option");
        }
    }

    Some(profile)
}

/// Build adapters for `modules` (every known tool when empty).
///
/// Options are looked up per module name; missing entries use defaults.
pub fn build_adapters(
    modules: &[String],
    options_by_module: &HashMap<String, OptionSet>,
    runner: Arc<dyn ProcessRunner>,
) -> Result<Vec<Arc<ToolAdapter>>, String> {
    let selected: Vec<&str> = if modules.is_empty() {
        TOOL_MODULES.to_vec()
    } else {
        modules.iter().map(String::as_str).collect()
    };

    let empty = OptionSet::new();
    selected
        .into_iter()
        .map(|module| {
            let options = options_by_module.get(module).unwrap_or(&empty);
            build_profile(module, options)
                .map(|profile| Arc::new(ToolAdapter::new(profile, runner.clone())))
                .ok_or_else(|| format!("unknown tool module: {}", module))
        })
        .collect()
}
