//! Settings loader
//!
//! Layers, lowest priority first (last write wins per key):
//!
//! 1. built-in tool defaults (applied later by each tool's config)
//! 2. optional TOML file, one table per tool module
//! 3. environment: `RECONBRIDGE_<MODULE>__<KEY>`, e.g.
//!    `RECONBRIDGE_TOOL_WHATWEB__AGGRESSION=3`
//! 4. command-line overrides via [`Settings::apply_override`]
//!
//! ```toml
//! modules = ["tool_nmapfull", "tool_whatweb"]
//! env_allowlist = ["PATH", "HOME"]
//!
//! [tool_nmapfull]
//! nmappath = "/usr/bin/nmap"
//!
//! [tool_whatweb]
//! whatweb_path = "~/src/whatweb/whatweb"
//! aggression = 3
//! ```

use config::{Config, ConfigError, Environment, File, Value};
use reconbridge_core::application::TOOL_MODULES;
use reconbridge_core::config::OptionSet;
use reconbridge_core::error::{AppError, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Environment prefix for every setting
pub const ENV_PREFIX: &str = "RECONBRIDGE";

/// Environment variable naming the settings file
pub const CONFIG_PATH_ENV: &str = "RECONBRIDGE_CONFIG";

const MODULES_KEY: &str = "modules";
const ENV_ALLOWLIST_KEY: &str = "env_allowlist";

/// Host-side settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Tool modules to load (all known tools when empty)
    pub modules: Vec<String>,
    /// Environment variables passed to tools (everything when `None`)
    pub env_allowlist: Option<Vec<String>>,
    /// Options per tool module
    pub tool_options: HashMap<String, OptionSet>,
}

impl Settings {
    /// Load from an optional file plus the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load with an explicit environment map instead of the process environment
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            debug!(path = %expanded, "Loading settings file");
            builder = builder.add_source(File::with_name(&expanded).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env),
        );

        let config = builder.build().map_err(config_error)?;

        let mut tool_options = HashMap::new();
        for module in TOOL_MODULES {
            let options = read_table(&config, module)?;
            if !options.is_empty() {
                tool_options.insert(module.to_string(), options);
            }
        }

        Ok(Self {
            modules: read_list(&config, MODULES_KEY)?.unwrap_or_default(),
            env_allowlist: read_list(&config, ENV_ALLOWLIST_KEY)?,
            tool_options,
        })
    }

    /// Override one option for one module (last write wins)
    pub fn apply_override(&mut self, module: &str, key: &str, value: &str) {
        self.tool_options
            .entry(module.to_string())
            .or_default()
            .set(key, value);
    }

    /// Parse `module.key=value` (or `key=value` applied to `default_module`)
    pub fn apply_override_spec(&mut self, spec: &str, default_module: Option<&str>) -> Result<()> {
        let (lhs, value) = spec
            .split_once('=')
            .ok_or_else(|| AppError::Validation(format!("expected key=value, got '{}'", spec)))?;

        let (module, key) = match lhs.split_once('.') {
            Some((module, key)) => (module, key),
            None => {
                let module = default_module.ok_or_else(|| {
                    AppError::Validation(format!("option '{}' needs a module prefix", lhs))
                })?;
                (module, lhs)
            }
        };

        self.apply_override(module.trim(), key.trim(), &expand(value.trim()));
        Ok(())
    }
}

fn config_error(err: ConfigError) -> AppError {
    AppError::Config(err.to_string())
}

fn expand(value: &str) -> String {
    shellexpand::tilde(value).into_owned()
}

fn read_table(config: &Config, module: &str) -> Result<OptionSet> {
    let table = match config.get_table(module) {
        Ok(table) => table,
        Err(ConfigError::NotFound(_)) => return Ok(OptionSet::new()),
        Err(e) => return Err(config_error(e)),
    };

    let mut options = OptionSet::new();
    for (key, value) in table {
        let value = value
            .into_string()
            .map_err(|e| AppError::Config(format!("{}.{}: {}", module, key, e)))?;
        options.set(key, expand(&value));
    }
    Ok(options)
}

/// A list given either as an array or a comma-separated string
fn read_list(config: &Config, key: &str) -> Result<Option<Vec<String>>> {
    let value = match config.get::<Value>(key) {
        Ok(value) => value,
        Err(ConfigError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(config_error(e)),
    };

    let items = match value.clone().into_array() {
        Ok(array) => array
            .into_iter()
            .map(|v| v.into_string().map_err(config_error))
            .collect::<Result<Vec<_>>>()?,
        Err(_) => value
            .into_string()
            .map_err(config_error)?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    };
    Ok(Some(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_settings(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("reconbridge.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_file_tables_become_option_sets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_settings(
            dir.path(),
            r#"
modules = ["tool_nmap", "tool_whatweb"]

[tool_nmap]
nmappath = "/opt/nmap/bin/"
netblockscan = false
netblockscanmax = 20

[tool_whatweb]
aggression = 2
"#,
        );

        let settings = Settings::load_with_env(Some(&path), Some(HashMap::new())).unwrap();

        assert_eq!(settings.modules, vec!["tool_nmap", "tool_whatweb"]);
        assert!(settings.env_allowlist.is_none());
        let nmap = &settings.tool_options["tool_nmap"];
        assert_eq!(nmap.get("nmappath"), Some("/opt/nmap/bin/"));
        assert_eq!(nmap.get("netblockscan"), Some("false"));
        assert_eq!(nmap.get("netblockscanmax"), Some("20"));
        assert!(!settings.tool_options.contains_key("tool_nmapfull"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_settings(dir.path(), "[tool_whatweb]\naggression = 2\nruby_path = \"ruby\"\n");

        let env = HashMap::from([
            (
                "RECONBRIDGE_TOOL_WHATWEB__AGGRESSION".to_string(),
                "3".to_string(),
            ),
            ("RECONBRIDGE_ENV_ALLOWLIST".to_string(), "PATH, HOME".to_string()),
        ]);
        let settings = Settings::load_with_env(Some(&path), Some(env)).unwrap();

        let whatweb = &settings.tool_options["tool_whatweb"];
        assert_eq!(whatweb.get("aggression"), Some("3"));
        assert_eq!(whatweb.get("ruby_path"), Some("ruby"));
        assert_eq!(
            settings.env_allowlist,
            Some(vec!["PATH".to_string(), "HOME".to_string()])
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Settings::load_with_env(
            Some(Path::new("/nonexistent/reconbridge.toml")),
            Some(HashMap::new()),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_override_specs() {
        let mut settings = Settings::default();

        settings
            .apply_override_spec("tool_nmapfull.nmappath=/usr/local/bin/nmap", None)
            .unwrap();
        settings
            .apply_override_spec("aggression=4", Some("tool_whatweb"))
            .unwrap();
        settings
            .apply_override_spec("aggression=1", Some("tool_whatweb"))
            .unwrap();

        assert_eq!(
            settings.tool_options["tool_nmapfull"].get("nmappath"),
            Some("/usr/local/bin/nmap")
        );
        assert_eq!(settings.tool_options["tool_whatweb"].get("aggression"), Some("1"));
        assert!(settings.apply_override_spec("aggression", Some("tool_whatweb")).is_err());
        assert!(settings.apply_override_spec("aggression=2", None).is_err());
    }
}
