//! Worker-side configuration loading
//!
//! Reads the optional shared config file (`~/.config/attrlink/config.toml`)
//! for endpoint aliases and the default log filter. A missing or broken
//! config never stops a worker; it degrades to defaults with a warning.

use std::collections::HashMap;

use attrlink_utils::paths;

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
struct WorkerConfig {
    /// Named endpoints, e.g. `lab = "192.168.1.5:8091"`
    endpoints: HashMap<String, String>,
    log: LogSection,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
struct LogSection {
    /// Default tracing filter when ATTRLINK_LOG is unset
    filter: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            filter: "warn".into(),
        }
    }
}

fn parse(content: &str) -> Result<WorkerConfig, toml::de::Error> {
    toml::from_str(content)
}

fn load() -> WorkerConfig {
    let path = paths::config_file();
    if !path.exists() {
        return WorkerConfig::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                WorkerConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read {}: {}, using defaults", path.display(), e);
            WorkerConfig::default()
        }
    }
}

/// Resolve an endpoint argument to a dialable address
///
/// Resolution order: config alias, bare TCP port (loopback shorthand used
/// by hosts spawning local workers), literal `host:port` address.
pub fn resolve_endpoint(endpoint: &str) -> String {
    if let Some(addr) = load().endpoints.get(endpoint) {
        tracing::debug!(alias = endpoint, addr = %addr, "Resolved endpoint alias");
        return addr.clone();
    }
    if endpoint.parse::<u16>().is_ok() {
        return format!("127.0.0.1:{}", endpoint);
    }
    endpoint.to_string()
}

/// Log filter to use when the ATTRLINK_LOG env var is unset
pub fn default_log_filter() -> String {
    load().log.filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = parse("").unwrap();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.log.filter, "warn");
    }

    #[test]
    fn test_parse_endpoints() {
        let toml = r#"
            [endpoints]
            lab = "192.168.1.5:8091"
            local = "127.0.0.1:9000"
        "#;
        let config = parse(toml).unwrap();
        assert_eq!(config.endpoints.get("lab").unwrap(), "192.168.1.5:8091");
        assert_eq!(config.endpoints.get("local").unwrap(), "127.0.0.1:9000");
        assert!(config.endpoints.get("missing").is_none());
    }

    #[test]
    fn test_parse_log_section() {
        let toml = r#"
            [log]
            filter = "attrlink_client=debug"
        "#;
        let config = parse(toml).unwrap();
        assert_eq!(config.log.filter, "attrlink_client=debug");
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse("endpoints = 3").is_err());
    }

    #[test]
    fn test_bare_port_dials_loopback() {
        assert_eq!(resolve_endpoint("8091"), "127.0.0.1:8091");
    }

    #[test]
    fn test_literal_address_passes_through() {
        assert_eq!(resolve_endpoint("10.0.0.2:8091"), "10.0.0.2:8091");
        // Out-of-range port is not the bare-port shorthand
        assert_eq!(resolve_endpoint("99999"), "99999");
    }
}
