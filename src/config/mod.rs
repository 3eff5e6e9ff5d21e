use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, trace};
use pingora::server::configuration::{Opt, ServerConf};
use pingora_error::{Error, ErrorType::*, OrErr, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    pub pingora: ServerConf,

    #[validate(nested)]
    pub gateway: Gateway,

    #[validate(nested)]
    pub status: Option<Status>,

    pub log: Option<Log>,
}

// Config file load and validation
impl Config {
    // Does not have to be async until we want runtime reload
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    // config file load entry point
    pub fn load_yaml_with_opt_override(opt: &Opt) -> Result<Self> {
        if let Some(path) = &opt.conf {
            let mut conf = Self::load_from_yaml(path)?;
            conf.merge_with_opt(opt);
            Ok(conf)
        } else {
            Error::e_explain(ReadError, "No path specified")
        }
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        trace!("Loaded conf: {conf:?}");

        conf.validate()
            .or_err_with(FileReadError, || "Conf file valid failed")?;

        Ok(conf)
    }

    #[allow(dead_code)]
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap()
    }

    pub fn merge_with_opt(&mut self, opt: &Opt) {
        if opt.daemon {
            self.pingora.daemon = true;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Gateway {
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub listeners: Vec<Listener>,

    /// Timeout for each downstream call, in seconds.
    #[serde(default = "Gateway::default_dispatch_timeout")]
    #[validate(range(min = 1, max = 60))]
    pub dispatch_timeout: u64,

    /// Longest call path the engine will follow through the dependency graph.
    #[serde(default = "Gateway::default_max_depth")]
    #[validate(range(min = 1, max = 256))]
    pub max_depth: usize,

    #[serde(default)]
    pub scheme: DownstreamScheme,
}

impl Default for Gateway {
    fn default() -> Self {
        Self {
            listeners: vec![Listener {
                address: SocketAddr::from(([0u8, 0, 0, 0], 5000)),
            }],
            dispatch_timeout: Self::default_dispatch_timeout(),
            max_depth: Self::default_max_depth(),
            scheme: DownstreamScheme::default(),
        }
    }
}

impl Gateway {
    fn default_dispatch_timeout() -> u64 {
        2
    }

    fn default_max_depth() -> usize {
        crate::core::engine::DEFAULT_MAX_DEPTH
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Listener {
    pub address: SocketAddr,
}

#[derive(Copy, Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownstreamScheme {
    #[default]
    Http,
    Https,
}

impl DownstreamScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownstreamScheme::Http => "http",
            DownstreamScheme::Https => "https",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Status {
    pub address: SocketAddr,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Log {
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn not_a_test_i_cannot_write_yaml_by_hand() {
        init_log();
        let conf = Config::default();
        // cargo test -- --nocapture not_a_test_i_cannot_write_yaml_by_hand
        println!("{}", conf.to_yaml());
    }

    #[test]
    fn test_load_file() {
        init_log();
        let conf_str = r#"
---
pingora:
  version: 1
  threads: 2

gateway:
  listeners:
    - address: 0.0.0.0:5000
    - address: "[::1]:5000"
  dispatch_timeout: 5
  max_depth: 8
  scheme: https

status:
  address: 127.0.0.1:5001

log:
  path: /var/log/mixgate/mixgate.log
        "#
        .to_string();
        let conf = Config::from_yaml(&conf_str).unwrap();
        assert_eq!(1, conf.pingora.version);
        assert_eq!(2, conf.pingora.threads);
        assert_eq!(2, conf.gateway.listeners.len());
        assert_eq!(Duration::from_secs(5), conf.gateway.dispatch_timeout());
        assert_eq!(8, conf.gateway.max_depth);
        assert_eq!(DownstreamScheme::Https, conf.gateway.scheme);
        assert!(conf.status.is_some());
        assert_eq!(
            "/var/log/mixgate/mixgate.log",
            conf.log.as_ref().unwrap().path
        );
        print!("{}", conf.to_yaml());
    }

    #[test]
    fn test_defaults() {
        init_log();
        let conf_str = r#"
---
gateway:
  listeners:
    - address: 0.0.0.0:5000
        "#
        .to_string();
        let conf = Config::from_yaml(&conf_str).unwrap();
        assert_eq!(Duration::from_secs(2), conf.gateway.dispatch_timeout());
        assert_eq!(
            crate::core::engine::DEFAULT_MAX_DEPTH,
            conf.gateway.max_depth
        );
        assert_eq!(DownstreamScheme::Http, conf.gateway.scheme);
        assert!(conf.status.is_none());
        assert!(conf.log.is_none());
    }

    #[test]
    fn test_valid_listeners_length() {
        init_log();
        let conf_str = r#"
---
gateway:
  listeners: []
        "#
        .to_string();
        let conf = Config::from_yaml(&conf_str);
        assert!(conf.is_err(), "Expected error, but got a valid config");
    }

    #[test]
    fn test_valid_max_depth_range() {
        init_log();
        let conf_str = r#"
---
gateway:
  listeners:
    - address: 0.0.0.0:5000
  max_depth: 0
        "#
        .to_string();
        let conf = Config::from_yaml(&conf_str);
        assert!(conf.is_err(), "Expected error, but got a valid config");
    }

    #[test]
    fn test_valid_dispatch_timeout_range() {
        init_log();
        let conf_str = r#"
---
gateway:
  listeners:
    - address: 0.0.0.0:5000
  dispatch_timeout: 0
        "#
        .to_string();
        let conf = Config::from_yaml(&conf_str);
        assert!(conf.is_err(), "Expected error, but got a valid config");
    }

    #[test]
    fn test_missing_gateway_section() {
        init_log();
        let conf_str = r#"
---
status:
  address: 127.0.0.1:5001
        "#
        .to_string();
        let conf = Config::from_yaml(&conf_str);
        assert!(conf.is_err(), "Expected error, but got a valid config");
    }
}
