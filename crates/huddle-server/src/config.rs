//! Server configuration.
//!
//! Loading flow:
//! 1. Start with [`ServerConfig::default()`]
//! 2. Apply `HUDDLE_*` environment variable overrides
//! 3. The binary applies command-line flags last
//!
//! Invalid environment values are logged and ignored.

use std::path::PathBuf;

use crate::relay::RelayConfig;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of the chat relay's inbound channel.
    pub inbound_capacity: usize,
    /// Whether chat messages are delivered back to their sender.
    pub echo_to_sender: bool,
    /// Directory served for any path not matched by the API.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            inbound_capacity: 256,
            echo_to_sender: true,
            static_dir: Some(PathBuf::from("./public")),
        }
    }
}

impl ServerConfig {
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            inbound_capacity: self.inbound_capacity,
            echo_to_sender: self.echo_to_sender,
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let env = EnvReader { lookup };

        if let Some(v) = env.string("HUDDLE_HOST") {
            self.host = v;
        }
        if let Some(v) = env.u16("HUDDLE_PORT") {
            self.port = v;
        }
        if let Some(v) = env.usize_range("HUDDLE_INBOUND_CAPACITY", 1, 1_000_000) {
            self.inbound_capacity = v;
        }
        if let Some(v) = env.bool("HUDDLE_ECHO_TO_SENDER") {
            self.echo_to_sender = v;
        }
        if let Some(v) = env.string("HUDDLE_STATIC_DIR") {
            self.static_dir = match v.as_str() {
                "none" | "off" => None,
                _ => Some(PathBuf::from(v)),
            };
        }
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = val.trim().parse::<u16>().ok();
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn usize_range(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.lookup)(name)?;
        let result = val
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|v| (min..=max).contains(v));
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
