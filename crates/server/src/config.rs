use std::{collections::HashMap, fs, time::Duration};

use reconcile::ReconcilerConfig;
use shared::domain::Color;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_bind: String,
    pub bridge_addr: String,
    pub tracked_color: Color,
    pub grace_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_budget_ms: u64,
    pub read_timeout_ms: u64,
    pub actuator_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:5000".into(),
            bridge_addr: "127.0.0.1:5555".into(),
            tracked_color: Color::Black,
            grace_delay_ms: 1_000,
            poll_interval_ms: 500,
            poll_budget_ms: 120_000,
            read_timeout_ms: 2_000,
            actuator_timeout_ms: 5_000,
        }
    }
}

impl Settings {
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            tracked_color: self.tracked_color,
            grace_delay: Duration::from_millis(self.grace_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_budget: Duration::from_millis(self.poll_budget_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    pub fn actuator_timeout(&self) -> Duration {
        Duration::from_millis(self.actuator_timeout_ms)
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("hallboard.toml") {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => apply_entries(&mut settings, |key| file_cfg.get(key).cloned()),
            Err(error) => warn!(%error, "ignoring unreadable hallboard.toml"),
        }
    }

    apply_entries(&mut settings, |key| {
        std::env::var(format!("HALLBOARD_{}", key.to_uppercase())).ok()
    });

    settings
}

fn apply_entries(settings: &mut Settings, get: impl Fn(&str) -> Option<String>) {
    if let Some(v) = get("bind_addr") {
        settings.server_bind = v;
    }
    if let Some(v) = get("bridge_addr") {
        settings.bridge_addr = v;
    }
    if let Some(v) = get("tracked_color") {
        match parse_color(&v) {
            Some(color) => settings.tracked_color = color,
            None => warn!(value = %v, "tracked_color must be \"white\" or \"black\""),
        }
    }
    for (key, slot) in [
        ("grace_delay_ms", &mut settings.grace_delay_ms),
        ("poll_interval_ms", &mut settings.poll_interval_ms),
        ("poll_budget_ms", &mut settings.poll_budget_ms),
        ("read_timeout_ms", &mut settings.read_timeout_ms),
        ("actuator_timeout_ms", &mut settings.actuator_timeout_ms),
    ] {
        if let Some(v) = get(key) {
            match v.parse::<u64>() {
                Ok(ms) => *slot = ms,
                Err(_) => warn!(%key, value = %v, "expected milliseconds"),
            }
        }
    }
}

fn parse_color(value: &str) -> Option<Color> {
    match value.trim().to_ascii_lowercase().as_str() {
        "white" => Some(Color::White),
        "black" => Some(Color::Black),
        _ => None,
    }
}
