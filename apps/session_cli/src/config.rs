use std::{fs, io::ErrorKind, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub socket_url: String,
    pub session_id: Option<String>,
    pub page_url: Option<String>,
    pub nick: Option<String>,
    pub heartbeat_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            socket_url: "ws://127.0.0.1:4000/socket".into(),
            session_id: None,
            page_url: None,
            nick: None,
            heartbeat_interval_secs: 30,
        }
    }
}

impl Settings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }
}

pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => parse_settings(&raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()))
        }
    };
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str(raw)?)
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SESSION_SOCKET_URL") {
        settings.socket_url = v;
    }
    if let Some(v) = var("APP__SOCKET_URL") {
        settings.socket_url = v;
    }

    if let Some(v) = var("SESSION_ID") {
        settings.session_id = Some(v);
    }
    if let Some(v) = var("APP__SESSION_ID") {
        settings.session_id = Some(v);
    }

    if let Some(v) = var("SESSION_PAGE_URL") {
        settings.page_url = Some(v);
    }
    if let Some(v) = var("APP__PAGE_URL") {
        settings.page_url = Some(v);
    }

    if let Some(v) = var("SESSION_NICK") {
        settings.nick = Some(v);
    }
    if let Some(v) = var("APP__NICK") {
        settings.nick = Some(v);
    }

    if let Some(v) = var("APP__HEARTBEAT_INTERVAL_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.heartbeat_interval_secs = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = parse_settings(
            r#"
            socket_url = "wss://poker.example.com/socket"
            session_id = "abc123"
            heartbeat_interval_secs = 10
            "#,
        )
        .expect("parse");
        assert_eq!(settings.socket_url, "wss://poker.example.com/socket");
        assert_eq!(settings.session_id.as_deref(), Some("abc123"));
        assert_eq!(settings.heartbeat_interval(), Duration::from_secs(10));
        assert_eq!(settings.nick, None);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(parse_settings("heartbeat_interval_secs = \"often\"").is_err());
    }

    #[test]
    fn app_prefixed_env_wins_over_plain_env() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            env_from(&[
                ("SESSION_SOCKET_URL", "ws://plain/socket"),
                ("APP__SOCKET_URL", "ws://app/socket"),
                ("SESSION_NICK", "ann"),
                ("APP__HEARTBEAT_INTERVAL_SECS", "5"),
            ]),
        );
        assert_eq!(settings.socket_url, "ws://app/socket");
        assert_eq!(settings.nick.as_deref(), Some("ann"));
        assert_eq!(settings.heartbeat_interval_secs, 5);
    }

    #[test]
    fn unparsable_heartbeat_env_is_ignored() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            env_from(&[("APP__HEARTBEAT_INTERVAL_SECS", "soon")]),
        );
        assert_eq!(settings.heartbeat_interval_secs, 30);
    }

    #[test]
    fn zero_heartbeat_is_clamped() {
        let settings = Settings {
            heartbeat_interval_secs: 0,
            ..Settings::default()
        };
        assert_eq!(settings.heartbeat_interval(), Duration::from_secs(1));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("session_cli_missing_{suffix}.toml"));
        let settings = load_settings(&path).expect("load");
        assert_eq!(settings.heartbeat_interval_secs, Settings::default().heartbeat_interval_secs);
    }
}
