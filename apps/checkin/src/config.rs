use std::{collections::HashMap, fs};

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub event_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5242".into(),
            event_id: None,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("checkin.toml") {
        apply_file_settings(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("CHECKIN_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("CHECKIN_EVENT_ID") {
        settings.event_id = Some(v);
    }

    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("server_url") {
            settings.server_url = v.clone();
        }
        if let Some(v) = file_cfg.get("event_id") {
            settings.event_id = Some(v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_settings_override_defaults() {
        let mut settings = Settings::default();
        apply_file_settings(
            &mut settings,
            "server_url = \"https://desk.example.org\"\nevent_id = \"ev42\"\n",
        );
        assert_eq!(settings.server_url, "https://desk.example.org");
        assert_eq!(settings.event_id.as_deref(), Some("ev42"));
    }

    #[test]
    fn unparsable_file_keeps_defaults() {
        let mut settings = Settings::default();
        apply_file_settings(&mut settings, "server_url = [not toml");
        assert_eq!(settings.server_url, Settings::default().server_url);
        assert!(settings.event_id.is_none());
    }
}
