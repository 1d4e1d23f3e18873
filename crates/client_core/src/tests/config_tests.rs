use super::*;

fn env_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    }
}

#[test]
fn defaults_without_environment() {
    let settings = ClientSettings::from_env_with(env_from(&[])).expect("settings");
    assert_eq!(settings, ClientSettings::default());
    assert_eq!(settings.suggestion_timeout, Duration::from_secs(30));
    assert_eq!(settings.poll_interval, Duration::from_secs(2));
    assert!(settings.gemini_api_key.is_none());
}

#[test]
fn reads_gemini_and_timeout_variables() {
    let settings = ClientSettings::from_env_with(env_from(&[
        ("GEMINI_API_KEY", " secret "),
        ("GEMINI_MODEL", "gemini-test"),
        ("APP__SUGGESTION_TIMEOUT_SECONDS", "5"),
        ("APP__SERVER_URL", "http://poll.local:9000"),
    ]))
    .expect("settings");
    assert_eq!(settings.gemini_api_key.as_deref(), Some("secret"));
    assert_eq!(settings.gemini_model, "gemini-test");
    assert_eq!(settings.suggestion_timeout, Duration::from_secs(5));
    assert_eq!(settings.server_url, "http://poll.local:9000");
}

#[test]
fn blank_api_key_counts_as_missing() {
    let settings =
        ClientSettings::from_env_with(env_from(&[("GEMINI_API_KEY", "   ")])).expect("settings");
    assert!(settings.gemini_api_key.is_none());
}

#[test]
fn rejects_non_numeric_timeout() {
    let err = ClientSettings::from_env_with(env_from(&[(
        "APP__SUGGESTION_TIMEOUT_SECONDS",
        "soon",
    )]))
    .expect_err("invalid timeout");
    assert!(err.to_string().contains("APP__SUGGESTION_TIMEOUT_SECONDS"));
}
