use rustc_hash::FxHashSet;

use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_provider(config)?;
    validate_continuation(config)?;
    validate_search(config)?;
    validate_sessions(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|err| validation_err(format!("{field} is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn validate_provider(config: &AppConfig) -> Result<(), ConfigError> {
    let provider = &config.provider;
    validate_http_url("provider.base_url", &provider.base_url)?;
    if provider.model.trim().is_empty() {
        return Err(validation_err("provider.model cannot be empty"));
    }
    if !(0.0..=2.0).contains(&provider.temperature) {
        return Err(validation_err(
            "provider.temperature must be between 0.0 and 2.0",
        ));
    }
    if let Some(referer) = provider.referer_url.as_deref() {
        validate_http_url("provider.referer_url", referer)?;
    }
    Ok(())
}

fn validate_continuation(config: &AppConfig) -> Result<(), ConfigError> {
    let continuation = &config.continuation;
    if continuation.trailing_word_limit == 0 {
        return Err(validation_err(
            "continuation.trailing_word_limit must be greater than 0",
        ));
    }
    if continuation.mid_word_min_length == 0 {
        return Err(validation_err(
            "continuation.mid_word_min_length must be greater than 0",
        ));
    }
    if continuation.continuation_prompt.trim().is_empty() {
        return Err(validation_err(
            "continuation.continuation_prompt cannot be empty",
        ));
    }
    Ok(())
}

fn validate_search(config: &AppConfig) -> Result<(), ConfigError> {
    validate_http_url("search.base_url", &config.search.base_url)?;
    if config.search.summary_max_tokens == 0 {
        return Err(validation_err(
            "search.summary_max_tokens must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_sessions(config: &AppConfig) -> Result<(), ConfigError> {
    let mut seen = FxHashSet::default();
    for session in &config.sessions {
        if session.token.trim().is_empty() {
            return Err(validation_err("sessions contains an empty token"));
        }
        if session.email.trim().is_empty() {
            return Err(validation_err(format!(
                "session for token '{}...' has an empty email",
                session.token.chars().take(4).collect::<String>()
            )));
        }
        if !seen.insert(session.token.as_str()) {
            return Err(validation_err("sessions contains a duplicate token"));
        }
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn make_valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.sessions.push(SessionConfig {
            token: "session-a".to_string(),
            email: "a@example.com".to_string(),
            name: None,
        });
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&make_valid_config()).is_ok());
    }

    #[test]
    fn test_blank_api_key_is_allowed() {
        let config = make_valid_config();
        assert!(config.provider.api_key.is_empty());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_provider_url() {
        let mut config = make_valid_config();
        config.provider.base_url = "ftp://openrouter.ai".to_string();
        assert!(validate_config(&config).is_err());
        config.provider.base_url = "not a url".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_tunables_rejected() {
        let mut config = make_valid_config();
        config.continuation.trailing_word_limit = 0;
        assert!(validate_config(&config).is_err());

        let mut config = make_valid_config();
        config.continuation.mid_word_min_length = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_continuations_is_allowed() {
        let mut config = make_valid_config();
        config.continuation.max_continuations = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_duplicate_session_token() {
        let mut config = make_valid_config();
        config.sessions.push(SessionConfig {
            token: "session-a".to_string(),
            email: "b@example.com".to_string(),
            name: None,
        });
        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("duplicate"));
    }

    #[test]
    fn test_empty_session_email() {
        let mut config = make_valid_config();
        config.sessions[0].email = " ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let mut config = make_valid_config();
        config.features.log_level = "warning".to_string();
        assert!(validate_config(&config).is_ok());
        config.features.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }
}
