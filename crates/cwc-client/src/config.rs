use crate::error::SourceError;

pub const ENV_GATEWAY_HOST: &str = "CWC_GATEWAY_HOST";
pub const ENV_GATEWAY_TOKEN: &str = "CWC_GATEWAY_TOKEN";
pub const ENV_RUNTIME_URL: &str = "CWC_RUNTIME_URL";
pub const ENV_RUNTIME_TOKEN: &str = "CWC_RUNTIME_TOKEN";
pub const ENV_RUNTIME_INSTANCE: &str = "CWC_RUNTIME_INSTANCE";
pub const ENV_RUNTIME_CHANNEL: &str = "CWC_RUNTIME_CHANNEL";

pub const DEFAULT_GATEWAY_HOST: &str = "https://gateway.example.com";
pub const DEFAULT_RUNTIME_URL: &str = "https://runtime.example.com";
pub const DEFAULT_CHANNEL: &str = "default";

/// Endpoints and credentials for both remote services, resolved once at
/// startup. Validation failures here are fatal before any loop starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub gateway_host: String,
    pub gateway_token: String,
    pub runtime_url: String,
    pub runtime_token: String,
    pub runtime_instance: String,
    pub runtime_channel: String,
}

impl SourceConfig {
    pub fn from_env() -> Result<Self, SourceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SourceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let runtime_token = get(ENV_RUNTIME_TOKEN)
            .ok_or_else(|| SourceError::Config(format!("missing env var `{ENV_RUNTIME_TOKEN}`")))?;
        let runtime_instance = get(ENV_RUNTIME_INSTANCE).ok_or_else(|| {
            SourceError::Config(format!("missing env var `{ENV_RUNTIME_INSTANCE}`"))
        })?;

        Ok(Self {
            gateway_host: get(ENV_GATEWAY_HOST).unwrap_or_else(|| DEFAULT_GATEWAY_HOST.to_string()),
            // The gateway accepts the runtime credential unless one is set
            // for it specifically.
            gateway_token: get(ENV_GATEWAY_TOKEN).unwrap_or_else(|| runtime_token.clone()),
            runtime_url: get(ENV_RUNTIME_URL).unwrap_or_else(|| DEFAULT_RUNTIME_URL.to_string()),
            runtime_token,
            runtime_instance,
            runtime_channel: get(ENV_RUNTIME_CHANNEL).unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
        })
    }

    /// Startup summary with secrets masked; safe to log.
    pub fn describe(&self) -> String {
        format!(
            "gateway={} runtime={} instance={} channel={} token={}",
            self.gateway_host,
            self.runtime_url,
            self.runtime_instance,
            self.runtime_channel,
            mask_secret(&self.runtime_token),
        )
    }
}

pub fn mask_secret(value: &str) -> String {
    if value.is_empty() {
        return "(missing)".to_string();
    }
    if value.len() <= 6 {
        return "*".repeat(value.len());
    }
    format!("{}...{}", &value[..3], &value[value.len() - 3..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        let vars = env(&[]);
        let err = SourceConfig::from_lookup(|key| vars.get(key).cloned()).unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
        assert!(err.is_fatal());

        let vars = env(&[(ENV_RUNTIME_TOKEN, "tok-123456")]);
        let err = SourceConfig::from_lookup(|key| vars.get(key).cloned()).unwrap_err();
        assert!(err.to_string().contains(ENV_RUNTIME_INSTANCE));
    }

    #[test]
    fn gateway_token_falls_back_to_runtime_token() {
        let vars = env(&[
            (ENV_RUNTIME_TOKEN, "tok-123456"),
            (ENV_RUNTIME_INSTANCE, "crn:some-instance"),
        ]);
        let config = SourceConfig::from_lookup(|key| vars.get(key).cloned()).expect("config");
        assert_eq!(config.gateway_token, "tok-123456");
        assert_eq!(config.gateway_host, DEFAULT_GATEWAY_HOST);
        assert_eq!(config.runtime_channel, DEFAULT_CHANNEL);

        let vars = env(&[
            (ENV_RUNTIME_TOKEN, "tok-123456"),
            (ENV_RUNTIME_INSTANCE, "crn:some-instance"),
            (ENV_GATEWAY_TOKEN, "gw-654321"),
        ]);
        let config = SourceConfig::from_lookup(|key| vars.get(key).cloned()).expect("config");
        assert_eq!(config.gateway_token, "gw-654321");
    }

    #[test]
    fn secrets_are_masked_in_describe() {
        assert_eq!(mask_secret(""), "(missing)");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("abcdefghij"), "abc...hij");

        let vars = env(&[
            (ENV_RUNTIME_TOKEN, "super-secret-token"),
            (ENV_RUNTIME_INSTANCE, "crn:some-instance"),
        ]);
        let config = SourceConfig::from_lookup(|key| vars.get(key).cloned()).expect("config");
        assert!(!config.describe().contains("super-secret-token"));
        assert!(config.describe().contains("sup...ken"));
    }
}
