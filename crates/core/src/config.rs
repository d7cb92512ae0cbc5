use crate::ChatError;
use std::time::Duration;
use url::Url;

pub const DEFAULT_EMBEDDING_DEPLOYMENT: &str = "text-embedding-ada-002";
pub const DEFAULT_AZURE_EMBEDDING_DIMENSIONS: usize = 1536;
pub const DEFAULT_CHAT_DEPLOYMENT: &str = "gpt-4o";
pub const DEFAULT_CHAT_API_VERSION: &str = "2024-05-01-preview";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for one Azure OpenAI deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub deployment: String,
    pub timeout: Duration,
}

impl AzureOpenAiConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: api_version.into(),
            deployment: deployment.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        for (name, value) in [
            ("endpoint", &self.endpoint),
            ("api key", &self.api_key),
            ("api version", &self.api_version),
            ("deployment", &self.deployment),
        ] {
            if value.trim().is_empty() {
                return Err(ChatError::Config(format!("azure openai {name} is not set")));
            }
        }

        let endpoint = Url::parse(self.endpoint.trim())?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ChatError::Config(format!(
                "azure openai endpoint must be http(s): {}",
                self.endpoint
            )));
        }

        Ok(())
    }

    /// `{endpoint}/openai/deployments/{deployment}/{operation}?api-version=…`
    pub fn operation_url(&self, operation: &str) -> Result<Url, ChatError> {
        self.validate()?;

        let mut url = Url::parse(&format!(
            "{}/openai/deployments/{}/{}",
            self.endpoint.trim().trim_end_matches('/'),
            self.deployment.trim(),
            operation.trim_start_matches('/')
        ))?;
        url.query_pairs_mut()
            .append_pair("api-version", self.api_version.trim());
        Ok(url)
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client, ChatError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|error| ChatError::Config(format!("http client setup failed: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> AzureOpenAiConfig {
        AzureOpenAiConfig::new(endpoint, "secret", "2024-02-01", "text-embedding-ada-002")
    }

    #[test]
    fn operation_url_joins_deployment_and_version() {
        let url = config("https://example.openai.azure.com/")
            .operation_url("embeddings")
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://example.openai.azure.com/openai/deployments/text-embedding-ada-002/embeddings?api-version=2024-02-01"
        );
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let mut config = config("https://example.openai.azure.com");
        config.api_key = "  ".to_string();

        let result = config.validate();
        assert!(matches!(result, Err(ChatError::Config(details)) if details.contains("api key")));
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        assert!(matches!(config("not a url").validate(), Err(ChatError::Url(_))));
        assert!(matches!(
            config("ftp://example.com").validate(),
            Err(ChatError::Config(_))
        ));
    }
}
