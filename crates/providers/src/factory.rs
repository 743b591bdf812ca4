//! Provider construction from configuration.

use secretary_config::AppConfig;
use secretary_core::error::ProviderError;
use secretary_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the configured provider.
///
/// A missing API key is only allowed for local endpoints that ignore it.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider_config = &config.provider;
    let api_key = match (&config.api_key, is_local(&provider_config.api_url)) {
        (Some(key), _) => key.clone(),
        (None, true) => String::new(),
        (None, false) => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{}' (set SECRETARY_API_KEY)",
                provider_config.name
            )));
        }
    };

    let provider = OpenAiCompatProvider::new(
        &provider_config.name,
        &provider_config.api_url,
        api_key,
        Duration::from_secs(provider_config.timeout_secs),
    )?;

    Ok(Arc::new(provider))
}

fn is_local(url: &str) -> bool {
    url.contains("localhost") || url.contains("127.0.0.1")
}
