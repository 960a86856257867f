use crate::config::{AppConfig, ExtractorKind};
use crate::errors::{AgentError, AgentResult};
use crate::extract::llm::LlmExtractor;
use crate::extract::rules::RuleBasedExtractor;
use crate::extract::Extractor;
use crate::feeds::market_data::YahooFinanceClient;
use crate::feeds::retry::RetryPolicy;
use crate::pipeline::Pipeline;
use std::time::Duration;

/// Explicitly constructed request context: configuration plus client handles.
/// Shared read-only across requests; nothing in here is mutated after startup.
pub struct AppState {
    pub config: AppConfig,
    pub extractor: Extractor,
    pub market: YahooFinanceClient,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> AgentResult<Self> {
        let timeout = Duration::from_secs(config.http_timeout_secs);
        let retry = RetryPolicy::new(config.http_max_attempts);

        let extractor = match config.extractor {
            ExtractorKind::Llm => {
                let key = config.openai_api_key.as_deref().ok_or_else(|| {
                    AgentError::Config("EXTRACTOR=llm requires OPENAI_API_KEY".into())
                })?;
                Extractor::Llm(LlmExtractor::new(
                    &config.openai_base_url,
                    key,
                    &config.openai_model,
                    timeout,
                    retry,
                ))
            }
            ExtractorKind::Rules => Extractor::Rules(RuleBasedExtractor::new()),
        };

        let market = YahooFinanceClient::new(
            &config.market_data_base_url,
            &config.exchange_suffix,
            timeout,
            retry,
        );

        Ok(Self {
            config,
            extractor,
            market,
        })
    }

    pub fn pipeline(&self) -> Pipeline<'_, Extractor, YahooFinanceClient> {
        Pipeline::new(&self.extractor, &self.market, self.config.simulation)
    }
}
