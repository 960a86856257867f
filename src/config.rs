use crate::errors::{AgentError, AgentResult};
use crate::models::monte_carlo::{
    SimulationConfig, DEFAULT_PATH_COUNT, DEFAULT_RISK_FREE_RATE, DEFAULT_SEED,
};

/// Which parameter extractor answers queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    Llm,
    Rules,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub extractor: ExtractorKind,
    pub market_data_base_url: String,
    pub exchange_suffix: String,
    pub simulation: SimulationConfig,
    pub http_timeout_secs: u64,
    pub http_max_attempts: u32,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> AgentResult<Self> {
        dotenvy::dotenv().ok();

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let default_extractor = if openai_api_key.is_some() { "llm" } else { "rules" };
        let extractor = match env_var_or("EXTRACTOR", default_extractor).to_lowercase().as_str() {
            "llm" => ExtractorKind::Llm,
            "rules" => ExtractorKind::Rules,
            other => {
                return Err(AgentError::Config(format!(
                    "EXTRACTOR: expected 'llm' or 'rules', got '{other}'"
                )))
            }
        };

        let risk_free_rate = env_var_or("RISK_FREE_RATE", &DEFAULT_RISK_FREE_RATE.to_string())
            .parse::<f64>()
            .map_err(|e| AgentError::Config(format!("RISK_FREE_RATE: {e}")))?;

        let path_count = env_var_or("PATH_COUNT", &DEFAULT_PATH_COUNT.to_string())
            .parse::<usize>()
            .map_err(|e| AgentError::Config(format!("PATH_COUNT: {e}")))?;

        let seed = env_var_or("RANDOM_SEED", &DEFAULT_SEED.to_string())
            .parse::<u64>()
            .map_err(|e| AgentError::Config(format!("RANDOM_SEED: {e}")))?;

        let http_timeout_secs = env_var_or("HTTP_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| AgentError::Config(format!("HTTP_TIMEOUT_SECS: {e}")))?;

        let http_max_attempts = env_var_or("HTTP_MAX_ATTEMPTS", "3")
            .parse::<u32>()
            .map_err(|e| AgentError::Config(format!("HTTP_MAX_ATTEMPTS: {e}")))?;

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| AgentError::Config(format!("SERVER_PORT: {e}")))?;

        let cfg = Self {
            openai_api_key,
            openai_base_url: env_var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_model: env_var_or("OPENAI_MODEL", "gpt-3.5-turbo"),
            extractor,
            market_data_base_url: env_var_or(
                "MARKET_DATA_BASE_URL",
                "https://query1.finance.yahoo.com",
            ),
            exchange_suffix: env_var_or("EXCHANGE_SUFFIX", ".SA"),
            simulation: SimulationConfig {
                risk_free_rate,
                path_count,
                seed,
            },
            http_timeout_secs,
            http_max_attempts,
            server_port,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> AgentResult<()> {
        if self.extractor == ExtractorKind::Llm && self.openai_api_key.is_none() {
            return Err(AgentError::Config(
                "EXTRACTOR=llm requires OPENAI_API_KEY".into(),
            ));
        }
        if !self.simulation.risk_free_rate.is_finite() {
            return Err(AgentError::Config("RISK_FREE_RATE must be finite".into()));
        }
        if self.simulation.path_count == 0 {
            return Err(AgentError::Config("PATH_COUNT must be positive".into()));
        }
        if self.http_max_attempts == 0 {
            return Err(AgentError::Config("HTTP_MAX_ATTEMPTS must be at least 1".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(AgentError::Config("HTTP_TIMEOUT_SECS must be positive".into()));
        }
        Ok(())
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
pub fn test_config() -> AppConfig {
    AppConfig {
        openai_api_key: None,
        openai_base_url: "http://127.0.0.1:9".into(),
        openai_model: "test-model".into(),
        extractor: ExtractorKind::Rules,
        market_data_base_url: "http://127.0.0.1:9".into(),
        exchange_suffix: ".SA".into(),
        simulation: SimulationConfig {
            risk_free_rate: 0.1425,
            path_count: 20_000,
            seed: 42,
        },
        http_timeout_secs: 1,
        http_max_attempts: 1,
        server_port: 0,
    }
}
