//! Environment-variable configuration, per spec §6.
//!
//! Loads a `.env` file first (convenient for local development, a no-op
//! in production where the variables are already in the environment),
//! then reads each variable named in the spec.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub mongo_url: String,
    pub mongo_db: String,

    pub redis_host: String,
    pub redis_password: Option<String>,

    pub mq_url: String,

    pub llm_app_id: String,
    pub llm_api_key: String,

    /// Endpoint for the one-shot report backend (§4.D), distinct from the
    /// streaming chat endpoint the same upstream app id is also used for.
    pub llm_report_endpoint: String,

    pub asr_app_key: String,
    pub asr_access_key: String,
    pub asr_resource_id: String,
    pub asr_url: String,

    pub rpc_service_name: String,

    /// Timeout applied to external calls (RPC, MQ channel open, LLM report
    /// call) that the spec leaves unbounded at this layer (§5).
    pub call_timeout: Duration,
}

impl Config {
    /// Load from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, env::VarError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            mongo_url: env::var("MONGO_URL")?,
            mongo_db: env::var("MONGO_DB")?,
            redis_host: env::var("REDIS_HOST")?,
            redis_password: env::var("REDIS_PASSWORD").ok(),
            mq_url: env::var("MQ_URL")?,
            llm_app_id: env::var("LLM_APP_ID")?,
            llm_api_key: env::var("LLM_API_KEY")?,
            llm_report_endpoint: env::var("LLM_REPORT_ENDPOINT")?,
            asr_app_key: env::var("ASR_APP_KEY")?,
            asr_access_key: env::var("ASR_ACCESS_KEY")?,
            asr_resource_id: env::var("ASR_RESOURCE_ID")?,
            asr_url: env::var("ASR_URL")?,
            rpc_service_name: env::var("RPC_SERVICE_NAME")?,
            call_timeout: Duration::from_secs(
                env::var("CALL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_call_timeout_is_ten_seconds() {
        let secs: u64 = env::var("CALL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        assert_eq!(Duration::from_secs(secs), Duration::from_secs(10));
    }
}
