//! Process entrypoint for the history report consumer.

use history_cache::RedisHistoryCache;
use history_store::MongoHistoryStore;
use llm_client::report::HttpReportApp;
use psych_core::Config;
use report_consumer::{run, Deps};
use rpc_client::HttpUserDirectory;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    psych_core::logging::init();
    let config = Config::from_env()?;

    let cache = RedisHistoryCache::connect(&config.redis_host, config.redis_password.as_deref()).await?;
    let store = MongoHistoryStore::connect(&config.mongo_url, &config.mongo_db).await?;
    let user_directory = HttpUserDirectory::new(config.rpc_service_name.clone());
    let report_app = HttpReportApp::new(
        config.llm_report_endpoint.clone(),
        config.llm_app_id.clone(),
        config.llm_api_key.clone(),
    );

    let deps = Deps {
        user_directory: Box::new(user_directory),
        cache: Box::new(cache),
        store: Box::new(store),
        report_app: Box::new(report_app),
        call_timeout: config.call_timeout,
    };

    run(&config.mq_url, deps).await?;
    Ok(())
}
