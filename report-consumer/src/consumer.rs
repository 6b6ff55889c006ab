//! The long-running AMQP consumer loop (§4.D), grounded on
//! `his_consumer.go`'s `consume`/`Start`/`osSignalHandler`.

use crate::envelope::SessionEndEnvelope;
use crate::pipeline;
use futures_util::StreamExt;
use history_cache::HistoryCache;
use history_store::HistoryStore;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use llm_client::ReportApp;
use psych_core::CoreError;
use rpc_client::UserDirectory;
use std::time::Duration;
use tracing::{error, info, warn};

pub const QUEUE_NAME: &str = "chat_history_huasi";
pub const CONSUMER_TAG: &str = "history_consumer_huasi";

pub struct Deps {
    pub user_directory: Box<dyn UserDirectory>,
    pub cache: Box<dyn HistoryCache>,
    pub store: Box<dyn HistoryStore>,
    pub report_app: Box<dyn ReportApp>,
    pub call_timeout: Duration,
}

/// Connects, sets QoS prefetch 1, and consumes until a shutdown signal
/// arrives. Runs the in-flight message to completion before returning.
pub async fn run(mq_url: &str, deps: Deps) -> Result<(), CoreError> {
    let connection = Connection::connect(mq_url, ConnectionProperties::default())
        .await
        .map_err(|e| CoreError::RpcError(format!("amqp connect failed: {e}")))?;
    let channel = connection
        .create_channel()
        .await
        .map_err(|e| CoreError::RpcError(format!("amqp channel open failed: {e}")))?;

    channel
        .basic_qos(1, BasicQosOptions::default())
        .await
        .map_err(|e| CoreError::RpcError(format!("amqp qos failed: {e}")))?;

    let mut consumer = channel
        .basic_consume(
            QUEUE_NAME,
            CONSUMER_TAG,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| CoreError::RpcError(format!("amqp consume failed: {e}")))?;

    info!(queue = QUEUE_NAME, tag = CONSUMER_TAG, "consuming");

    let mut shutdown = shutdown_signal();

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping after in-flight message");
                break;
            }
            delivery = consumer.next() => {
                let Some(delivery) = delivery else {
                    warn!("consumer stream ended");
                    break;
                };
                let delivery = match delivery {
                    Ok(d) => d,
                    Err(e) => {
                        error!(error = %e, "delivery error");
                        continue;
                    }
                };
                handle_delivery(&channel, delivery, &deps).await;
            }
        }
    }

    Ok(())
}

async fn handle_delivery(_channel: &Channel, delivery: lapin::message::Delivery, deps: &Deps) {
    match process_delivery(&delivery.data, deps).await {
        Ok(()) => {
            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                error!(error = %e, "ack failed");
            }
        }
        Err(e) => {
            error!(error = %e, "processing failed, nacking with requeue");
            if let Err(e) = delivery
                .nack(BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                })
                .await
            {
                error!(error = %e, "nack failed");
            }
        }
    }
}

async fn process_delivery(body: &[u8], deps: &Deps) -> Result<(), CoreError> {
    let envelope: SessionEndEnvelope = serde_json::from_slice(body)?;
    pipeline::process(
        &envelope,
        deps.user_directory.as_ref(),
        deps.cache.as_ref(),
        deps.store.as_ref(),
        deps.report_app.as_ref(),
        deps.call_timeout,
    )
    .await
}

fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    Box::pin(async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
            let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
            tokio::select! {
                _ = sigint.recv() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
    })
}
