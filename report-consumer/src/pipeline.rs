//! The six-step per-message pipeline (§4.D), grounded on `his_consumer.go`'s
//! `process`/`parse`/`buildMsg`.

use crate::envelope::SessionEndEnvelope;
use history_cache::HistoryCache;
use history_store::{Dialog, History, HistoryStore};
use llm_client::ReportApp;
use psych_core::CoreError;
use rpc_client::UserDirectory;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

/// Runs steps 1-7 of §4.D against one decoded envelope. Cache eviction
/// (step 7) always runs, even when the earlier steps found nothing to
/// persist, matching the original's unconditional `rs.Remove` at the end
/// of `process`.
pub async fn process(
    envelope: &SessionEndEnvelope,
    user_directory: &dyn UserDirectory,
    cache: &dyn HistoryCache,
    store: &dyn HistoryStore,
    report_app: &dyn ReportApp,
    call_timeout: Duration,
) -> Result<(), CoreError> {
    let profile = timeout(
        call_timeout,
        user_directory.user_get_info(&envelope.user_id, &envelope.unit_id),
    )
    .await
    .map_err(|_| CoreError::RpcError("user directory call timed out".to_string()))??;

    let turns = cache.load(&envelope.session_id).await?;

    let dialogs: Vec<Dialog> = turns
        .into_iter()
        .map(|turn| Dialog {
            role: turn.role.as_str().to_string(),
            content: turn.content,
        })
        .collect();

    let mut history = History::new(
        envelope.session_id.clone(),
        profile.name,
        profile.class,
        envelope.student_id.clone(),
        dialogs,
        envelope.start,
        envelope.end,
    );

    if !history.dialogs.is_empty() {
        let transcript = build_prompt(&history.dialogs);
        let report = timeout(call_timeout, report_app.call(&transcript))
            .await
            .map_err(|_| CoreError::LlmStreamError("report call timed out".to_string()))??;
        history.report = Some(report);
        store.insert(&mut history).await?;
        info!(session_id = %envelope.session_id, "history persisted");
    }

    cache.remove(&envelope.session_id).await?;
    Ok(())
}

fn build_prompt(dialogs: &[Dialog]) -> String {
    let mut prompt = String::new();
    for dialog in dialogs {
        prompt.push_str(&dialog.role);
        prompt.push(':');
        prompt.push_str(&dialog.content);
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use history_cache::InMemoryHistoryCache;
    use llm_client::Report;
    use rpc_client::UserProfile;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        inserted: Mutex<Vec<History>>,
    }

    #[async_trait::async_trait]
    impl HistoryStore for RecordingStore {
        async fn insert(&self, history: &mut History) -> Result<(), CoreError> {
            self.inserted.lock().unwrap().push(history.clone());
            Ok(())
        }
    }

    struct RejectingStore;

    #[async_trait::async_trait]
    impl HistoryStore for RejectingStore {
        async fn insert(&self, _history: &mut History) -> Result<(), CoreError> {
            panic!("insert should not be called when dialogs are empty");
        }
    }

    struct StubReportApp;

    #[async_trait::async_trait]
    impl ReportApp for StubReportApp {
        async fn call(&self, _transcript: &str) -> Result<Report, CoreError> {
            Ok(Report {
                keywords: vec!["anxiety".to_string()],
                kind: vec!["mood".to_string()],
                content: "summary".to_string(),
                grade: "B".to_string(),
                suggestion: vec!["rest".to_string()],
            })
        }
    }

    struct StubDirectory;

    #[async_trait::async_trait]
    impl UserDirectory for StubDirectory {
        async fn user_get_info(&self, _user_id: &str, _unit_id: &str) -> Result<UserProfile, CoreError> {
            Ok(UserProfile {
                name: "Alice".to_string(),
                class: "3A".to_string(),
            })
        }
    }

    fn envelope() -> SessionEndEnvelope {
        serde_json::from_str(
            r#"{"sessionId":"sid-1","start":1.0,"end":2.0,"unitId":"U1","userId":"stu-1","studentId":"S-1"}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_dialogs_skip_report_and_insert_but_still_evict_cache() {
        let cache = InMemoryHistoryCache::new();
        let store = RejectingStore;
        let directory = StubDirectory;
        let report_app = StubReportApp;

        process(&envelope(), &directory, &cache, &store, &report_app, Duration::from_secs(1))
            .await
            .unwrap();

        assert!(cache.load("sid-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn nonempty_dialogs_attach_report_and_insert() {
        let cache = InMemoryHistoryCache::new();
        cache.add_system("sid-1", "hello").await.unwrap();
        cache.add_ai("sid-1", "hi there").await.unwrap();
        let store = RecordingStore::default();
        let directory = StubDirectory;
        let report_app = StubReportApp;

        process(&envelope(), &directory, &cache, &store, &report_app, Duration::from_secs(1))
            .await
            .unwrap();

        let inserted = store.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert!(inserted[0].report.is_some());
        assert_eq!(inserted[0].dialogs.len(), 2);
    }
}
