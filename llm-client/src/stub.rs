//! A deterministic in-process chat backend.
//!
//! Stands in for the real streaming chat upstream: splits the echoed
//! response into a few fragments so callers can exercise multi-fragment
//! forwarding without a network dependency. Assigns one `session_id` per
//! stub instance, mirroring the real backend's "assigned on first response"
//! behavior.

use crate::fragment::{ChatFragment, Finish};
use crate::{ChatApp, Scanner};
use async_trait::async_trait;
use psych_core::CoreError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct StubChatApp {
    session_id: String,
    greeting_reply: String,
}

impl StubChatApp {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            greeting_reply: "我是你的对话助手".to_string(),
        }
    }

    pub fn with_reply(session_id: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            greeting_reply: reply.into(),
        }
    }
}

#[async_trait]
impl ChatApp for StubChatApp {
    async fn stream_call(&self, prompt: &str) -> Result<Box<dyn Scanner>, CoreError> {
        let reply = if prompt.contains("你好") {
            self.greeting_reply.clone()
        } else {
            format!("收到: {}", prompt)
        };
        let words: Vec<String> = reply.chars().map(|c| c.to_string()).collect();
        Ok(Box::new(StubScanner {
            session_id: self.session_id.clone(),
            words,
            idx: 0,
            seq: Arc::new(AtomicU64::new(1)),
        }))
    }
}

struct StubScanner {
    session_id: String,
    words: Vec<String>,
    idx: usize,
    seq: Arc<AtomicU64>,
}

#[async_trait]
impl Scanner for StubScanner {
    async fn next(&mut self) -> Result<Option<ChatFragment>, CoreError> {
        if self.idx >= self.words.len() {
            return Ok(None);
        }
        let content = self.words[self.idx].clone();
        self.idx += 1;
        let id = self.seq.fetch_add(1, Ordering::SeqCst);
        let finish = if self.idx >= self.words.len() {
            Finish::Stop
        } else {
            Finish::Continue
        };
        Ok(Some(ChatFragment {
            id,
            content,
            session_id: self.session_id.clone(),
            timestamp: 0,
            finish,
        }))
    }

    async fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_call_yields_one_fragment_per_char_then_ends() {
        let app = StubChatApp::new("sid-1");
        let mut scanner = app.stream_call("你好").await.unwrap();

        let mut content = String::new();
        while let Some(frag) = scanner.next().await.unwrap() {
            assert_eq!(frag.session_id, "sid-1");
            content.push_str(&frag.content);
        }
        assert_eq!(content, "我是你的对话助手");
    }

    #[tokio::test]
    async fn two_calls_share_the_same_session_id() {
        let app = StubChatApp::new("sid-fixed");
        let mut s1 = app.stream_call("你好").await.unwrap();
        let mut s2 = app.stream_call("再见").await.unwrap();
        let f1 = s1.next().await.unwrap().unwrap();
        let f2 = s2.next().await.unwrap().unwrap();
        assert_eq!(f1.session_id, f2.session_id);
    }
}
