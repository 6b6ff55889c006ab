//! Client for the user-profile lookup RPC, grounded on the source's
//! `psych_user.UserGetInfo` stub (kitex service-discovery client there; a
//! plain HTTP client here, since this core doesn't own service discovery).

use async_trait::async_trait;
use psych_core::CoreError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub class: String,
}

/// External collaborator the report consumer calls to resolve a
/// `userId`/`unitId` pair into the name/class used on the persisted
/// record (§4.D step 2).
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_get_info(&self, user_id: &str, unit_id: &str) -> Result<UserProfile, CoreError>;
}

pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: service_name.into(),
        }
    }
}

#[derive(Serialize)]
struct UserGetInfoRequest<'a> {
    user_id: &'a str,
    unit_id: &'a str,
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn user_get_info(&self, user_id: &str, unit_id: &str) -> Result<UserProfile, CoreError> {
        let url = format!("{}/user/get-info", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&UserGetInfoRequest { user_id, unit_id })
            .send()
            .await
            .map_err(|e| CoreError::RpcError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CoreError::RpcError(format!(
                "user directory returned {}",
                resp.status()
            )));
        }

        resp.json::<UserProfile>()
            .await
            .map_err(|e| CoreError::RpcError(e.to_string()))
    }
}

#[cfg(test)]
pub mod stub {
    use super::*;
    use std::collections::HashMap;

    /// Deterministic in-process directory for tests.
    pub struct StubUserDirectory {
        profiles: HashMap<(String, String), UserProfile>,
    }

    impl StubUserDirectory {
        pub fn new() -> Self {
            Self {
                profiles: HashMap::new(),
            }
        }

        pub fn with_profile(
            mut self,
            user_id: impl Into<String>,
            unit_id: impl Into<String>,
            profile: UserProfile,
        ) -> Self {
            self.profiles.insert((user_id.into(), unit_id.into()), profile);
            self
        }
    }

    #[async_trait]
    impl UserDirectory for StubUserDirectory {
        async fn user_get_info(&self, user_id: &str, unit_id: &str) -> Result<UserProfile, CoreError> {
            self.profiles
                .get(&(user_id.to_string(), unit_id.to_string()))
                .cloned()
                .ok_or_else(|| CoreError::RpcError("no such user".to_string()))
        }
    }

    #[tokio::test]
    async fn known_profile_resolves() {
        let dir = StubUserDirectory::new().with_profile(
            "U",
            "u",
            UserProfile {
                name: "Alice".to_string(),
                class: "3A".to_string(),
            },
        );
        let profile = dir.user_get_info("U", "u").await.unwrap();
        assert_eq!(profile.name, "Alice");
    }

    #[tokio::test]
    async fn unknown_profile_errors() {
        let dir = StubUserDirectory::new();
        assert!(dir.user_get_info("U", "u").await.is_err());
    }
}
