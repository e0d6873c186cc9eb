//! External collaborators consumed by the scoring engine.
//!
//! Subscore providers and the narrative generator are resolved once at startup into a
//! [`ProviderSet`]. An empty slot means "not configured"; call sites ask the set instead of
//! probing optional globals.

mod remote;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::domain::{ScoreKey, SubscoreCategory};
use super::report::NarrativeContext;
use crate::config::ProviderEndpoints;

pub use remote::{RemoteNarrativeGenerator, RemoteSubscoreProvider};

/// Produces one category's subscore for a user and quarter.
#[async_trait]
pub trait SubscoreProvider: Send + Sync {
    /// `Ok(None)` means the provider found no data for this key.
    async fn compute(&self, key: &ScoreKey) -> Result<Option<f64>, ProviderError>;
}

/// Turns structured evaluation context into prose. Output is best-effort.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, context: &NarrativeContext) -> Result<String, NarrativeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("subscore provider transport error: {0}")]
    Transport(String),
    #[error("subscore provider returned status {0}")]
    Status(u16),
    #[error("subscore provider returned malformed payload: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("narrative generator transport error: {0}")]
    Transport(String),
    #[error("narrative generator returned status {0}")]
    Status(u16),
    #[error("narrative generator returned malformed payload: {0}")]
    Malformed(String),
}

/// Capability set: at most one provider per category plus an optional narrator.
#[derive(Clone, Default)]
pub struct ProviderSet {
    weekly: Option<Arc<dyn SubscoreProvider>>,
    qualitative: Option<Arc<dyn SubscoreProvider>>,
    peer: Option<Arc<dyn SubscoreProvider>>,
    narrator: Option<Arc<dyn NarrativeGenerator>>,
}

impl ProviderSet {
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds remote adapters for every endpoint that is configured.
    pub fn from_endpoints(
        endpoints: &ProviderEndpoints,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut set = Self::none();
        for category in SubscoreCategory::ALL {
            if let Some(url) = endpoints.subscore_url(category) {
                let provider = RemoteSubscoreProvider::new(url, timeout)?;
                set = set.with_provider(category, Arc::new(provider));
            }
        }

        if let Some(url) = endpoints.narrative_url.as_deref() {
            let narrator = RemoteNarrativeGenerator::new(url, timeout)
                .map_err(|err| ProviderError::Transport(err.to_string()))?;
            set = set.with_narrator(Arc::new(narrator));
        }

        info!(
            configured = ?set.configured_categories(),
            narrator = set.narrator.is_some(),
            "resolved scoring collaborators"
        );
        Ok(set)
    }

    pub fn with_provider(
        mut self,
        category: SubscoreCategory,
        provider: Arc<dyn SubscoreProvider>,
    ) -> Self {
        match category {
            SubscoreCategory::Weekly => self.weekly = Some(provider),
            SubscoreCategory::Qualitative => self.qualitative = Some(provider),
            SubscoreCategory::Peer => self.peer = Some(provider),
        }
        self
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn NarrativeGenerator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    pub fn provider(&self, category: SubscoreCategory) -> Option<&Arc<dyn SubscoreProvider>> {
        match category {
            SubscoreCategory::Weekly => self.weekly.as_ref(),
            SubscoreCategory::Qualitative => self.qualitative.as_ref(),
            SubscoreCategory::Peer => self.peer.as_ref(),
        }
    }

    pub fn narrator(&self) -> Option<&Arc<dyn NarrativeGenerator>> {
        self.narrator.as_ref()
    }

    pub fn configured_categories(&self) -> Vec<SubscoreCategory> {
        SubscoreCategory::ALL
            .into_iter()
            .filter(|category| self.provider(*category).is_some())
            .collect()
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("configured", &self.configured_categories())
            .field("narrator", &self.narrator.is_some())
            .finish()
    }
}
