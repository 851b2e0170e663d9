mod request_id;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::{authenticate, build_session_index, SessionIndex, SessionUser};
use crate::chat::detector::CompletenessDetector;
use crate::chat::orchestrator::ContinuationPolicy;
use crate::config::AppConfig;
use crate::error::ChatError;
use crate::provider::ProviderClient;
use crate::search::SearchClient;
use crate::store::{ConversationStore, MemoryStore};
use crate::transport::HttpTransport;

use request_id::TurnIdGenerator;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub provider: ProviderClient,
    pub search: SearchClient,
    pub detector: CompletenessDetector,
    pub policy: ContinuationPolicy,
    store: Arc<dyn ConversationStore>,
    sessions: SessionIndex,
    turn_ids: TurnIdGenerator,
    shutdown: CancellationToken,
}

impl AppState {
    /// Wire up clients and indexes from a validated config.
    ///
    /// The provider and search clients share one outbound HTTP transport.
    #[must_use]
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ConversationStore>,
        shutdown: CancellationToken,
    ) -> Self {
        let transport = Arc::new(HttpTransport::new(&config.server));
        let provider = ProviderClient::new(config.provider.clone(), Arc::clone(&transport));
        let search = SearchClient::new(config.search.clone(), transport);
        let detector = CompletenessDetector::from_config(&config.continuation);
        let policy = ContinuationPolicy::from_config(&config.continuation, &config.provider);
        let sessions = build_session_index(&config);

        Self {
            config,
            provider,
            search,
            detector,
            policy,
            store,
            sessions,
            turn_ids: TurnIdGenerator::new(),
            shutdown,
        }
    }

    /// State backed by a fresh [`MemoryStore`] and its own shutdown token.
    #[must_use]
    pub fn with_memory_store(config: AppConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()), CancellationToken::new())
    }

    /// # Errors
    ///
    /// `ChatError::Auth` when the request carries no known session token.
    #[inline]
    pub fn authenticate(&self, headers: &http::HeaderMap) -> Result<Arc<SessionUser>, ChatError> {
        authenticate(headers, &self.sessions)
    }

    #[must_use]
    pub fn store(&self) -> &dyn ConversationStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn next_turn_id(&self) -> uuid::Uuid {
        self.turn_ids.next_id()
    }

    /// Process-wide shutdown signal; chat turns run on child tokens.
    #[must_use]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}
