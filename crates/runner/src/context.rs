use std::{future::Future, sync::Arc, time::Duration};

use axum::Router;
use gateway::GatewayServer;
use memory::{EmbeddingAdapter, LibsqlStore};
use runtime::{
    CasualPatterns, ChatService, IntentClassifier, ResponsePolicy, RuleSet, SemanticSearch,
    SessionManager, SessionSettings, SessionSweeper,
};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use types::{Embedder, FaqIndex, HelpdeskConfig, MIN_SWEEP_INTERVAL_SECS, SessionStore};

/// Process-wide services, built once at startup and shared behind `Arc`.
pub struct AppContext {
    config: HelpdeskConfig,
    embedder: Arc<dyn Embedder>,
    store: Arc<LibsqlStore>,
    sessions: Arc<SessionManager>,
    chat: Arc<ChatService>,
}

impl AppContext {
    pub async fn build(config: HelpdeskConfig) -> Result<Self, crate::BootstrapError> {
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingAdapter::from_config(&config.embedding)?);
        Self::build_with_embedder(config, embedder).await
    }

    pub async fn build_with_embedder(
        config: HelpdeskConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, crate::BootstrapError> {
        let store = Arc::new(LibsqlStore::from_config(&config.store).await?);

        let rules = RuleSet::load(config.analyzers.rules_path.as_deref())?;
        let patterns = CasualPatterns::load(config.classifier.patterns_path.as_deref())?;
        let classifier = IntentClassifier::new(
            embedder.clone(),
            patterns,
            config.classifier.casual_threshold,
        )?;
        let faq_index: Arc<dyn FaqIndex> = store.clone();
        let search = SemanticSearch::new(
            embedder.clone(),
            faq_index,
            config.search.similarity_threshold,
            config.search.top_k,
        );
        let policy = ResponsePolicy::new(classifier, search);

        let session_store: Arc<dyn SessionStore> = store.clone();
        let sessions = Arc::new(SessionManager::new(
            session_store,
            SessionSettings::from_config(&config.session),
        ));
        let chat = Arc::new(ChatService::new(
            policy,
            sessions.clone(),
            &rules,
            config.server.max_message_chars,
        ));

        tracing::info!(
            embedding_model = embedder.model_id(),
            casual_threshold = config.classifier.casual_threshold,
            similarity_threshold = config.search.similarity_threshold,
            "application context ready"
        );
        Ok(Self {
            config,
            embedder,
            store,
            sessions,
            chat,
        })
    }

    pub fn config(&self) -> &HelpdeskConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<LibsqlStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn chat(&self) -> &Arc<ChatService> {
        &self.chat
    }

    /// A standalone FAQ search with the configured threshold and fan-out.
    pub fn faq_search(&self) -> SemanticSearch {
        let faq_index: Arc<dyn FaqIndex> = self.store.clone();
        SemanticSearch::new(
            self.embedder.clone(),
            faq_index,
            self.config.search.similarity_threshold,
            self.config.search.top_k,
        )
    }

    pub fn router(&self) -> Router {
        Arc::new(GatewayServer::new(self.chat.clone())).router()
    }

    pub fn spawn_sweeper(&self, cancellation: CancellationToken) -> JoinHandle<()> {
        let period = self
            .sessions
            .settings()
            .sweep_interval
            .to_std()
            .unwrap_or(Duration::from_secs(MIN_SWEEP_INTERVAL_SECS));
        let sweeper = SessionSweeper::new(self.sessions.clone(), period, cancellation);
        tokio::spawn(async move { sweeper.run().await })
    }

    /// Serves the HTTP API until `shutdown` resolves, then stops the sweeper.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), crate::BootstrapError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let bind_address = self.config.server.bind_address.clone();
        let listener = TcpListener::bind(&bind_address).await.map_err(|source| {
            crate::BootstrapError::Bind {
                bind_address: bind_address.clone(),
                source,
            }
        })?;
        let local_address = listener.local_addr().map_err(crate::BootstrapError::Serve)?;

        let cancellation = CancellationToken::new();
        let sweeper = self.spawn_sweeper(cancellation.clone());
        tracing::info!(address = %local_address, "helpdesk API listening");

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(crate::BootstrapError::Serve);

        cancellation.cancel();
        if let Err(error) = sweeper.await {
            tracing::warn!("session sweeper task failed: {error}");
        }
        tracing::info!("helpdesk API stopped");
        result
    }
}
