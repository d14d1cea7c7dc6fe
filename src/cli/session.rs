use crate::apps::VerificationSink;
use crate::crypto::KeyPair;
use crate::node::{HttpNodeClient, RemoteNodeClient};
use crate::state::{PendingOperations, StateStore};
use crate::sync::SyncCoordinator;
use crate::trust::{FlaggingConfig, FlaggingEngine, TrustLevelStateMachine};
use crate::utils::Config;
use std::sync::Arc;

/// Everything the interactive commands operate on
pub struct Session {
    pub node: Arc<dyn RemoteNodeClient>,
    pub sink: Arc<dyn VerificationSink>,
    pub sync: SyncCoordinator,
    pub trust: TrustLevelStateMachine,
    pub flagging: FlaggingEngine,
    pub keypair: KeyPair,
    http: Option<HttpNodeClient>,
}

impl Session {
    pub fn new(
        node: Arc<dyn RemoteNodeClient>,
        sink: Arc<dyn VerificationSink>,
        store: StateStore,
        pending: PendingOperations,
        keypair: KeyPair,
        config: &Config,
    ) -> Self {
        let sync = SyncCoordinator::new(node.clone(), store.clone(), pending)
            .with_recovery_threshold(config.recovery_threshold);
        let trust = TrustLevelStateMachine::new(node.clone(), store.clone(), keypair.secret.clone());
        let flagging = FlaggingEngine::new(
            node.clone(),
            store,
            keypair.clone(),
            FlaggingConfig {
                debug_mode: config.debug_mode,
            },
        );

        Self {
            node,
            sink,
            sync,
            trust,
            flagging,
            keypair,
            http: None,
        }
    }

    /// Lets deep links naming another node be served over HTTP
    pub fn with_http(mut self, http: HttpNodeClient) -> Self {
        self.http = Some(http);
        self
    }

    pub fn store(&self) -> &StateStore {
        self.sync.store()
    }

    /// Node serving `base_url`, falling back to the session node
    pub fn node_for(&self, base_url: &str) -> Arc<dyn RemoteNodeClient> {
        match &self.http {
            Some(http) if http.base_url() != base_url.trim_end_matches('/') => {
                Arc::new(http.with_base_url(base_url))
            }
            _ => self.node.clone(),
        }
    }
}
