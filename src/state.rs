use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use crate::auth::JwtVerifier;
use crate::config::ServerConfig;
use crate::core::llm::{LanguageModel, QiniuLLM};
use crate::core::stt::{QiniuSTT, SpeechRecognizer};
use crate::core::tts::{QiniuTTS, SpeechSynthesizer};
use crate::core::turn::{TurnComponents, TurnPipeline};
use crate::errors::pipeline_error::{PipelineError, PipelineResult};
use crate::store::{ConversationStore, HistoryViewCache, MemoryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

/// The three provider clients a pipeline talks to
#[derive(Clone)]
pub struct Providers {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub llm: Arc<dyn LanguageModel>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl Providers {
    /// Qiniu clients built from the server configuration
    pub fn from_config(config: &ServerConfig) -> PipelineResult<Self> {
        Ok(Self {
            recognizer: Arc::new(QiniuSTT::new(config.stt_config())?),
            llm: Arc::new(QiniuLLM::new(config.llm_config())?),
            synthesizer: Arc::new(QiniuTTS::new(config.tts_config())?),
        })
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn ConversationStore>,
    pub history_cache: HistoryViewCache,
    pub pipeline: Arc<TurnPipeline>,
    pub jwt: Option<JwtVerifier>,

    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, usize>,
}

impl AppState {
    /// Build the production state: Qiniu providers and an in-memory store
    /// seeded from the configured roles file.
    pub async fn new(config: ServerConfig) -> PipelineResult<Arc<Self>> {
        let store: Arc<dyn ConversationStore> = match &config.roles_file {
            Some(path) => Arc::new(MemoryStore::from_roles_file(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        let providers = Providers::from_config(&config)?;

        if !config.has_provider_key() {
            tracing::warn!("No provider API key configured; every turn will fail until one is set");
        }

        Self::with_components(config, providers, store)
    }

    /// Build state around caller-supplied providers and store
    pub fn with_components(
        config: ServerConfig,
        providers: Providers,
        store: Arc<dyn ConversationStore>,
    ) -> PipelineResult<Arc<Self>> {
        let history_cache = HistoryViewCache::new(config.cache_ttl());

        let jwt = match config.jwt_secret.as_deref() {
            Some(secret) => Some(
                JwtVerifier::new(secret).map_err(|e| PipelineError::Configuration(e.to_string()))?,
            ),
            None if config.auth_required => {
                return Err(PipelineError::Configuration(
                    "authentication required but no JWT secret configured".to_string(),
                ));
            }
            None => None,
        };

        let components = TurnComponents {
            recognizer: providers.recognizer,
            llm: providers.llm,
            synthesizer: providers.synthesizer,
            store: store.clone(),
            cache: Arc::new(history_cache.clone()),
        };
        let pipeline = Arc::new(TurnPipeline::new(components, config.turn_settings()));

        info!(
            workers = config.synthesis_workers,
            history_window = config.history_window,
            auth_required = config.auth_required,
            "Application state initialized"
        );

        Ok(Arc::new(Self {
            config,
            store,
            history_cache,
            pipeline,
            jwt,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        }))
    }

    /// Reserve a WebSocket slot for `ip`, honoring the global and per-IP caps
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        if let Some(max) = self.config.max_websocket_connections {
            let reserved = self
                .ws_connections
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                    (current < max).then_some(current + 1)
                });
            if reserved.is_err() {
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
        } else {
            self.ws_connections.fetch_add(1, Ordering::SeqCst);
        }

        let per_ip_max = self.config.max_connections_per_ip as usize;
        let mut count = self.ip_connections.entry(ip).or_insert(0);
        if *count >= per_ip_max {
            drop(count);
            self.ws_connections.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *count += 1;
        Ok(())
    }

    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            });
        if let Some(mut count) = self.ip_connections.get_mut(&ip) {
            *count = count.saturating_sub(1);
        }
        self.ip_connections.remove_if(&ip, |_, count| *count == 0);
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> usize {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    async fn state_with_limits(global: Option<usize>, per_ip: u32) -> Arc<AppState> {
        let mut config = ServerConfig::default();
        config.max_websocket_connections = global;
        config.max_connections_per_ip = per_ip;
        AppState::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_connection_tracking_basic() {
        let state = state_with_limits(Some(10), 3).await;
        let ip: IpAddr = Ipv4Addr::new(192, 168, 1, 100).into();

        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(state.ip_connection_count(&ip), 0);

        for expected in 1..=3 {
            assert!(state.try_acquire_connection(ip).is_ok());
            assert_eq!(state.ip_connection_count(&ip), expected);
        }

        // Fourth connection should be rejected (per-IP limit)
        assert_eq!(
            state.try_acquire_connection(ip),
            Err(ConnectionLimitError::PerIpLimitReached)
        );
        assert_eq!(state.ws_connection_count(), 3);

        state.release_connection(ip);
        assert_eq!(state.ws_connection_count(), 2);
        assert!(state.try_acquire_connection(ip).is_ok());
    }

    #[tokio::test]
    async fn test_global_connection_limit() {
        let state = state_with_limits(Some(5), 10).await;
        let ips: Vec<IpAddr> = (1..=6)
            .map(|i| Ipv4Addr::new(192, 168, 1, i).into())
            .collect();

        for ip in &ips[0..5] {
            assert!(state.try_acquire_connection(*ip).is_ok());
        }
        assert_eq!(
            state.try_acquire_connection(ips[5]),
            Err(ConnectionLimitError::GlobalLimitReached)
        );

        state.release_connection(ips[0]);
        assert_eq!(state.ip_connection_count(&ips[0]), 0);
        assert!(state.try_acquire_connection(ips[5]).is_ok());
    }

    #[tokio::test]
    async fn test_auth_required_without_secret_fails() {
        let mut config = ServerConfig::default();
        config.auth_required = true;
        let result = AppState::new(config).await;
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }
}
