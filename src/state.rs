use crate::config::RelayConfig;
use crate::error::Result;
use crate::relay::registry::ConnectionRegistry;
use crate::relay::router::MessageRouter;
use crate::translator::{CommandTranslator, Translate};
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared relay state
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<RwLock<RelayConfig>>,
    pub registry: Arc<ConnectionRegistry>,
    pub router: Arc<MessageRouter>,
}

impl RelayState {
    /// Build state with the LLM translator named by `ai.default_llm`.
    pub fn new(config: RelayConfig) -> Result<Self> {
        let translator = CommandTranslator::from_config(&config.ai)?;
        Ok(Self::with_translator(config, Arc::new(translator)))
    }

    pub fn with_translator(config: RelayConfig, translator: Arc<dyn Translate>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&registry),
            translator,
            config.status.clone(),
        ));
        Self {
            config: Arc::new(RwLock::new(config)),
            registry,
            router,
        }
    }

    /// Path that designates extension connections.
    pub fn extension_path(&self) -> String {
        self.config.read().server.extension_path.clone()
    }
}
