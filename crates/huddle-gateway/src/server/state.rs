//! Gateway state
//!
//! Application state for the gateway server.

use crate::broadcast::EventDispatcher;
use crate::connection::ConnectionManager;
use crate::handlers::TypingTracker;
use huddle_cache::GatewaySessionStore;
use huddle_common::AppConfig;
use huddle_service::ServiceContext;
use std::sync::Arc;

/// Holds all shared dependencies for the gateway server
#[derive(Clone)]
pub struct GatewayState {
    service_context: Arc<ServiceContext>,
    connection_manager: Arc<ConnectionManager>,
    session_store: GatewaySessionStore,
    typing: Arc<TypingTracker>,
    /// `None` when events are routed by the caller, as in tests
    event_dispatcher: Option<Arc<EventDispatcher>>,
    config: Arc<AppConfig>,
}

impl GatewayState {
    pub fn new(
        service_context: ServiceContext,
        connection_manager: Arc<ConnectionManager>,
        session_store: GatewaySessionStore,
        typing: Arc<TypingTracker>,
        config: AppConfig,
    ) -> Self {
        Self {
            service_context: Arc::new(service_context),
            connection_manager,
            session_store,
            typing,
            event_dispatcher: None,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn with_event_dispatcher(mut self, dispatcher: Arc<EventDispatcher>) -> Self {
        self.event_dispatcher = Some(dispatcher);
        self
    }

    pub fn service_context(&self) -> &ServiceContext {
        &self.service_context
    }

    /// Owned handle for work that outlives the current handler, such as
    /// typing timers
    pub fn service_context_handle(&self) -> Arc<ServiceContext> {
        Arc::clone(&self.service_context)
    }

    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.connection_manager
    }

    pub fn session_store(&self) -> &GatewaySessionStore {
        &self.session_store
    }

    pub fn typing(&self) -> &Arc<TypingTracker> {
        &self.typing
    }

    pub fn event_dispatcher(&self) -> Option<&Arc<EventDispatcher>> {
        self.event_dispatcher.as_ref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("connection_manager", &self.connection_manager)
            .field("config", &"AppConfig")
            .finish()
    }
}
