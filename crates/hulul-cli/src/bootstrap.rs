use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use hulul_application::{SessionStore, Sidebar};
use hulul_core::config::ClientConfig;
use hulul_core::ticket::TicketGateway;
use hulul_infrastructure::config_service::{ENV_SUPABASE_ANON_KEY, ENV_SUPABASE_URL};
use hulul_infrastructure::{
    ConfigService, DraftStore, FileSessionStorage, HululPaths, SupabaseAuthGateway, SupabaseClient,
    SupabaseTicketGateway,
};

/// Wires configuration, storage and gateways into the application services.
pub struct AppBootstrap {
    pub config: ClientConfig,
    pub session_store: Arc<SessionStore>,
    pub ticket_gateway: Arc<dyn TicketGateway>,
    pub drafts: DraftStore,
}

impl AppBootstrap {
    pub async fn initialize(paths: &HululPaths) -> Result<Self> {
        let config_service = ConfigService::from_paths(paths)?;
        let config = config_service
            .get_config()
            .context("Failed to load configuration")?;
        tracing::info!(
            "[Bootstrap] Configuration loaded from {}",
            config_service.path().display()
        );

        let client = SupabaseClient::new(&config.backend, &config.timeouts).map_err(|e| {
            anyhow!(
                "{}\nSet [backend] url and anon_key in {} or export {} and {}",
                e,
                config_service.path().display(),
                ENV_SUPABASE_URL,
                ENV_SUPABASE_ANON_KEY
            )
        })?;

        let storage = Arc::new(FileSessionStorage::from_paths(paths, &config.storage_key)?);
        tracing::info!(
            "[Bootstrap] Auth record at {}",
            storage.record_path().display()
        );

        let session_store = Arc::new(SessionStore::new(
            Arc::new(SupabaseAuthGateway::new(client.clone())),
            storage,
            config.routes.clone(),
            config.timeouts.request_timeout(),
        ));
        session_store.init().await;

        let ticket_gateway: Arc<dyn TicketGateway> =
            Arc::new(SupabaseTicketGateway::new(client, session_store.clone()));
        let drafts = DraftStore::from_paths(paths)?;

        tracing::info!("[Bootstrap] Initialization complete");
        Ok(Self {
            config,
            session_store,
            ticket_gateway,
            drafts,
        })
    }

    pub fn sidebar(&self) -> Sidebar {
        Sidebar::new(self.session_store.clone())
    }

    /// Validates the stored session and returns the signed-in user id.
    pub async fn require_user(&self) -> Result<String> {
        let state = self.session_store.check_session().await;
        state
            .user_id()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Not signed in. Run `hulul login` first."))
    }
}
