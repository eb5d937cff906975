// 🧩 Assembly - one value holding every orchestrator, built from config
//
// Components share collaborators through `Arc`; nothing here holds
// per-request state.

use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{BffConfig, RepositoryBackend};
use crate::identity::BearerIdentity;
use crate::items::ItemService;
use crate::payment::{
    AccountUpdater, HttpPaymentProvider, PaymentProvider, PaymentReconciler,
    RepositoryAccountUpdater,
};
use crate::repository::{HttpRepository, MemoryRepository, RecordRepository};
use crate::resolver::EntityResolver;
use crate::toggle::ToggleReconciler;
use crate::uploads::{FileStore, HttpFileStore, MemoryFileStore};
use crate::vote::VoteStateMachine;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);

/// External collaborators the orchestrators are built over
pub struct Collaborators {
    pub repo: Arc<dyn RecordRepository>,
    pub files: Arc<dyn FileStore>,
    pub payments: Arc<dyn PaymentProvider>,
    pub accounts: Arc<dyn AccountUpdater>,
    pub identity: BearerIdentity,
}

impl Collaborators {
    /// Remote or process-local record store, per `repository_backend`
    pub fn from_config(config: &BffConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        let (repo, files): (Arc<dyn RecordRepository>, Arc<dyn FileStore>) =
            match config.repository_backend {
                RepositoryBackend::Http => {
                    info!(url = %config.repository_url, "repository backend: http");
                    (
                        Arc::new(HttpRepository::new(
                            client.clone(),
                            &config.repository_url,
                            &config.repository_token,
                        )),
                        Arc::new(HttpFileStore::new(
                            client.clone(),
                            &config.repository_url,
                            &config.repository_token,
                        )),
                    )
                }
                RepositoryBackend::Memory => {
                    info!("repository backend: memory");
                    (
                        Arc::new(MemoryRepository::new()),
                        Arc::new(MemoryFileStore::new()),
                    )
                }
            };

        Ok(Collaborators {
            accounts: Arc::new(RepositoryAccountUpdater::new(repo.clone())),
            payments: Arc::new(HttpPaymentProvider::new(
                client,
                &config.payment_api_url,
                &config.payment_secret_key,
            )),
            identity: BearerIdentity::new(config.jwt_secret.clone()),
            repo,
            files,
        })
    }
}

#[derive(Clone)]
pub struct Bff {
    pub identity: BearerIdentity,
    pub resolver: Arc<EntityResolver>,
    pub items: Arc<ItemService>,
    pub toggles: Arc<ToggleReconciler>,
    pub votes: Arc<VoteStateMachine>,
    pub payments: Arc<PaymentReconciler>,
    /// Body cap applied to item creation
    pub max_upload_bytes: usize,
}

impl Bff {
    pub fn new(collaborators: Collaborators, config: &BffConfig) -> Self {
        let Collaborators {
            repo,
            files,
            payments,
            accounts,
            identity,
        } = collaborators;

        let resolver = Arc::new(EntityResolver::new(repo.clone(), config.resolve_concurrency));

        Bff {
            identity,
            items: Arc::new(ItemService::new(repo.clone(), resolver.clone(), files)),
            toggles: Arc::new(ToggleReconciler::new(repo.clone())),
            votes: Arc::new(VoteStateMachine::new(repo)),
            payments: Arc::new(PaymentReconciler::new(
                payments,
                accounts,
                config.checkout_success_url(),
                config.checkout_cancel_url(),
            )),
            resolver,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    pub fn from_config(config: &BffConfig) -> Result<Self> {
        let collaborators = Collaborators::from_config(config)?;
        Ok(Self::new(collaborators, config))
    }
}

// ============================================================================
// TESTS
// ============================================================================
