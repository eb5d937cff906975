// Shelf BFF - Core Library
// Orchestration between the browser client, the record repository and the
// payment provider. Used by the HTTP server binary and the tests.

pub mod app;
pub mod config;
pub mod entities;
pub mod error;
pub mod identity;
pub mod items;
pub mod ownership;
pub mod payment;
pub mod repository;
pub mod resolver;
pub mod toggle;
pub mod uploads;
pub mod vote;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use app::{Bff, Collaborators};
pub use config::{BffConfig, RepositoryBackend};
pub use entities::{
    Billing, CheckoutLink, CheckoutSession, Comment, EntitlementChange, ImageRef, Item,
    PaymentStatus, Plan, ReferenceEntity, ReferenceKind, Tag, TagVote, VoteState, VoteType,
};
pub use error::{BffError, BffResult};
pub use identity::{BearerIdentity, Caller};
pub use items::{ItemRequest, ItemService, ResolvedReferences};
pub use ownership::{verify_owner, OwnershipGuard};
pub use payment::{
    idempotency_key, AccountUpdater, HttpPaymentProvider, PaymentConfirmation, PaymentProvider,
    PaymentReconciler, RepositoryAccountUpdater,
};
pub use repository::{
    Collection, Filter, HttpRepository, MemoryRepository, Query, Record, RecordId,
    RecordRepository, SortOrder,
};
pub use resolver::EntityResolver;
pub use toggle::{Relation, ToggleOutcome, ToggleReconciler};
pub use uploads::{FileStore, HttpFileStore, MemoryFileStore, UploadFile};
pub use vote::{CountReconciliation, VoteOutcome, VoteRequest, VoteStateMachine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
