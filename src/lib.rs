//! Status Checker - death-date reconciliation for tracked people
//!
//! Scans a record store for people without a recorded death date, looks each
//! one up on Wikidata (via Wikipedia title resolution), writes back birth and
//! death dates, and notifies subscribers when a death is newly discovered.
//!
//! ## Invocation model
//! Work is split into invocations with a wall-clock budget. Each invocation
//! handles one page and returns an opaque continuation token plus running
//! totals; a driver (or the invocation itself) feeds the token back until the
//! dataset is exhausted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use status_checker::config::CheckerConfig;
//! use status_checker::knowledge::WikidataClient;
//! use status_checker::notify::DeathNotifier;
//! use status_checker::reconcile::{InvocationPayload, Reconciler};
//! use status_checker::store::{JsonFileStore, StoreAdapter};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = CheckerConfig::from_env()?;
//! let store = StoreAdapter::new(Arc::new(JsonFileStore::open(&config.table_path).await?));
//! let knowledge = Arc::new(WikidataClient::new(&config.knowledge)?);
//! let notifier = DeathNotifier::from_config(&config.notify, &config.knowledge, Arc::new(store.clone()))?;
//! let reconciler = Reconciler::new(store, knowledge, notifier, &config);
//! let response = reconciler.invoke(InvocationPayload::default()).await;
//! println!("{}", serde_json::to_string_pretty(&response)?);
//! # Ok(())
//! # }
//! ```

// Error types
pub mod error;

// Records, keys and fingerprints
pub mod fingerprint;
pub mod model;

// Configuration
pub mod config;

// Wikipedia / Wikidata lookups
pub mod knowledge;

// Record store and continuation tokens
pub mod store;

// Death notifications
pub mod notify;

// The reconciliation loop and its drivers
pub mod reconcile;

pub use config::CheckerConfig;
pub use error::{ConfigError, KnowledgeError, NotifyError, ReconcileError, StoreError};
pub use model::{EntityId, PersonRecord};
pub use reconcile::{InvocationPayload, InvocationResponse, Reconciler};
