//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use toolpulse::prelude::*;
//! ```

// Core
pub use crate::core::config::{BackendConfig, Config};
pub use crate::core::errors::{Result, TpError};

// Host integration
pub use crate::page::{
    ClickTarget, InputElement, InteractionSurface, MemorySurface, PageContext, StaticPage,
};
pub use crate::session::{MemorySessionStorage, SessionIdentity, SessionStorage};

// Store
pub use crate::store::backend::{BackendError, Collection, DocumentStore, Fields};
pub use crate::store::event_store::{EventStore, EventStoreBuilder};
pub use crate::store::memory::MemoryDocumentStore;
pub use crate::store::records::{
    AnalyticsEvent, ContentMetadata, EventName, GeneratedContent, Interaction, UserPreferences,
};
pub use crate::store::selector::{BackendMode, BackendSelector};
#[cfg(feature = "sqlite")]
pub use crate::store::sqlite::SqliteDocumentStore;

// Tracking
pub use crate::tracking::containment::Containment;
pub use crate::tracking::facade::Tracker;
pub use crate::tracking::generation::{GenerationClient, HttpTransport, PromptTransport};
pub use crate::tracking::tools::Tool;
