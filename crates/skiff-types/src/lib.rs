//! Shared identity and navigation types for skiff.
//!
//! This crate is the vocabulary of the session-history engine: typed IDs,
//! the navigation enums, and the opaque serialized-state blob. It has **no
//! internal skiff dependencies** — a pure leaf crate that other crates
//! build on.
//!
//! # Key Types
//!
//! |--------------------------------|------------------------------------------|
//! | Type                           | Purpose                                  |
//! |--------------------------------|------------------------------------------|
//! | [`NavigableId`]                | Which frame                              |
//! | [`BrowsingContextId`]          | Non-owning back-reference to a context   |
//! | [`DocumentId`]                 | Opaque handle to a collaborator document |
//! | [`NavigationApiKey`]           | Entry identity stable across replace     |
//! | [`NavigationApiId`]            | Entry identity unique per instance       |
//! | [`DomNodeId`]                  | Renderer node handle (screenshots)       |
//! | [`SerializedState`]            | Opaque script-visible history state      |
//! | [`UserNavigationInvolvement`]  | Who asked for the traversal              |
//! | [`HistoryHandling`]            | Push vs. replace                         |
//! |--------------------------------|------------------------------------------|

pub mod ids;
pub mod navigation;
pub mod state;

// Re-export primary types at crate root for convenience.
pub use ids::{
    BrowsingContextId, DocumentId, DomNodeId, NavigableId, NavigationApiId, NavigationApiKey,
};
pub use navigation::{
    HistoryHandling, NavigationType, ScrollRestorationMode, SynchronousNavigation,
    UserNavigationInvolvement, VisibilityState,
};
pub use state::{SerializedState, StateError};
