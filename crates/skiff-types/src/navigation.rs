//! Navigation-facing enums shared across the engine.
//!
//! These are the vocabulary of a traversal request: who asked for it, how
//! the history list should be mutated, and how the resulting document swap
//! is observed by script.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the user was involved in a navigation or traversal.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum UserNavigationInvolvement {
    /// Triggered directly through browser chrome (back button, menu).
    BrowserUi,
    /// Triggered by script during transient user activation (a click handler).
    Activation,
    /// No user involvement (pure script).
    None,
}

/// Whether a new entry pushes onto the history list or replaces the
/// current entry in place.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum HistoryHandling {
    Push,
    Replace,
}

/// The script-observable classification of a history step.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum NavigationType {
    Push,
    Replace,
    Reload,
    Traverse,
}

/// System-level visibility of a top-level traversable's window.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum VisibilityState {
    Visible,
    Hidden,
}

/// Scroll restoration behavior recorded on a session history entry.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ScrollRestorationMode {
    /// The user agent restores scroll position on traversal.
    #[default]
    Auto,
    /// Script owns scroll restoration.
    Manual,
}

/// Whether a push/replace may run on the synchronous lane (same-document,
/// no unload, scoped to one navigable) instead of the serialized queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SynchronousNavigation {
    Yes,
    No,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_strum_display_kebab_case() {
        assert_eq!(UserNavigationInvolvement::BrowserUi.to_string(), "browser-ui");
        assert_eq!(HistoryHandling::Replace.to_string(), "replace");
        assert_eq!(VisibilityState::Hidden.to_string(), "hidden");
        assert_eq!(ScrollRestorationMode::Manual.to_string(), "manual");
    }

    #[test]
    fn test_strum_parse_roundtrip() {
        assert_eq!(
            NavigationType::from_str("traverse").unwrap(),
            NavigationType::Traverse
        );
        assert_eq!(
            UserNavigationInvolvement::from_str("none").unwrap(),
            UserNavigationInvolvement::None
        );
    }

    #[test]
    fn test_scroll_restoration_default_is_auto() {
        assert_eq!(ScrollRestorationMode::default(), ScrollRestorationMode::Auto);
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&NavigationType::Reload).unwrap();
        let parsed: NavigationType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, NavigationType::Reload);
    }
}
