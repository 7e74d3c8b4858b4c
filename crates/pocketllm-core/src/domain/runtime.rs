//! Runtime state machine and loaded-model description.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::artifact::ArtifactId;

/// Lifecycle state of the single native inference context.
///
/// ```text
/// uninitialized --initialize--> loading --success--> ready <--> generating
///                                  |                                |
///                                  +--failure--> error <--invalid---+
///                                                  |
///                                                  +--reset--> uninitialized
/// any --release--> released
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeState {
    Uninitialized,
    Loading,
    Ready,
    Generating,
    Error,
    Released,
}

impl RuntimeState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use RuntimeState::{Error, Generating, Loading, Ready, Released, Uninitialized};

        matches!(
            (self, next),
            (Uninitialized | Released, Loading)
                | (Loading, Ready | Error)
                | (Ready, Generating)
                | (Generating, Ready | Error)
                | (Error, Uninitialized)
                | (_, Released)
        )
    }

    /// Whether a native context is expected to exist in this state.
    pub const fn has_context(self) -> bool {
        matches!(self, Self::Ready | Self::Generating)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Generating => "generating",
            Self::Error => "error",
            Self::Released => "released",
        }
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of the model currently bound to the native context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedModel {
    /// Catalog id of the loaded artifact, if it came from the catalog.
    pub artifact_id: Option<ArtifactId>,
    /// Model name, for settings and logs.
    pub model_name: String,
    /// Absolute path of the file the context was created from.
    pub path: PathBuf,
    /// Context length actually negotiated by the engine.
    pub context_length: u64,
    /// Whether the engine offloaded work to an accelerator.
    pub gpu: bool,
}

#[cfg(test)]
mod tests {
    use super::RuntimeState::*;
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(Uninitialized.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Released));
        assert!(Released.can_transition_to(Loading));
    }

    #[test]
    fn test_error_requires_reset() {
        assert!(Loading.can_transition_to(Error));
        assert!(!Error.can_transition_to(Loading));
        assert!(Error.can_transition_to(Uninitialized));
        // A generation that finds its context invalid
        assert!(Generating.can_transition_to(Error));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Uninitialized.can_transition_to(Ready));
        assert!(!Loading.can_transition_to(Generating));
        assert!(!Generating.can_transition_to(Loading));
        assert!(!Ready.can_transition_to(Error));
        assert!(!Ready.can_transition_to(Loading));
    }

    #[test]
    fn test_release_from_anywhere() {
        for state in [Uninitialized, Loading, Ready, Generating, Error, Released] {
            assert!(state.can_transition_to(Released), "{state} -> released");
        }
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&Generating).unwrap();
        assert_eq!(json, "\"generating\"");
    }
}
