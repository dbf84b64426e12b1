// Fetch lifecycle state.
// Tagged state plus a pure transition function, free of I/O.

use serde::{Deserialize, Serialize};

/// Reported lifecycle state of one fetch operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum FetchState<T> {
    /// No identifier supplied, or identifier cleared.
    #[default]
    Idle,
    /// Operation in flight. Carries neither data nor error.
    Loading,
    Fetched(T),
    Error(String),
}

/// Inputs that drive a [`FetchState`] transition.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent<T> {
    Reset,
    Start,
    Resolve(T),
    Fail(String),
}

impl<T> FetchState<T> {
    /// Compute the next state. Every event replaces the previous state
    /// wholesale, so data and error can never coexist.
    pub fn apply(self, event: FetchEvent<T>) -> FetchState<T> {
        match event {
            FetchEvent::Reset => FetchState::Idle,
            FetchEvent::Start => FetchState::Loading,
            FetchEvent::Resolve(data) => FetchState::Fetched(data),
            FetchEvent::Fail(reason) => FetchState::Error(reason),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, FetchState::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, FetchState::Fetched(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FetchState::Error(_))
    }

    /// Whether the operation has settled (`fetched` or `error`).
    pub fn is_terminal(&self) -> bool {
        self.is_fetched() || self.is_error()
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            FetchState::Fetched(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchState::Error(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            FetchState::Fetched(data) => Some(data),
            _ => None,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            FetchState::Idle => "idle",
            FetchState::Loading => "loading",
            FetchState::Fetched(_) => "fetched",
            FetchState::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let state: FetchState<u32> = FetchState::default();
        assert!(state.is_idle());
        assert_eq!(state.data(), None);
        assert_eq!(state.error(), None);
    }

    #[test]
    fn test_start_clears_previous_data() {
        let state = FetchState::Fetched(vec![1, 2]).apply(FetchEvent::Start);
        assert_eq!(state, FetchState::Loading);
        assert_eq!(state.data(), None);
    }

    #[test]
    fn test_start_clears_previous_error() {
        let state: FetchState<u8> = FetchState::Error("boom".into()).apply(FetchEvent::Start);
        assert!(state.is_loading());
        assert_eq!(state.error(), None);
    }

    #[test]
    fn test_fail_after_fetched_drops_data() {
        let state = FetchState::Fetched("old")
            .apply(FetchEvent::Start)
            .apply(FetchEvent::Fail("Not Found".into()));
        assert_eq!(state.error(), Some("Not Found"));
        assert_eq!(state.data(), None);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_resolve_and_reset() {
        let state = FetchState::Loading.apply(FetchEvent::Resolve(7));
        assert_eq!(state.data(), Some(&7));

        let state = state.apply(FetchEvent::Reset);
        assert!(state.is_idle());
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_serializes_with_status_tag() {
        let json = serde_json::to_value(FetchState::Fetched(vec![1])).unwrap();
        assert_eq!(json, serde_json::json!({"status": "fetched", "value": [1]}));

        let json = serde_json::to_value(FetchState::<u8>::Loading).unwrap();
        assert_eq!(json, serde_json::json!({"status": "loading"}));
    }
}
