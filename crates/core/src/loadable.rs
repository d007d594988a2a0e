//! Asynchronously populated values.

use serde::Serialize;

/// A value populated by a remote call.
///
/// `Ready(None)` ("resolved, nothing there") and `Loading` are deliberately
/// different states: consumers must never infer absence while still loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Loadable<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Loadable<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Loadable::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Loadable<U> {
        match self {
            Loadable::Loading => Loadable::Loading,
            Loadable::Ready(v) => Loadable::Ready(f(v)),
            Loadable::Failed(e) => Loadable::Failed(e),
        }
    }
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Loadable::Loading
    }
}
