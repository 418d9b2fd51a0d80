//! Named, composable request predicates.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::request::InterceptedRequest;

type MatchFn = dyn Fn(&InterceptedRequest) -> bool + Send + Sync;

/// A pure predicate over an intercepted request.
///
/// Matchers are built once and then evaluated any number of times, possibly
/// from several threads at once.
#[derive(Clone)]
pub struct Matcher {
    name: String,
    func: Arc<MatchFn>,
}

impl Matcher {
    /// Wrap `func`. An empty `name` is replaced by the caller's `file:line`.
    #[track_caller]
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&InterceptedRequest) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        let name = if name.is_empty() {
            caller_name(Location::caller())
        } else {
            name
        };
        Self {
            name,
            func: Arc::new(func),
        }
    }

    /// A matcher accepting every request.
    #[track_caller]
    pub fn always(name: impl Into<String>) -> Self {
        Self::new(name, |_| true)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, req: &InterceptedRequest) -> bool {
        (self.func)(req)
    }

    /// Both matchers must accept. `other` is skipped when `self` rejects.
    /// The combined matcher keeps `self`'s name.
    pub fn and(self, other: Matcher) -> Matcher {
        let (left, right) = (self.func, other.func);
        Matcher {
            name: self.name,
            func: Arc::new(move |req: &InterceptedRequest| left(req) && right(req)),
        }
    }

    /// Either matcher must accept. The combined matcher keeps `self`'s name.
    pub fn or(self, other: Matcher) -> Matcher {
        let (left, right) = (self.func, other.func);
        Matcher {
            name: self.name,
            func: Arc::new(move |req: &InterceptedRequest| left(req) || right(req)),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub(crate) fn caller_name(location: &Location<'_>) -> String {
    format!("{}:{}", location.file(), location.line())
}
