//! Navigation guards consulted before every navigation starts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Outcome of a navigation-starting check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Cancel,
}

/// Decides whether a navigation to `uri` may proceed.
pub trait NavigationPolicy: Send + Sync {
    fn decide(&self, uri: &str) -> NavigationDecision;
}

impl<F> NavigationPolicy for F
where
    F: Fn(&str) -> NavigationDecision + Send + Sync,
{
    fn decide(&self, uri: &str) -> NavigationDecision {
        self(uri)
    }
}

/// Cancels every navigation whose URI does not begin with the literal `https`.
///
/// This compares the first five characters, case-sensitively. It does not
/// parse the scheme: `httpsx://host` is allowed and `HTTPS://host` is
/// cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpsPrefixGuard;

impl HttpsPrefixGuard {
    pub const PREFIX: &'static str = "https";
}

impl NavigationPolicy for HttpsPrefixGuard {
    fn decide(&self, uri: &str) -> NavigationDecision {
        if uri.starts_with(Self::PREFIX) {
            NavigationDecision::Allow
        } else {
            NavigationDecision::Cancel
        }
    }
}

/// Lets every navigation through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl NavigationPolicy for AllowAll {
    fn decide(&self, _uri: &str) -> NavigationDecision {
        NavigationDecision::Allow
    }
}

/// Guard selection for configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuardKind {
    #[default]
    HttpsPrefix,
    AllowAll,
}

impl GuardKind {
    #[must_use]
    pub fn policy(self) -> Arc<dyn NavigationPolicy> {
        match self {
            Self::HttpsPrefix => Arc::new(HttpsPrefixGuard),
            Self::AllowAll => Arc::new(AllowAll),
        }
    }
}
