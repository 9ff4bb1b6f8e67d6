//! Route classification.

use std::fmt;
use std::time::Duration;

use http::Method;
use offline_core::{PartitionKind, ProxyRequest, RouteCategory, RoutePolicy, StrategyKind};

/// Why a request bypasses the cache machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassThroughReason {
    /// Anything other than GET.
    NonGet,
    /// Scheme other than http(s).
    UnsupportedScheme,
    /// WebSocket handshake.
    WebSocketUpgrade,
    /// The proxy isn't the active version.
    NotControlling,
}

impl fmt::Display for PassThroughReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonGet => write!(f, "non-GET method"),
            Self::UnsupportedScheme => write!(f, "unsupported scheme"),
            Self::WebSocketUpgrade => write!(f, "websocket upgrade"),
            Self::NotControlling => write!(f, "proxy not active"),
        }
    }
}

/// The governing policy for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub strategy: StrategyKind,
    pub partition: PartitionKind,
    /// Matching category, or `None` for the built-in fallback.
    pub category: Option<RouteCategory>,
    /// Position of the matching policy in the configured list.
    pub policy_index: Option<usize>,
    pub ttl: Option<Duration>,
    pub max_entries: Option<usize>,
}

impl RouteDecision {
    fn from_policy(index: usize, policy: &RoutePolicy) -> Self {
        Self {
            strategy: policy.strategy,
            partition: policy.partition,
            category: Some(policy.category),
            policy_index: Some(index),
            ttl: policy.ttl,
            max_entries: policy.max_entries,
        }
    }

    /// Documents go network-first, everything else cache-first.
    fn fallback(request: &ProxyRequest) -> Self {
        let strategy = if request.is_navigation() {
            StrategyKind::NetworkFirst
        } else {
            StrategyKind::CacheFirst
        };
        Self {
            strategy,
            partition: PartitionKind::Runtime,
            category: None,
            policy_index: None,
            ttl: None,
            max_entries: None,
        }
    }
}

/// Result of classifying a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    PassThrough(PassThroughReason),
    Route(RouteDecision),
}

impl Classification {
    /// Strategy tag, if the request enters the cache machinery.
    pub fn strategy(&self) -> Option<StrategyKind> {
        match self {
            Self::PassThrough(_) => None,
            Self::Route(decision) => Some(decision.strategy),
        }
    }
}

/// Route table in evaluation order.
///
/// Policies are grouped by category priority; within a category the
/// configured order is kept.
#[derive(Debug, Clone)]
pub struct RouteTable {
    policies: Vec<(usize, RoutePolicy)>,
}

impl RouteTable {
    /// Build a table from the configured policy list.
    pub fn new(policies: &[RoutePolicy]) -> Self {
        let mut policies: Vec<(usize, RoutePolicy)> =
            policies.iter().cloned().enumerate().collect();
        policies.sort_by_key(|(_, policy)| policy.category);
        Self { policies }
    }

    /// Classify a request.
    pub fn classify(&self, request: &ProxyRequest) -> Classification {
        if request.method != Method::GET {
            return Classification::PassThrough(PassThroughReason::NonGet);
        }
        if !request.is_http() {
            return Classification::PassThrough(PassThroughReason::UnsupportedScheme);
        }
        if request.is_websocket_upgrade() {
            return Classification::PassThrough(PassThroughReason::WebSocketUpgrade);
        }

        self.policies
            .iter()
            .find(|(_, policy)| policy.matches(request))
            .map(|(index, policy)| Classification::Route(RouteDecision::from_policy(*index, policy)))
            .unwrap_or_else(|| Classification::Route(RouteDecision::fallback(request)))
    }

    /// Policies in evaluation order, with their configured index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &RoutePolicy)> {
        self.policies.iter().map(|(index, policy)| (*index, policy))
    }

    /// Number of policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Check if the table has no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
