//! Per-invocation request context.
//!
//! Every top-level façade operation constructs a fresh context and hands
//! it `&mut` down the handler chain, so mutation stays single-writer
//! within one dispatch.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use uuid::Uuid;

// Layer 3: Internal module imports
use crate::registry::PolicyRegistry;
use crate::switches::FeatureSwitches;

/// Propagation bag flowing through one dispatch.
///
/// Carries the policy registry, optional feature switches, and a
/// free-form value bag middleware can use to pass data along the chain.
///
/// # Example
/// ```rust
/// use airssys_bus::context::RequestContext;
/// use airssys_bus::registry::PolicyRegistry;
/// use std::sync::Arc;
///
/// let mut context = RequestContext::new(Arc::new(PolicyRegistry::with_defaults()));
/// context.set_value("tenant", serde_json::json!("acme"));
/// assert_eq!(context.value("tenant"), Some(&serde_json::json!("acme")));
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this dispatch
    context_id: Uuid,

    /// When this context was created
    created_at: DateTime<Utc>,

    /// Named resilience policies available to middleware
    policies: Arc<PolicyRegistry>,

    /// Optional feature switches
    feature_switches: Option<Arc<FeatureSwitches>>,

    /// Free-form values set by middleware within this dispatch
    bag: HashMap<String, serde_json::Value>,
}

impl RequestContext {
    /// Creates a fresh context for one top-level dispatch.
    pub fn new(policies: Arc<PolicyRegistry>) -> Self {
        Self {
            context_id: Uuid::new_v4(),
            created_at: Utc::now(),
            policies,
            feature_switches: None,
            bag: HashMap::new(),
        }
    }

    /// Attaches a feature-switch registry.
    pub fn with_feature_switches(mut self, switches: Arc<FeatureSwitches>) -> Self {
        self.feature_switches = Some(switches);
        self
    }

    /// Unique id of this dispatch.
    pub fn context_id(&self) -> Uuid {
        self.context_id
    }

    /// When this dispatch started.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The policy registry for this dispatch.
    pub fn policies(&self) -> &Arc<PolicyRegistry> {
        &self.policies
    }

    /// The feature switches, when configured.
    pub fn feature_switches(&self) -> Option<&Arc<FeatureSwitches>> {
        self.feature_switches.as_ref()
    }

    /// Sets a bag value.
    pub fn set_value(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.bag.insert(key.into(), value);
    }

    /// Gets a bag value by key.
    pub fn value(&self, key: &str) -> Option<&serde_json::Value> {
        self.bag.get(key)
    }

    /// Age of this context.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}
