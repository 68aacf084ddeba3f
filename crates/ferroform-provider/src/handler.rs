use std::future::Future;
use std::pin::Pin;

use ferroform_core::Schema;
use ferroform_core::attrs::Attributes;
use ferroform_core::schema::Delta;
use serde_json::Value;

use crate::conns::ProviderMeta;
use crate::context::OperationContext;
use crate::error::ProviderError;
use crate::state::InstanceState;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One impl per resource type.
///
/// Handlers are stateless: the shared client handles and default tags come
/// in through `meta`, cancellation and deadlines through `ctx`. Desired
/// attributes arrive validated, defaulted, and with `tags_all` merged.
///
/// Methods return boxed futures for dyn compatibility.
pub trait ResourceHandler: Send + Sync {
    fn schema(&self) -> &'static Schema;

    fn type_name(&self) -> &'static str {
        self.schema().type_name
    }

    /// Create the remote entity and return its refreshed state.
    fn create<'a>(
        &'a self,
        ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        desired: &'a Attributes,
    ) -> BoxFuture<'a, Result<InstanceState, ProviderError>>;

    /// Read current remote state. `None` = doesn't exist.
    fn read<'a>(
        &'a self,
        ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<InstanceState>, ProviderError>>;

    /// Apply `delta` (never empty, never a replacement) and return the
    /// refreshed state. A failure after some calls went through is reported
    /// as [`ProviderError::PartialUpdate`].
    fn update<'a>(
        &'a self,
        ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        prior: &'a InstanceState,
        desired: &'a Attributes,
        delta: &'a Delta,
    ) -> BoxFuture<'a, Result<InstanceState, ProviderError>>;

    /// Tear down the remote entity. Already gone is success.
    fn delete<'a>(
        &'a self,
        ctx: &'a OperationContext,
        meta: &'a ProviderMeta,
        state: &'a InstanceState,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;
}

/// Records which attributes an update has applied so far, so a failure can
/// report partial progress instead of all-or-nothing.
pub struct UpdateProgress<'a> {
    prior: &'a InstanceState,
    desired: &'a Attributes,
    applied: Vec<String>,
}

impl<'a> UpdateProgress<'a> {
    pub fn new(prior: &'a InstanceState, desired: &'a Attributes) -> Self {
        Self {
            prior,
            desired,
            applied: Vec::new(),
        }
    }

    pub fn applied(&mut self, field: &str) {
        self.applied.push(field.to_string());
    }

    pub fn applied_fields(&self) -> &[String] {
        &self.applied
    }

    /// Wrap `err` with the progress made before `field` failed. With
    /// nothing applied yet the error passes through unchanged.
    pub fn fail(self, field: &str, err: ProviderError) -> ProviderError {
        if self.applied.is_empty() {
            return err;
        }

        let mut state = self.prior.attributes.clone();
        for name in &self.applied {
            let value = self.desired.get(name).cloned().unwrap_or(Value::Null);
            state.insert(name.clone(), value);
        }

        ProviderError::PartialUpdate {
            applied: self.applied,
            failed_attribute: field.to_string(),
            source: Box::new(err),
            state: Box::new(Value::Object(state)),
        }
    }
}

/// Wrap a failure that happened after the remote entity `id` was created.
/// The returned state carries `desired` plus `extra` and is marked tainted.
pub fn incomplete_create(
    resource_type: &str,
    id: &str,
    desired: &Attributes,
    extra: Attributes,
    err: ProviderError,
) -> ProviderError {
    let mut attributes = desired.clone();
    attributes.extend(extra);
    let mut state = InstanceState::new(resource_type, id, attributes);
    state.tainted = true;

    ProviderError::IncompleteCreate {
        source: Box::new(err),
        state: Box::new(state),
    }
}
