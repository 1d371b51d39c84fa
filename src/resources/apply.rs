//! Server-side apply with outcome classification

use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::controller::error::{Error, Result};
use crate::controller::sync::SyncOutcome;
use crate::resources::common::FIELD_MANAGER;

/// Classify an apply from the resource versions seen before and after it
///
/// `before` is `None` when the object did not exist.
pub fn classify(before: Option<Option<&str>>, after: Option<&str>) -> SyncOutcome {
    match before {
        None => SyncOutcome::Created,
        Some(previous) if previous.is_some() && previous == after => SyncOutcome::UpToDate,
        Some(_) => SyncOutcome::Updated,
    }
}

/// Apply a namespaced resource and report what changed
pub async fn apply_resource<T>(client: &Client, ns: &str, resource: &T) -> Result<SyncOutcome>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Serialize
        + DeserializeOwned
        + Clone
        + std::fmt::Debug,
    <T as Resource>::DynamicType: Default,
{
    let api: Api<T> = Api::namespaced(client.clone(), ns);
    let name = resource
        .meta()
        .name
        .clone()
        .ok_or(Error::MissingObjectKey(".metadata.name"))?;

    let existing = api.get_opt(&name).await?;

    let params = PatchParams::apply(FIELD_MANAGER).force();
    let applied = api.patch(&name, &params, &Patch::Apply(resource)).await?;

    let outcome = classify(
        existing
            .as_ref()
            .map(|obj| obj.meta().resource_version.as_deref()),
        applied.meta().resource_version.as_deref(),
    );
    debug!(name = %name, outcome = %outcome, "Applied resource");

    Ok(outcome)
}
