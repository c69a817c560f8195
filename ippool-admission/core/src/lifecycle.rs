//! Create, update, and delete entry points.
//!
//! Each entry point first produces a [`Decision`] (`decide_*`) and then
//! resolves it against the gateway (`on_*`). Failures to decode or fetch the
//! VirtualMachine are rejected immediately and never reach the gateway.

use crate::{
    decision::{Decision, Forward, Verdict},
    k8s::{Resource, ResourceExt, VirtualMachine},
    pool::{read_pool, PoolSpec},
};
use anyhow::Result;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
mod tests;

/// An admission request as seen by the dispatcher.
#[derive(Clone, Debug, Default)]
pub struct Request<P> {
    pub namespace: String,
    pub name: String,
    /// The object's state after the operation.
    pub object: Option<P>,
    /// The object's state before the operation.
    pub old_object: Option<P>,
}

/// Decodes a request payload into a VirtualMachine.
pub trait Decode<P> {
    fn decode(&self, raw: &P) -> Result<VirtualMachine>;
}

/// Looks up the current state of a VirtualMachine.
#[async_trait::async_trait]
pub trait Fetch {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<VirtualMachine>;
}

/// Performs address-pool bookkeeping once a pool change is detected.
///
/// Implementations map their own failures to a [`Verdict`].
#[async_trait::async_trait]
pub trait Reconcile {
    async fn on_create(&self, pool: &PoolSpec, namespace: &str) -> Verdict;

    async fn on_update(&self, old: &PoolSpec, new: &PoolSpec, namespace: &str) -> Verdict;

    async fn on_delete(&self, pool: &PoolSpec, namespace: &str) -> Verdict;
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("admission request missing '{0}'")]
    Missing(&'static str),

    #[error("failed to decode '{field}': {error:#}")]
    Decode {
        field: &'static str,
        error: anyhow::Error,
    },

    #[error("failed to get VirtualMachine {namespace}/{name}: {error:#}")]
    Fetch {
        namespace: String,
        name: String,
        error: anyhow::Error,
    },
}

pub fn decide_create<P, D>(decoder: &D, req: &Request<P>) -> Decision
where
    D: Decode<P> + ?Sized,
{
    let vm = match decode(decoder, req.object.as_ref(), "object") {
        Ok(vm) => vm,
        Err(error) => return Decision::bad_request(error),
    };

    let pool = template_pool(&vm);
    if pool.is_empty() {
        return Decision::by_pass();
    }

    Decision::Forward(Forward::Create {
        namespace: namespace_of(&vm, req),
        pool,
    })
}

pub fn decide_update<P, D>(decoder: &D, req: &Request<P>) -> Decision
where
    D: Decode<P> + ?Sized,
{
    let old = match decode(decoder, req.old_object.as_ref(), "oldObject") {
        Ok(vm) => vm,
        Err(error) => return Decision::bad_request(error),
    };
    let new = match decode(decoder, req.object.as_ref(), "object") {
        Ok(vm) => vm,
        Err(error) => return Decision::bad_request(error),
    };

    let old_pool = template_pool(&old);
    let new_pool = template_pool(&new);
    if !old_pool.differs(&new_pool) {
        return Decision::by_pass();
    }

    Decision::Forward(Forward::Update {
        namespace: namespace_of(&old, req),
        old: old_pool,
        new: new_pool,
    })
}

/// Unlike create and update, delete requests are judged by the object's
/// current state in the cluster rather than the request payload.
pub async fn decide_delete<P, F>(fetcher: &F, req: &Request<P>) -> Decision
where
    F: Fetch + ?Sized,
{
    let vm = match fetcher.fetch(&req.namespace, &req.name).await {
        Ok(vm) => vm,
        Err(error) => {
            return Decision::bad_request(Error::Fetch {
                namespace: req.namespace.clone(),
                name: req.name.clone(),
                error,
            })
        }
    };

    let pool = template_pool(&vm);
    if pool.is_empty() {
        return Decision::by_pass();
    }

    Decision::Forward(Forward::Delete {
        namespace: namespace_of(&vm, req),
        pool,
    })
}

pub async fn on_create<P, D, R>(decoder: &D, gateway: &R, req: &Request<P>) -> Verdict
where
    D: Decode<P> + ?Sized,
    R: Reconcile + ?Sized,
{
    decide_create(decoder, req).resolve(gateway).await
}

pub async fn on_update<P, D, R>(decoder: &D, gateway: &R, req: &Request<P>) -> Verdict
where
    D: Decode<P> + ?Sized,
    R: Reconcile + ?Sized,
{
    decide_update(decoder, req).resolve(gateway).await
}

pub async fn on_delete<P, F, R>(fetcher: &F, gateway: &R, req: &Request<P>) -> Verdict
where
    F: Fetch + ?Sized,
    R: Reconcile + ?Sized,
{
    decide_delete(fetcher, req).await.resolve(gateway).await
}

fn decode<P, D>(decoder: &D, raw: Option<&P>, field: &'static str) -> Result<VirtualMachine, Error>
where
    D: Decode<P> + ?Sized,
{
    let raw = raw.ok_or(Error::Missing(field))?;
    decoder
        .decode(raw)
        .map_err(|error| Error::Decode { field, error })
}

fn template_pool(vm: &VirtualMachine) -> PoolSpec {
    let (pool, present) = read_pool(vm.template_annotations());
    debug!(
        kind = %VirtualMachine::kind(&()),
        name = %vm.name_any(),
        namespace = vm.namespace().as_deref().unwrap_or_default(),
        %pool,
        present,
        "Read IP pool"
    );
    pool
}

fn namespace_of<P>(vm: &VirtualMachine, req: &Request<P>) -> String {
    vm.namespace().unwrap_or_else(|| req.namespace.clone())
}
