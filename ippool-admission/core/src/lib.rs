//! Admission decisions for VirtualMachines with static IP pools.
//!
//! A VirtualMachine requests static addresses through an annotation on its
//! instance template. This crate decides, per admission request, whether that
//! request changes the VM's pool membership:
//!
//! - Requests that do not touch a pool are allowed outright ("by pass").
//! - Requests that do are forwarded to a [`Reconcile`] implementation, whose
//!   verdict becomes the admission response.
//! - Requests whose objects cannot be decoded (or, on delete, fetched) are
//!   rejected.
//!
//! ```text
//! [ Request ] -> decode -> read_pool -> (update: diff) -> Decision -> [ Reconcile ] -> Verdict
//! ```
//!
//! Nothing here patches the admitted object or talks to the cluster directly;
//! decoding, fetching and reconciliation are capabilities passed in by the
//! caller.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod decision;
pub mod lifecycle;
pub mod pool;

pub use self::{
    decision::{Decision, Forward, Operation, Rejection, Verdict, BY_PASS},
    lifecycle::{
        decide_create, decide_delete, decide_update, on_create, on_delete, on_update, Decode,
        Fetch, Reconcile, Request,
    },
    pool::{diff, read_pool, PoolSpec},
};
pub use vm_ippool_admission_k8s_api as k8s;
