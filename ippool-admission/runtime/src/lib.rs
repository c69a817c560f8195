#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use vm_ippool_admission_core as core;
pub use vm_ippool_admission_k8s_api as k8s;

mod admission;
mod args;
mod cluster;
mod gateway;
mod metrics;

pub use self::{
    admission::Admission,
    args::Args,
    cluster::{DynamicDecoder, VirtualMachines},
    gateway::IpConflictGateway,
    metrics::AdmissionMetrics,
};
