#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod ip;
pub mod virtual_machine;

pub use self::{
    ip::{Ip, IpSpec},
    virtual_machine::{VirtualMachine, VirtualMachineInstanceTemplateSpec, VirtualMachineSpec},
};
pub use kube::{
    api::{Api, ListParams, ObjectMeta, ResourceExt},
    Client, Resource,
};

/// Annotation on a VM's template listing the static addresses its pods draw
/// from, as a comma-separated list.
pub const IP_POOL_ANNOTATION: &str = "ovn.kubernetes.io/ip_pool";
