use crate::{
    core::{Decode, Fetch},
    k8s::{Api, Client, VirtualMachine},
};
use anyhow::{Context, Result};
use kube::core::DynamicObject;

/// Decodes admission payloads into VirtualMachines.
#[derive(Copy, Clone, Debug, Default)]
pub struct DynamicDecoder;

/// Reads VirtualMachines from the Kubernetes API.
#[derive(Clone)]
pub struct VirtualMachines {
    client: Client,
}

// === impl DynamicDecoder ===

impl Decode<DynamicObject> for DynamicDecoder {
    fn decode(&self, obj: &DynamicObject) -> Result<VirtualMachine> {
        let value = serde_json::to_value(obj)?;
        serde_json::from_value(value).context("not a valid VirtualMachine")
    }
}

// === impl VirtualMachines ===

impl VirtualMachines {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Fetch for VirtualMachines {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<VirtualMachine> {
        let api = Api::<VirtualMachine>::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }
}
