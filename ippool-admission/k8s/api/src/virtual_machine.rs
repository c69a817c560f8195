use kube::{api::ObjectMeta, CustomResource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The subset of a KubeVirt VirtualMachine that admission cares about.
///
/// The CRD is owned by KubeVirt, so no schema is generated here. Fields not
/// modeled are ignored on decode.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachine",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_strategy: Option<String>,
    /// Template for the VirtualMachineInstance (and its launcher pod).
    pub template: VirtualMachineInstanceTemplateSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct VirtualMachineInstanceTemplateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,
}

impl VirtualMachine {
    /// Annotations set on the instance template, if any.
    pub fn template_annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.spec
            .template
            .metadata
            .as_ref()
            .and_then(|meta| meta.annotations.as_ref())
    }
}
