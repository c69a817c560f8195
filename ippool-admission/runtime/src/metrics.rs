use crate::core::{Decision, Operation, Verdict};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct AdmissionMetrics {
    decisions: Family<DecisionLabels, Counter>,
    responses: Family<ResponseLabels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct DecisionLabels {
    operation: &'static str,
    decision: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct ResponseLabels {
    operation: &'static str,
    allowed: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let decisions = Family::<DecisionLabels, Counter>::default();
        reg.register(
            "decisions",
            "Total number of VirtualMachine admission requests by decision",
            decisions.clone(),
        );

        let responses = Family::<ResponseLabels, Counter>::default();
        reg.register(
            "responses",
            "Total number of VirtualMachine admission responses, including gateway verdicts",
            responses.clone(),
        );

        Self {
            decisions,
            responses,
        }
    }

    pub(crate) fn decision(&self, operation: Operation, decision: &Decision) {
        self.decisions
            .get_or_create(&DecisionLabels {
                operation: operation.as_str(),
                decision: decision.as_str(),
            })
            .inc();
    }

    pub(crate) fn response(&self, operation: Operation, verdict: &Verdict) {
        self.responses
            .get_or_create(&ResponseLabels {
                operation: operation.as_str(),
                allowed: if verdict.is_allowed() { "true" } else { "false" },
            })
            .inc();
    }
}
