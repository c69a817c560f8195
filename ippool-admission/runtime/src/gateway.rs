use crate::{
    core::{PoolSpec, Reconcile, Rejection, Verdict},
    k8s::{Api, Client, Ip, ListParams, ResourceExt},
};
use hyper::http::StatusCode;
use std::{collections::BTreeSet, fmt};
use tracing::{debug, info, warn};

/// Rejects pool changes that request addresses already assigned in the
/// cluster.
///
/// Assignments are read from Kube-OVN `IP` resources. Only addresses a
/// request adds are checked: on create that is the whole pool, on update the
/// entries the new pool has that the old one did not. Deletes are always
/// allowed; the addresses are released by the IPAM controller once the
/// VM's pods are gone.
#[derive(Clone)]
pub struct IpConflictGateway {
    client: Client,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Conflict {
    addr: String,
    ip: String,
    pod: String,
    namespace: String,
}

// === impl IpConflictGateway ===

impl IpConflictGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn check(&self, requested: BTreeSet<&str>, namespace: &str) -> Verdict {
        if requested.is_empty() {
            return Verdict::by_pass();
        }

        let api = Api::<Ip>::all(self.client.clone());
        let ips = match api.list(&ListParams::default()).await {
            Ok(list) => list.items,
            Err(error) => {
                warn!(%error, "Failed to list IPs");
                return Verdict::Reject(Rejection::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format_args!("failed to list ips: {error}"),
                ));
            }
        };

        check_conflicts(requested, &ips, namespace)
    }
}

#[async_trait::async_trait]
impl Reconcile for IpConflictGateway {
    async fn on_create(&self, pool: &PoolSpec, namespace: &str) -> Verdict {
        self.check(pool.pools().collect(), namespace).await
    }

    async fn on_update(&self, old: &PoolSpec, new: &PoolSpec, namespace: &str) -> Verdict {
        self.check(new.added_since(old), namespace).await
    }

    async fn on_delete(&self, pool: &PoolSpec, namespace: &str) -> Verdict {
        debug!(%pool, %namespace, "Releasing IP pool");
        Verdict::by_pass()
    }
}

fn check_conflicts<'a>(
    requested: impl IntoIterator<Item = &'a str>,
    ips: &[Ip],
    namespace: &str,
) -> Verdict {
    match find_conflict(requested, ips) {
        Some(conflict) => {
            info!(%conflict, %namespace, "Denied");
            Verdict::Reject(Rejection::new(StatusCode::CONFLICT, conflict))
        }
        None => Verdict::by_pass(),
    }
}

fn find_conflict<'a>(requested: impl IntoIterator<Item = &'a str>, ips: &[Ip]) -> Option<Conflict> {
    requested.into_iter().find_map(|addr| {
        let ip = ips.iter().find(|ip| ip.spec.holds(addr))?;
        Some(Conflict {
            addr: addr.to_string(),
            ip: ip.name_any(),
            pod: ip.spec.pod_name.clone(),
            namespace: ip.spec.namespace.clone(),
        })
    })
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ip_pool address {} conflicts with ip {} assigned to {}/{}",
            self.addr, self.ip, self.namespace, self.pod
        )
    }
}
