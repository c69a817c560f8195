use crate::{admission::Admission, metrics::AdmissionMetrics};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "vm-ippool-admission",
    about = "Validates static IP pool changes on KubeVirt VirtualMachines"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "vm_ippool_admission=info,warn",
        env = "VM_IPPOOL_ADMISSION_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
        } = self;

        let mut prom = <Registry>::default();
        let metrics = AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_server(server)
            .build()
            .await?;

        let admission = Admission::new(runtime.client(), metrics);
        let runtime = runtime.spawn_server(admission);
        info!("Serving VirtualMachine admission requests");

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
