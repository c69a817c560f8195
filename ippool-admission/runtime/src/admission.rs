use crate::{
    cluster::{DynamicDecoder, VirtualMachines},
    core::{
        decide_create, decide_delete, decide_update, Fetch, Operation, Reconcile, Rejection,
        Request as VmRequest, Verdict,
    },
    gateway::IpConflictGateway,
    k8s::{Client, Resource, VirtualMachine},
    metrics::AdmissionMetrics,
};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::{admission, DynamicObject};
use thiserror::Error;
use tracing::{debug, info, trace, warn};


/// Validates VirtualMachine admission requests, forwarding IP-pool changes
/// to a [`Reconcile`] implementation.
#[derive(Clone)]
pub struct Admission<F = VirtualMachines, G = IpConflictGateway> {
    fetcher: F,
    gateway: G,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type Review = admission::AdmissionReview<DynamicObject>;
type AdmissionRequest = admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = admission::AdmissionResponse;
type AdmissionReview = admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

// === impl AdmissionService ===

impl<F, G, B> tower::Service<Request<B>> for Admission<F, G>
where
    F: Fetch + Clone + Send + Sync + 'static,
    G: Reconcile + Clone + Send + Sync + 'static,
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), uri = %req.uri());
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            use bytes::Buf;
            let bytes = req
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::Request(e.into()))?
                .to_bytes();
            let review: Review = match serde_json::from_reader(bytes.reader()) {
                Ok(review) => review,
                Err(error) => {
                    warn!(%error, "Failed to parse request body");
                    return json_response(AdmissionResponse::invalid(error).into_review());
                }
            };
            trace!(?review);

            let rsp = match review.try_into() {
                Ok(req) => {
                    debug!(?req);
                    admission.admit(req).await
                }
                Err(error) => {
                    warn!(%error, "Invalid admission request");
                    AdmissionResponse::invalid(error)
                }
            };
            debug!(?rsp);
            json_response(rsp.into_review())
        })
    }
}

impl Admission {
    pub fn new(client: Client, metrics: AdmissionMetrics) -> Self {
        Self::from_parts(
            VirtualMachines::new(client.clone()),
            IpConflictGateway::new(client),
            metrics,
        )
    }
}

impl<F, G> Admission<F, G>
where
    F: Fetch + Send + Sync,
    G: Reconcile + Send + Sync,
{
    pub fn from_parts(fetcher: F, gateway: G, metrics: AdmissionMetrics) -> Self {
        Self {
            fetcher,
            gateway,
            metrics,
        }
    }

    async fn admit(self, req: AdmissionRequest) -> AdmissionResponse {
        if !is_kind::<VirtualMachine>(&req) {
            return AdmissionResponse::invalid(format_args!(
                "unsupported resource type: {}.{}.{}",
                req.kind.group, req.kind.version, req.kind.kind
            ));
        }

        let rsp = AdmissionResponse::from(&req);
        let operation = match req.operation {
            admission::Operation::Create => Operation::Create,
            admission::Operation::Update => Operation::Update,
            admission::Operation::Delete => Operation::Delete,
            admission::Operation::Connect => return rsp,
        };

        let vm = VmRequest {
            namespace: req.namespace.unwrap_or_default(),
            name: req.name,
            object: req.object,
            old_object: req.old_object,
        };
        let decision = match operation {
            Operation::Create => decide_create(&DynamicDecoder, &vm),
            Operation::Update => decide_update(&DynamicDecoder, &vm),
            Operation::Delete => decide_delete(&self.fetcher, &vm).await,
        };
        debug!(%operation, ns = %vm.namespace, name = %vm.name, ?decision);
        self.metrics.decision(operation, &decision);

        let verdict = decision.resolve(&self.gateway).await;
        self.metrics.response(operation, &verdict);
        match verdict {
            Verdict::Allow(reason) => allowed(rsp, reason),
            Verdict::Reject(rejection) => {
                info!(error = %rejection.message, ns = %vm.namespace, name = %vm.name, %operation, "Denied");
                denied(rsp, rejection)
            }
        }
    }
}

fn is_kind<T>(req: &AdmissionRequest) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    req.kind.group.eq_ignore_ascii_case(&T::group(&dt))
        && req.kind.kind.eq_ignore_ascii_case(&T::kind(&dt))
}

fn allowed(mut rsp: AdmissionResponse, reason: String) -> AdmissionResponse {
    rsp.result.code = http::StatusCode::OK.as_u16();
    rsp.result.message = reason;
    rsp
}

fn denied(rsp: AdmissionResponse, rejection: Rejection) -> AdmissionResponse {
    let mut rsp = rsp.deny(rejection.message);
    rsp.result.code = rejection.status.as_u16();
    rsp
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}
