//! Concurrent signature collection
//!
//! Fans one blocking task out per signer, joins whatever finishes before the
//! caller's deadline and reports the rest as abandoned. Arrival order does
//! not matter: [`aggregate`](crate::signing::aggregate) sorts by signer.

use crate::eip712::SafeTxContext;
use crate::error::{CoordinatorError, CoordinatorResult, Stage};
use crate::signing::{aggregate, SignatureMethod, SigningPrimitive};
use crate::types::{SignatureArtifact, SignatureBlob};
use crate::verifier::SafeVerifier;
use crate::{log_debug, log_info, log_warn};
use ethers_core::types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinSet};

/// One signer and how it should sign
#[derive(Clone)]
pub struct SignatureRequest {
    pub signer: Arc<dyn SigningPrimitive>,
    pub method: SignatureMethod,
}

impl SignatureRequest {
    pub fn new(signer: Arc<dyn SigningPrimitive>, method: SignatureMethod) -> Self {
        Self { signer, method }
    }
}

impl std::fmt::Debug for SignatureRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureRequest")
            .field("signer", &self.signer.address())
            .field("method", &self.method)
            .finish()
    }
}

/// What came back from a collection round
#[derive(Debug, Default)]
pub struct CollectionOutcome {
    /// In completion order
    pub artifacts: Vec<SignatureArtifact>,
    /// Producer errors, each tagged with its signer
    pub failures: Vec<CoordinatorError>,
    /// Signers still outstanding when the deadline passed
    pub abandoned: Vec<Address>,
}

impl CollectionOutcome {
    pub fn signers(&self) -> Vec<Address> {
        self.artifacts.iter().map(|a| a.signer).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.abandoned.is_empty()
    }

    /// Aggregate whatever was collected. Whether it meets the threshold is
    /// for the verifier to decide.
    pub fn aggregate(&self) -> CoordinatorResult<SignatureBlob> {
        aggregate(self.artifacts.iter().cloned())
    }
}

/// Run every request against `ctx` concurrently.
///
/// With a `deadline`, producers still running when it passes are abandoned.
/// Blocking work cannot be interrupted, so an abandoned producer finishes in
/// the background and its result is dropped. A producer that panics is
/// reported as an internal failure for its signer.
pub async fn collect_signatures(
    ctx: Arc<SafeTxContext>,
    verifier: Arc<dyn SafeVerifier>,
    requests: Vec<SignatureRequest>,
    deadline: Option<Duration>,
) -> CollectionOutcome {
    let mut outcome = CollectionOutcome::default();
    let mut pending: Vec<Address> = Vec::with_capacity(requests.len());
    let mut owners_by_task: HashMap<task::Id, Address> = HashMap::with_capacity(requests.len());
    let mut set = JoinSet::new();

    for request in requests {
        let address = request.signer.address();
        pending.push(address);

        let ctx = Arc::clone(&ctx);
        let verifier = Arc::clone(&verifier);
        let handle = set.spawn_blocking(move || {
            request
                .method
                .produce(request.signer.as_ref(), &ctx, verifier.as_ref())
        });
        owners_by_task.insert(handle.id(), address);
    }

    log_debug!("collect", "signature requests dispatched", count = pending.len(), digest = ctx.digest());

    let timer = async {
        match deadline {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(timer);

    loop {
        tokio::select! {
            joined = set.join_next_with_id() => {
                let (id, result) = match joined {
                    None => break,
                    Some(Ok((id, result))) => (id, result),
                    Some(Err(join_error)) => {
                        let id = join_error.id();
                        log_warn!("collect", "signing task did not complete", error = join_error.to_string());
                        (id, Err(CoordinatorError::internal("signing task panicked")))
                    }
                };
                let Some(address) = owners_by_task.remove(&id) else {
                    continue;
                };
                if let Some(pos) = pending.iter().position(|p| *p == address) {
                    pending.remove(pos);
                }
                match result {
                    Ok(artifact) => outcome.artifacts.push(artifact),
                    Err(e) => {
                        log_warn!("collect", "signer failed", signer = address, error = e.to_string());
                        outcome.failures.push(e.with_signer(address).with_stage(Stage::Collect));
                    }
                }
            },
            _ = &mut timer => {
                outcome.abandoned = std::mem::take(&mut pending);
                log_warn!("collect", "deadline passed", abandoned = outcome.abandoned.len());
                break;
            }
        }
    }

    log_info!(
        "collect",
        "collection finished",
        collected = outcome.artifacts.len(),
        failed = outcome.failures.len(),
        abandoned = outcome.abandoned.len()
    );

    outcome
}
