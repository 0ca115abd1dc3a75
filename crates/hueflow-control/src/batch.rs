//! Throttled batch execution
//!
//! A batch is submitted as a whole and the call blocks until every request in
//! it has completed. Each completion is reported through a [`ResponseHandler`];
//! request failures never surface as an `Err` from [`BatchExecutor::execute`].

use crate::error::{ControlError, Result};
use crate::request::DeviceRequest;
use futures::stream::{self, StreamExt};
use hueflow_core::config::NetworkConfig;
use hueflow_core::Results;
use reqwest::redirect::Policy;
use tokio::runtime::Handle;
use tracing::{debug, trace};

/// Completion callbacks for one batch
pub trait ResponseHandler {
    fn on_success(&mut self, request: &DeviceRequest, status: u16);
    fn on_failure(&mut self, request: &DeviceRequest, error: &ControlError);
}

impl ResponseHandler for Results {
    fn on_success(&mut self, request: &DeviceRequest, status: u16) {
        trace!(cluster = %request.cluster, "{} -> {}", request.target, status);
        self.record_success();
    }

    fn on_failure(&mut self, request: &DeviceRequest, error: &ControlError) {
        debug!(cluster = %request.cluster, "* {}: {}", request.target, error);
        self.record_failure();
    }
}

/// Runs batches with at most `max_concurrent` requests in flight
pub trait BatchExecutor: Send + Sync {
    /// Execute the whole batch, blocking until all requests have completed.
    ///
    /// An `Err` means the executor itself failed, not a request.
    fn execute(
        &self,
        requests: &[DeviceRequest],
        max_concurrent: usize,
        handler: &mut dyn ResponseHandler,
    ) -> Result<()>;
}

/// reqwest-backed executor driven on a shared tokio runtime
#[derive(Debug, Clone)]
pub struct HttpBatchExecutor {
    client: reqwest::Client,
    runtime: Handle,
}

impl HttpBatchExecutor {
    /// Build the HTTP client: fixed timeouts, redirects disabled.
    pub fn new(network: &NetworkConfig, runtime: Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(network.timeout())
            .connect_timeout(network.connect_timeout())
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client, runtime })
    }
}

async fn send(client: &reqwest::Client, request: &DeviceRequest) -> Result<u16> {
    let response = client
        .request(request.method.clone(), &request.url)
        .json(&request.body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ControlError::HttpStatus(status.as_u16()));
    }
    // Drain the body so the connection can be reused.
    response.bytes().await?;
    Ok(status.as_u16())
}

impl BatchExecutor for HttpBatchExecutor {
    fn execute(
        &self,
        requests: &[DeviceRequest],
        max_concurrent: usize,
        handler: &mut dyn ResponseHandler,
    ) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }
        if Handle::try_current().is_ok() {
            return Err(ControlError::Runtime(
                "batch executor called from inside the async runtime".to_string(),
            ));
        }

        let client = &self.client;
        self.runtime.block_on(async {
            let mut completions = stream::iter(requests)
                .map(|request| async move { (request, send(client, request).await) })
                .buffer_unordered(max_concurrent.max(1));

            while let Some((request, outcome)) = completions.next().await {
                match outcome {
                    Ok(status) => handler.on_success(request, status),
                    Err(e) => handler.on_failure(request, &e),
                }
            }
        });
        Ok(())
    }
}

/// Dry-run executor: every request succeeds without touching the network
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExecutor;

impl BatchExecutor for NullExecutor {
    fn execute(
        &self,
        requests: &[DeviceRequest],
        _max_concurrent: usize,
        handler: &mut dyn ResponseHandler,
    ) -> Result<()> {
        for request in requests {
            handler.on_success(request, 200);
        }
        Ok(())
    }
}
