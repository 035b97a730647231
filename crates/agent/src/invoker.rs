//! Routes model tool calls to the catalog.
//!
//! Every call yields exactly one [`ToolOutcome`] carrying the call's id.
//! Failures never escape as errors: a catalog error, a timeout or a
//! panicking tool all become [`ToolInvocationResult::Err`].
//!
//! A name missing from the mapping is passed to the catalog as-is; the
//! catalog decides whether such a tool exists.

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use toolrelay_core::provider::ModelToolCall;
use toolrelay_core::tool::{ToolCatalog, ToolInvocationResult, ToolOutcome};
use tracing::{debug, warn};

use crate::translator::NameMapping;

pub struct ToolInvoker {
    catalog: Arc<dyn ToolCatalog>,
    timeout: Option<Duration>,
    parallel: bool,
}

impl ToolInvoker {
    pub fn new(catalog: Arc<dyn ToolCatalog>) -> Self {
        Self {
            catalog,
            timeout: None,
            parallel: true,
        }
    }

    /// Per-invocation time limit. `None` waits for the catalog indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the calls of one round concurrently (default) or one at a time.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Invoke the tool the model called `vendor_name`.
    pub async fn invoke(
        &self,
        vendor_name: &str,
        arguments: Value,
        mapping: &NameMapping,
    ) -> ToolInvocationResult {
        let canonical = canonical_name(vendor_name, mapping);
        run(self.catalog.clone(), canonical.to_string(), arguments, self.timeout).await
    }

    /// Invoke every call of one model turn. Outcomes come back in call order.
    ///
    /// Calls run on spawned tasks; a caller that stops waiting leaves them to
    /// finish in the background.
    pub async fn invoke_all(&self, calls: &[ModelToolCall], mapping: &NameMapping) -> Vec<ToolOutcome> {
        if self.parallel {
            let started = Instant::now();
            let handles: Vec<_> = calls
                .iter()
                .map(|call| self.spawn(call, mapping))
                .collect();
            let results = join_all(handles).await;

            let outcomes: Vec<ToolOutcome> = calls
                .iter()
                .zip(results)
                .map(|(call, joined)| self.outcome(call, mapping, joined))
                .collect();
            debug!(
                calls = calls.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Tool round finished"
            );
            outcomes
        } else {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in calls {
                let joined = self.spawn(call, mapping).await;
                outcomes.push(self.outcome(call, mapping, joined));
            }
            outcomes
        }
    }

    fn spawn(
        &self,
        call: &ModelToolCall,
        mapping: &NameMapping,
    ) -> tokio::task::JoinHandle<(ToolInvocationResult, u64)> {
        let catalog = self.catalog.clone();
        let canonical = canonical_name(&call.vendor_name, mapping).to_string();
        let arguments = call.arguments.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let started = Instant::now();
            let result = run(catalog, canonical, arguments, timeout).await;
            (result, started.elapsed().as_millis() as u64)
        })
    }

    fn outcome(
        &self,
        call: &ModelToolCall,
        mapping: &NameMapping,
        joined: Result<(ToolInvocationResult, u64), tokio::task::JoinError>,
    ) -> ToolOutcome {
        let canonical = canonical_name(&call.vendor_name, mapping).to_string();

        let (result, duration_ms) = joined.unwrap_or_else(|e| {
            warn!(tool = %call.vendor_name, call_id = %call.id, error = %e, "Tool task failed");
            (ToolInvocationResult::Err(format!("tool '{}' failed: {e}", call.vendor_name)), 0)
        });

        if let ToolInvocationResult::Err(message) = &result {
            debug!(tool = %call.vendor_name, call_id = %call.id, error = %message, "Tool returned an error");
        }

        ToolOutcome {
            call_id: call.id.clone(),
            vendor_name: call.vendor_name.clone(),
            canonical_name: canonical,
            result,
            duration_ms,
        }
    }
}

/// The catalog name for `vendor_name`, or the vendor name itself if unmapped.
fn canonical_name<'a>(vendor_name: &'a str, mapping: &'a NameMapping) -> &'a str {
    mapping.resolve(vendor_name).unwrap_or(vendor_name)
}

async fn run(
    catalog: Arc<dyn ToolCatalog>,
    canonical_name: String,
    arguments: Value,
    timeout: Option<Duration>,
) -> ToolInvocationResult {
    debug!(tool = %canonical_name, "Invoking tool");

    let invocation = catalog.invoke(&canonical_name, arguments);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, invocation).await {
            Ok(result) => result,
            Err(_) => {
                return ToolInvocationResult::Err(format!(
                    "tool '{canonical_name}' timed out after {}s",
                    limit.as_secs()
                ));
            }
        },
        None => invocation.await,
    };

    match result {
        Ok(value) => ToolInvocationResult::Ok(value),
        Err(e) => ToolInvocationResult::Err(e.to_string()),
    }
}
