//! Framework-agnostic request processing.

use serde::Serialize;
use tracing::debug;

use hirefire_core::version::resource_identity;

use crate::error::MiddlewareError;
use crate::hirefire::HireFire;
use crate::request::RequestInfo;

pub const CACHE_CONTROL_VALUE: &str = "must-revalidate, private, max-age=0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerMetric {
    pub name: String,
    pub value: u64,
}

/// Body and headers of the HireFire info endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoResponse {
    pub metrics: Vec<WorkerMetric>,
}

impl InfoResponse {
    /// Headers that accompany the JSON body.
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            ("Content-Type", "application/json".to_string()),
            ("Cache-Control", CACHE_CONTROL_VALUE.to_string()),
            ("HireFire-Resource", resource_identity()),
        ]
    }

    pub fn body(&self) -> Result<Vec<u8>, MiddlewareError> {
        Ok(serde_json::to_vec(&self.metrics)?)
    }
}

/// Record the request's queue time and answer the info endpoint.
///
/// Returns `Ok(None)` when the request belongs to the host application.
pub async fn process(
    hirefire: &HireFire,
    info: &RequestInfo,
) -> Result<Option<InfoResponse>, MiddlewareError> {
    let token = hirefire.settings().token();

    record_queue_time(hirefire, info, token.as_deref()).await;

    if !is_info_request(info, token.as_deref()) {
        return Ok(None);
    }

    let mut metrics = Vec::with_capacity(hirefire.workers().len());
    for worker in hirefire.workers() {
        let value = worker
            .value()
            .await
            .map_err(|source| MiddlewareError::Worker {
                name: worker.name().to_string(),
                source,
            })?;
        metrics.push(WorkerMetric {
            name: worker.name().to_string(),
            value,
        });
    }

    debug!(workers = metrics.len(), "serving hirefire info");
    Ok(Some(InfoResponse { metrics }))
}

async fn record_queue_time(hirefire: &HireFire, info: &RequestInfo, token: Option<&str>) {
    let (Some(_), Some(web), Some(start)) = (token, hirefire.web(), info.request_start_ms) else {
        return;
    };

    web.start_dispatcher().await;
    web.add_to_buffer(web.now_millis().saturating_sub(start));
}

fn is_info_request(info: &RequestInfo, token: Option<&str>) -> bool {
    let Some(token) = token else {
        return false;
    };

    if info.path == "/hirefire" {
        return info.token.as_deref() == Some(token);
    }
    info.path == format!("/hirefire/{token}/info")
}
