//! Posts a flushed buffer to the HireFire collector.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{Request, StatusCode};
use tracing::debug;

use hirefire_core::version::{resource_identity, HEADER_RESOURCE, HEADER_TOKEN};
use hirefire_core::Settings;

use crate::buffer::Snapshot;
use crate::error::DispatchError;
use crate::transport::{Transport, TransportError};
use crate::tunables::Tunables;

/// Builds, sends, and classifies one dispatch request.
pub struct Submitter {
    settings: Settings,
    transport: Arc<dyn Transport>,
}

impl Submitter {
    pub fn new(settings: Settings, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    /// Post `buffer` to the collector.
    ///
    /// The token is resolved on every call. On a 200 response the adaptive
    /// headers are applied to `tunables` before returning.
    pub async fn submit(&self, buffer: &Snapshot, tunables: &Tunables) -> Result<(), DispatchError> {
        let token = self.settings.token().ok_or_else(DispatchError::missing_token)?;
        let request = build_request(&self.settings.dispatch_host(), &token, buffer)?;
        let uri = request.uri().clone();

        let response = match tokio::time::timeout(tunables.timeout(), self.transport.send(request)).await {
            Err(_elapsed) => return Err(DispatchError::Timeout),
            Ok(Err(TransportError::TimedOut(_))) => return Err(DispatchError::Timeout),
            Ok(Err(TransportError::Failed(msg))) => return Err(DispatchError::Network(msg)),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        debug!(%uri, %status, "collector responded");

        if status != StatusCode::OK {
            return Err(DispatchError::from_status(status.as_u16()));
        }

        tunables.adjust(response.headers());
        Ok(())
    }
}

/// Build the POST for `https://<host>:443/` carrying `buffer` as JSON.
pub fn build_request(host: &str, token: &str, buffer: &Snapshot) -> Result<Request<Bytes>, DispatchError> {
    let body = serde_json::to_vec(buffer)
        .map_err(|e| DispatchError::Configuration(format!("unable to encode metrics payload: {e}")))?;

    Request::post(format!("https://{host}:443/"))
        .header(CONTENT_TYPE, "application/json")
        .header(HEADER_TOKEN, token)
        .header(HEADER_RESOURCE, resource_identity())
        .header(CONTENT_LENGTH, body.len())
        .body(Bytes::from(body))
        .map_err(|e| DispatchError::Configuration(format!("invalid dispatch request: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hirefire_core::settings::{ENV_DISPATCH_URL, ENV_TOKEN};
    use hirefire_core::MapEnv;

    use crate::error::DispatchErrorKind;
    use crate::transport::{MemoryCollector, Reply};

    const TOKEN: &str = "8ab101e2-51da-49bc-beba-111dec49a287";

    fn setup(env: MapEnv) -> (Submitter, Arc<MemoryCollector>) {
        let collector = Arc::new(MemoryCollector::new());
        let submitter = Submitter::new(Settings::new(Arc::new(env)), collector.clone());
        (submitter, collector)
    }

    fn buffer() -> Snapshot {
        Snapshot::from([(946_684_800, vec![5, 12]), (946_684_801, vec![3])])
    }

    #[test]
    fn request_shape() {
        let req = build_request("logdrain.hirefire.io", TOKEN, &buffer()).unwrap();

        assert_eq!(req.method(), http::Method::POST);
        assert_eq!(req.uri().to_string(), "https://logdrain.hirefire.io:443/");
        assert_eq!(req.headers()["content-type"], "application/json");
        assert_eq!(req.headers()["hirefire-token"], TOKEN);
        assert_eq!(
            req.headers()["hirefire-resource"],
            resource_identity().as_str()
        );
        assert_eq!(
            req.headers()["content-length"],
            req.body().len().to_string().as_str()
        );

        let body: serde_json::Value = serde_json::from_slice(req.body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "946684800": [5, 12], "946684801": [3] })
        );
    }

    #[test]
    fn invalid_host_is_a_configuration_error() {
        let err = build_request("bad host", TOKEN, &buffer()).unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::Configuration);
    }

    #[tokio::test]
    async fn missing_token_makes_no_request() {
        let (submitter, collector) = setup(MapEnv::new());

        let err = submitter.submit(&buffer(), &Tunables::new()).await.unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::Configuration);
        assert_eq!(err, DispatchError::missing_token());
        assert_eq!(collector.request_count(), 0);
    }

    #[tokio::test]
    async fn ok_applies_adaptive_headers() {
        let (submitter, collector) = setup(MapEnv::new().with(ENV_TOKEN, TOKEN));
        collector.push_reply(
            Reply::status(200)
                .with_header("HireFire-Resource-Dispatcher-Interval", "10")
                .with_header("HireFire-Resource-Dispatcher-Timeout", "10")
                .with_header("HireFire-Resource-Buffer-TTL", "120"),
        );
        let tunables = Tunables::new();

        submitter.submit(&buffer(), &tunables).await.unwrap();

        let snap = tunables.snapshot();
        assert_eq!(snap.interval_secs, 10);
        assert_eq!(snap.timeout_secs, 10);
        assert_eq!(snap.ttl_secs, 120);
    }

    #[tokio::test]
    async fn error_status_leaves_tunables() {
        let (submitter, collector) = setup(MapEnv::new().with(ENV_TOKEN, TOKEN));
        collector.push_reply(
            Reply::status(503).with_header("HireFire-Resource-Dispatcher-Interval", "10"),
        );
        let tunables = Tunables::new();

        let err = submitter.submit(&buffer(), &tunables).await.unwrap_err();
        assert_eq!(err, DispatchError::Server { status: 503 });
        assert_eq!(tunables.snapshot().interval_secs, 1);
    }

    #[tokio::test]
    async fn unexpected_status() {
        let (submitter, collector) = setup(MapEnv::new().with(ENV_TOKEN, TOKEN));
        collector.push_reply(Reply::status(404));

        let err = submitter.submit(&buffer(), &Tunables::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Unexpected response code 404.");
    }

    #[tokio::test]
    async fn transport_failures() {
        let (submitter, collector) = setup(MapEnv::new().with(ENV_TOKEN, TOKEN));
        collector.push_reply(Reply::error(TransportError::Failed("Some generic error".into())));
        collector.push_reply(Reply::error(TransportError::TimedOut("ETIMEDOUT".into())));

        let err = submitter.submit(&buffer(), &Tunables::new()).await.unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::Network);
        assert!(err.to_string().contains("Some generic error"));

        let err = submitter.submit(&buffer(), &Tunables::new()).await.unwrap_err();
        assert_eq!(err, DispatchError::Timeout);
        assert_eq!(err.to_string(), "Request timed out.");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_collector_times_out() {
        let (submitter, collector) = setup(MapEnv::new().with(ENV_TOKEN, TOKEN));
        collector.push_reply(Reply::status(200).delayed(Duration::from_secs(6)));

        let err = submitter.submit(&buffer(), &Tunables::new()).await.unwrap_err();
        assert_eq!(err, DispatchError::Timeout);
    }

    #[tokio::test]
    async fn dispatch_url_override() {
        let env = MapEnv::new()
            .with(ENV_TOKEN, TOKEN)
            .with(ENV_DISPATCH_URL, "https://custom.dispatch.url");
        let (submitter, collector) = setup(env);

        submitter.submit(&buffer(), &Tunables::new()).await.unwrap();

        let requests = collector.take_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].uri().host(), Some("custom.dispatch.url"));
        assert_eq!(requests[0].uri().port_u16(), Some(443));
        assert_eq!(requests[0].uri().scheme_str(), Some("https"));
    }

    #[tokio::test]
    async fn unreachable_collector_is_a_network_error() {
        let env = MapEnv::new()
            .with(ENV_TOKEN, TOKEN)
            .with(ENV_DISPATCH_URL, "https://127.0.0.1");
        let submitter = Submitter::new(
            Settings::new(Arc::new(env)),
            Arc::new(crate::transport::HttpsTransport::new()),
        );

        let err = submitter.submit(&buffer(), &Tunables::new()).await.unwrap_err();
        assert_eq!(err.kind(), DispatchErrorKind::Network);
        assert!(err.to_string().starts_with("Network error occurred ("));
    }

    #[tokio::test]
    async fn rotated_token_is_used() {
        let env = MapEnv::new().with(ENV_TOKEN, "old");
        let (submitter, collector) = setup(env.clone());

        submitter.submit(&buffer(), &Tunables::new()).await.unwrap();
        env.set(ENV_TOKEN, "new");
        submitter.submit(&buffer(), &Tunables::new()).await.unwrap();

        let tokens: Vec<_> = collector
            .take_requests()
            .iter()
            .map(|r| r.headers()["hirefire-token"].to_str().unwrap().to_string())
            .collect();
        assert_eq!(tokens, vec!["old", "new"]);
    }
}
