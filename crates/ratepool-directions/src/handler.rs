//! HTTP handler that resolves a [`Trip`] to a distance in meters.

use crate::{DirectionsResponse, Result, Trip};
use core::{fmt, time::Duration};
use ratepool::Handler;

/// Directions API endpoint used when no override is configured.
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Default per-request timeout, covering connect, send and body read.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Calls the Directions API for one trip per job.
///
/// Each call is a single GET with the query parameters `key`, `origin`,
/// `destination` and `mode`. The handler never retries; every failure is
/// returned as an [`Error`](crate::Error) and the pool moves on.
#[derive(Clone)]
pub struct DirectionsHandler {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DirectionsHandler {
    /// Builds a handler with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::Error::Transport) if the HTTP
    /// client cannot be constructed (e.g. the TLS backend fails to
    /// initialize).
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self::with_client(client, api_key, base_url))
    }

    /// Uses an existing client, e.g. one shared with the rest of an
    /// application.
    pub fn with_client(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Performs one lookup.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`](crate::Error::Transport) on connection
    ///   failures, timeouts and non-2xx responses.
    /// - [`Error::Decode`](crate::Error::Decode) if the body is not a
    ///   directions response.
    /// - Anything [`DirectionsResponse::distance`] reports.
    pub async fn lookup(&self, trip: &Trip) -> Result<u64> {
        let origin = trip.origin.to_string();
        let destination = trip.destination.to_string();

        let body = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("mode", trip.mode.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let response: DirectionsResponse = serde_json::from_slice(&body)?;
        response.distance()
    }
}

impl fmt::Debug for DirectionsHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectionsHandler")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl Handler<Trip> for DirectionsHandler {
    type Output = u64;
    type Error = crate::Error;

    async fn handle(&self, _worker_id: usize, trip: Trip) -> Result<u64> {
        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {_worker_id} looking up {trip}");

        self.lookup(&trip).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coord, Error, Mode};
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    fn trip() -> Trip {
        Trip::new(
            Coord::new(40.711_174_16, -74.000_165_45),
            Coord::new(40.683_826_04, -73.976_323_28),
            Mode::Bicycling,
        )
    }

    fn handler(server: &MockServer) -> DirectionsHandler {
        DirectionsHandler::new(
            "test-key",
            format!("{}/maps/api/directions/json", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sends_expected_query_and_reads_first_leg() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps/api/directions/json"))
            .and(query_param("key", "test-key"))
            .and(query_param("origin", "40.71117416,-74.00016545"))
            .and(query_param("destination", "40.68382604,-73.97632328"))
            .and(query_param("mode", "bicycling"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "routes": [{ "legs": [{ "distance": { "value": 4321, "text": "4.3 km" } }] }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(handler(&server).lookup(&trip()).await.unwrap(), 4321);
    }

    #[tokio::test]
    async fn empty_routes_is_no_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ZERO_RESULTS",
                "routes": []
            })))
            .mount(&server)
            .await;

        assert!(matches!(
            handler(&server).handle(0, trip()).await,
            Err(Error::NoRoute)
        ));
    }

    #[tokio::test]
    async fn non_2xx_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(matches!(
            handler(&server).lookup(&trip()).await,
            Err(Error::Transport(_))
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        assert!(matches!(
            handler(&server).lookup(&trip()).await,
            Err(Error::Decode(_))
        ));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "routes": [] }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let handler = DirectionsHandler::new(
            "test-key",
            server.uri(),
            Duration::from_millis(100),
        )
        .unwrap();
        match handler.lookup(&trip()).await {
            Err(Error::Transport(err)) => assert!(err.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn debug_output_hides_the_api_key() {
        let handler = DirectionsHandler::with_client(
            reqwest::Client::new(),
            "super-secret",
            DEFAULT_BASE_URL,
        );
        let debug = format!("{handler:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains(DEFAULT_BASE_URL));
        assert_eq!(handler.base_url(), DEFAULT_BASE_URL);
    }
}
