// src/enrich/geocode.rs

use crate::error::{AttemptFailure, PipelineError, Result};
use crate::model::Candidate;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

/// Something that can turn an address into coordinate candidates, one request per call.
pub trait Geocoder {
    fn lookup(
        &self,
        address: &str,
    ) -> impl Future<Output = std::result::Result<Vec<Candidate>, AttemptFailure>> + Send;
}

/// Bounded retry with linear backoff: attempt `i` waits `10 * i` units first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.unit * (10 * attempt)
    }
}

/// Outcome of a single request.
#[derive(Debug)]
enum Attempt {
    Resolved(Candidate),
    Failed(AttemptFailure),
}

async fn attempt_once<G: Geocoder>(geocoder: &G, address: &str) -> Attempt {
    match geocoder.lookup(address).await {
        Ok(candidates) => match candidates.first() {
            Some(c) => Attempt::Resolved(*c),
            None => Attempt::Failed(AttemptFailure::NoCandidates),
        },
        Err(reason) => Attempt::Failed(reason),
    }
}

/// Resolve `address` to its first candidate, retrying per `policy`.
pub async fn resolve<G: Geocoder>(
    geocoder: &G,
    address: &str,
    policy: &RetryPolicy,
) -> Result<Candidate> {
    let mut last = None;
    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            sleep(delay).await;
        }
        match attempt_once(geocoder, address).await {
            Attempt::Resolved(c) => {
                debug!(address, attempt, lat = c.latitude, lon = c.longitude, "geocoded");
                return Ok(c);
            }
            Attempt::Failed(reason) => {
                warn!(address, attempt, reason = %reason, "geocode failed, retrying");
                last = Some(reason);
            }
        }
    }
    Err(PipelineError::GeocodeUnresolved {
        address: address.to_string(),
        attempts: policy.max_attempts,
        last: last.unwrap_or(AttemptFailure::NoCandidates),
    })
}

#[derive(Debug, Default, Deserialize)]
struct GeocodeResponse {
    #[serde(rename = "candidate", default)]
    candidates: Vec<Candidate>,
}

/// Decode the `simple_geocode.cgi` XML body.
pub fn parse_response(body: &str) -> std::result::Result<Vec<Candidate>, AttemptFailure> {
    quick_xml::de::from_str::<GeocodeResponse>(body)
        .map(|r| r.candidates)
        .map_err(|e| AttemptFailure::Decode(e.to_string()))
}

/// Geocoder backed by the CSIS simple geocoding service.
#[derive(Debug, Clone)]
pub struct HttpGeocoder {
    client: Client,
    endpoint: Url,
}

impl HttpGeocoder {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    fn query_url(&self, address: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("addr", address);
        url
    }
}

impl Geocoder for HttpGeocoder {
    async fn lookup(&self, address: &str) -> std::result::Result<Vec<Candidate>, AttemptFailure> {
        let url = self.query_url(address);
        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?
            .text()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKYO_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<results>
<query>東京都千代田区霞が関1-2-2</query>
<geodetic>wgs1984</geodetic>
<iConf>5</iConf>
<converted>東京都千代田区霞が関1-2-2</converted>
<candidate>
<address>東京都/千代田区/霞が関/一丁目/2番</address>
<longitude>139.752159</longitude>
<latitude>35.673508</latitude>
<iLvl>7</iLvl>
</candidate>
<candidate>
<address>東京都/千代田区/霞が関/一丁目</address>
<longitude>139.751</longitude>
<latitude>35.672</latitude>
<iLvl>5</iLvl>
</candidate>
</results>
"#;

    /// Plays back scripted per-attempt outcomes, counting calls.
    struct Scripted {
        script: Mutex<VecDeque<std::result::Result<Vec<Candidate>, AttemptFailure>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(script: Vec<std::result::Result<Vec<Candidate>, AttemptFailure>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl Geocoder for Scripted {
        async fn lookup(
            &self,
            _address: &str,
        ) -> std::result::Result<Vec<Candidate>, AttemptFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Vec::new()))
        }
    }

    fn instant() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 10,
            unit: Duration::ZERO,
        }
    }

    #[test]
    fn backoff_is_linear_and_starts_immediately() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_before(0), Duration::ZERO);
        assert_eq!(p.delay_before(1), Duration::from_secs(10));
        assert_eq!(p.delay_before(9), Duration::from_secs(90));
    }

    #[tokio::test]
    async fn succeeds_on_fourth_attempt() {
        let hit = Candidate {
            latitude: 35.0,
            longitude: 139.0,
        };
        let geo = Scripted::new(vec![
            Err(AttemptFailure::Transport("connection reset".into())),
            Err(AttemptFailure::Decode("unexpected eof".into())),
            Ok(Vec::new()),
            Ok(vec![hit]),
        ]);

        let c = resolve(&geo, "どこか", &instant()).await.unwrap();
        assert_eq!((c.latitude, c.longitude), (35.0, 139.0));
        assert_eq!(geo.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn gives_up_after_ten_empty_responses() {
        let geo = Scripted::new(Vec::new());

        let err = resolve(&geo, "どこにもない", &instant()).await.unwrap_err();
        assert_eq!(geo.calls.load(Ordering::SeqCst), 10);
        match err {
            PipelineError::GeocodeUnresolved {
                attempts, last, ..
            } => {
                assert_eq!(attempts, 10);
                assert_eq!(last, AttemptFailure::NoCandidates);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn exhausted_error_keeps_last_reason() {
        let mut script: Vec<_> = (0..9).map(|_| Ok(Vec::new())).collect();
        script.push(Err(AttemptFailure::Transport("timed out".into())));
        let geo = Scripted::new(script);

        let err = resolve(&geo, "x", &instant()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::GeocodeUnresolved {
                last: AttemptFailure::Transport(_),
                ..
            }
        ));
    }

    #[test]
    fn parses_first_candidate_fields() {
        let cands = parse_response(TOKYO_XML).unwrap();
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].longitude, 139.752159);
        assert_eq!(cands[0].latitude, 35.673508);
    }

    #[test]
    fn response_without_candidates_is_empty() {
        let body = "<results><query>x</query><iConf>0</iConf></results>";
        assert!(parse_response(body).unwrap().is_empty());
    }

    #[test]
    fn non_numeric_coordinate_is_a_decode_failure() {
        let body = "<results><candidate><longitude>139.7</longitude><latitude>n/a</latitude></candidate></results>";
        let err = parse_response(body).unwrap_err();
        assert!(matches!(err, AttemptFailure::Decode(_)));
    }

    #[tokio::test]
    async fn http_geocoder_sends_addr_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cgi-bin/simple_geocode.cgi"))
            .and(query_param("addr", "東京都千代田区霞が関1-2-2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TOKYO_XML))
            .mount(&server)
            .await;

        let endpoint = Url::parse(&format!("{}/cgi-bin/simple_geocode.cgi", server.uri())).unwrap();
        let geo = HttpGeocoder::new(Client::new(), endpoint);
        let c = resolve(&geo, "東京都千代田区霞が関1-2-2", &instant())
            .await
            .unwrap();
        assert_eq!(c.latitude, 35.673508);
        assert_eq!(c.longitude, 139.752159);
    }

    #[tokio::test]
    async fn server_errors_count_as_transport_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let geo = HttpGeocoder::new(Client::new(), Url::parse(&server.uri()).unwrap());
        let err = geo.lookup("x").await.unwrap_err();
        assert!(matches!(err, AttemptFailure::Transport(_)));
    }
}
