use std::time::Instant;

use prometheus::{HistogramVec, IntCounterVec};
use reqwest::{Request, RequestBuilder, Response};
use tracing::debug;

use crate::metrics::{ClientMetrics, Curried, SummaryVec};

/// A `reqwest::Client` whose requests are observed into [`ClientMetrics`].
///
/// `endpoint` and `action` are fixed per client; `code` and `method` come
/// from each request. Requests failing before a response arrives are not
/// observed.
#[derive(Clone)]
pub struct MonitoredClient {
    client: reqwest::Client,
    requests_total: Curried<IntCounterVec>,
    request_duration: Option<Curried<HistogramVec>>,
    request_duration_percentiles: Option<Curried<SummaryVec>>,
}

impl MonitoredClient {
    pub fn new(
        client: reqwest::Client,
        metrics: &ClientMetrics,
        endpoint: &str,
        action: &str,
    ) -> Self {
        let bound = [endpoint, action];
        Self {
            client,
            requests_total: Curried::new(metrics.requests_total.clone(), bound),
            request_duration: metrics
                .request_duration
                .clone()
                .map(|vec| Curried::new(vec, bound)),
            request_duration_percentiles: metrics
                .request_duration_percentiles
                .clone()
                .map(|vec| Curried::new(vec, bound)),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Build and execute `builder`.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, reqwest::Error> {
        self.execute(builder.build()?).await
    }

    pub async fn execute(&self, request: Request) -> Result<Response, reqwest::Error> {
        let method = request.method().clone();
        debug!("{} request to {}", method, request.url());

        let start = Instant::now();
        let response = self.client.execute(request).await?;
        let elapsed = start.elapsed().as_secs_f64();

        let code = response.status();
        self.requests_total.inc(code.as_str(), method.as_str());
        if let Some(duration) = &self.request_duration {
            duration.observe(code.as_str(), method.as_str(), elapsed);
        }
        if let Some(percentiles) = &self.request_duration_percentiles {
            percentiles.observe(code.as_str(), method.as_str(), elapsed);
        }
        Ok(response)
    }
}
