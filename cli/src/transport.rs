use anyhow::{Context, Result};
use chirp_core::{HttpMethod, HttpRequest, HttpResponse};
use tracing::debug;

/// Runs the requests the core builds. Non-2xx statuses come back as data;
/// only connection-level failures are errors here.
pub struct Transport {
    agent: ureq::Agent,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    pub fn execute(&self, req: HttpRequest) -> Result<HttpResponse> {
        let method = req.method.as_str();
        let url = req.url.clone();
        let headers = &req.headers;

        let sent = match (req.method, req.body.as_deref()) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(&url), headers).call(),
            (HttpMethod::Delete, _) => with_headers(self.agent.delete(&url), headers).call(),
            (HttpMethod::Post, Some(body)) => {
                with_headers(self.agent.post(&url), headers).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => with_headers(self.agent.post(&url), headers).send_empty(),
            (HttpMethod::Put, Some(body)) => {
                with_headers(self.agent.put(&url), headers).send(body.as_bytes())
            }
            (HttpMethod::Put, None) => with_headers(self.agent.put(&url), headers).send_empty(),
        };
        let mut response = sent.with_context(|| format!("{method} {url}"))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("reading response body of {method} {url}"))?;
        debug!(method, %url, status, "response");
        Ok(HttpResponse::new(status, body))
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
