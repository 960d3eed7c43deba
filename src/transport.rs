use std::io::Read;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::Resource;
use crate::error::GenomeError;

/// An open response body and the length the server declared for it, if any.
pub struct RemoteBody {
    pub total: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

pub trait Transport: Send + Sync {
    fn open(&self, resource: &Resource) -> Result<RemoteBody, GenomeError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, GenomeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("refgenome-fetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GenomeError::Http(err.to_string()))?,
        );

        // No overall timeout: genome archives take far longer than any sane request budget.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(None)
            .build()
            .map_err(|err| GenomeError::Http(err.to_string()))?;

        Ok(Self { client })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, GenomeError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::debug!(status, attempt, "retrying request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::debug!(error = %err, attempt, "retrying request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(GenomeError::Http(err.to_string()));
                }
            }
        }
    }
}

impl Transport for HttpTransport {
    fn open(&self, resource: &Resource) -> Result<RemoteBody, GenomeError> {
        let url = resource.locator();
        if url.starts_with("ftp://") {
            return Err(GenomeError::Http(format!("unsupported scheme: {url}")));
        }

        let response = self.send_with_retries(|| match resource.form() {
            Some(form) => self.client.post(url).form(form),
            None => self.client.get(url),
        })?;

        if !response.status().is_success() {
            return Err(GenomeError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(RemoteBody {
            total: declared_length(response.headers()),
            reader: Box::new(response),
        })
    }
}

/// Content-Length as declared by the server. A zero or unparsable value counts as unknown.
pub fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|len| *len > 0)
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_length_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_length(&headers), None);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1000"));
        assert_eq!(declared_length(&headers), Some(1000));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        assert_eq!(declared_length(&headers), None);
    }

    #[test]
    fn retry_policy() {
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn ftp_is_rejected_before_any_request() {
        let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
        let err = transport
            .open(&Resource::new("ftp://ftp.example.org/genome.fa.gz"))
            .err()
            .unwrap();
        assert!(matches!(err, GenomeError::Http(_)));
    }
}
