//! Optional third-party integrations checked over HTTP.

use std::time::Instant;

use async_trait::async_trait;

use crate::health::probe::Probe;
use crate::health::status::ServiceStatus;

pub struct HttpIntegrationProbe {
    name: String,
    url: Option<String>,
    client: reqwest::Client,
}

impl HttpIntegrationProbe {
    pub fn new(name: impl Into<String>, url: Option<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url,
            client,
        }
    }
}

#[async_trait]
impl Probe for HttpIntegrationProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ServiceStatus {
        let Some(url) = &self.url else {
            return ServiceStatus::not_configured();
        };

        let started = Instant::now();
        let status = match self.client.get(url).send().await {
            Ok(response) => {
                let code = response.status();
                let status = if code.is_success() {
                    ServiceStatus::healthy()
                } else if code.is_server_error() {
                    ServiceStatus::unhealthy(format!("status {code}"))
                } else {
                    ServiceStatus::degraded(format!("status {code}"))
                };
                status.with_detail("statusCode", code.as_u16())
            }
            Err(e) => ServiceStatus::unhealthy(e.to_string()),
        };
        status.with_response_time(started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::status::HealthState;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response per connection.
    async fn canned_backend(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!("HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}/status")
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn maps_status_codes() {
        let cases = [
            ("200 OK", HealthState::Healthy),
            ("429 Too Many Requests", HealthState::Degraded),
            ("503 Service Unavailable", HealthState::Unhealthy),
        ];
        for (line, expected) in cases {
            let url = canned_backend(line).await;
            let probe = HttpIntegrationProbe::new("mailer", Some(url), client());
            assert_eq!(probe.check().await.status, expected, "{line}");
        }
    }

    #[tokio::test]
    async fn missing_url_is_not_configured() {
        let probe = HttpIntegrationProbe::new("maps", None, client());
        assert_eq!(probe.check().await, ServiceStatus::not_configured());
    }
}
