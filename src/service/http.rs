use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, warn};

use crate::config::{HttpConfig, HttpMode};
use crate::event::{Event, EventQueue, LslEvent};
use crate::eval::value::Value;

use super::{Service, ServiceStatus};

/// Status reported when the request never produced a response.
pub const STATUS_FAILED: i32 = 499;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub mimetype: String,
    pub body: String,
}

impl HttpRequest {
    pub fn get(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: "GET".to_string(),
            mimetype: "text/plain;charset=utf-8".to_string(),
            body: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: i32,
    pub body: String,
}

/// Runs `llHTTPRequest` in the background and enqueues `http_response`.
///
/// In stub mode answers come from [`HttpConfig::stubs`]; unknown URLs get 404.
pub struct HttpService {
    config: HttpConfig,
    client: reqwest::Client,
    queue: Arc<EventQueue>,
}

impl HttpService {
    pub fn new(queue: Arc<EventQueue>, config: HttpConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("falling back to default http client: {}", e);
                reqwest::Client::new()
            });
        Self {
            config,
            client,
            queue,
        }
    }

    /// Starts the request; the completion carries `request_id`.
    pub fn request(&self, request_id: String, request: HttpRequest) {
        let queue = self.queue.clone();
        let config = self.config.clone();
        let client = self.client.clone();
        debug!("http {} {} ({})", request.method, request.url, request_id);

        tokio::spawn(async move {
            let reply = match config.mode {
                HttpMode::Stub => {
                    tokio::time::sleep(config.stub_latency).await;
                    stub_reply(&config, &request.url)
                }
                HttpMode::Live => live_reply(&client, &request).await,
            };
            let event = Event::new(
                LslEvent::HttpResponse,
                vec![
                    Value::key(&request_id),
                    Value::Integer(reply.status),
                    Value::List(vec![]),
                    Value::String(reply.body),
                ],
            );
            if let Err(e) = queue.push(event) {
                debug!("http response {} dropped: {}", request_id, e);
            }
        });
    }
}

fn stub_reply(config: &HttpConfig, url: &str) -> HttpReply {
    match config.stubs.get(url) {
        Some(stub) => HttpReply {
            status: stub.status,
            body: stub.body.clone(),
        },
        None => HttpReply {
            status: 404,
            body: "Not Found".to_string(),
        },
    }
}

async fn live_reply(client: &reqwest::Client, request: &HttpRequest) -> HttpReply {
    let method =
        Method::from_bytes(request.method.to_uppercase().as_bytes()).unwrap_or(Method::GET);
    let mut builder = client.request(method, &request.url);
    if !request.body.is_empty() {
        builder = builder
            .header(reqwest::header::CONTENT_TYPE, request.mimetype.clone())
            .body(request.body.clone());
    }
    match builder.send().await {
        Ok(response) => {
            let status = response.status().as_u16() as i32;
            match response.text().await {
                Ok(body) => HttpReply { status, body },
                Err(e) => failed(e),
            }
        }
        Err(e) => failed(e),
    }
}

fn failed(e: reqwest::Error) -> HttpReply {
    warn!("http request failed: {}", e);
    HttpReply {
        status: STATUS_FAILED,
        body: e.to_string(),
    }
}

#[async_trait]
impl Service for HttpService {
    fn name(&self) -> &'static str {
        "http"
    }

    fn status(&self) -> ServiceStatus {
        ServiceStatus::Idle
    }

    /// In-flight requests finish on their own; the closed queue drops them.
    async fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpStub;
    use std::time::Duration;

    fn stubbed() -> HttpConfig {
        let mut config = HttpConfig {
            stub_latency: Duration::from_millis(1),
            ..Default::default()
        };
        config.stubs.insert(
            "http://example.test/ok".to_string(),
            HttpStub {
                status: 200,
                body: "OK".to_string(),
            },
        );
        config
    }

    #[test]
    fn test_stub_lookup() {
        let config = stubbed();
        assert_eq!(stub_reply(&config, "http://example.test/ok").status, 200);
        assert_eq!(stub_reply(&config, "http://example.test/missing").status, 404);
    }

    #[tokio::test]
    async fn test_completion_enqueued() {
        let queue = Arc::new(EventQueue::new(8));
        let http = HttpService::new(queue.clone(), stubbed());
        let id = uuid::Uuid::new_v4().to_string();
        http.request(id.clone(), HttpRequest::get("http://example.test/ok"));

        queue.wait(Duration::from_secs(1)).await;
        let event = queue.pop().unwrap();
        assert_eq!(event.kind, LslEvent::HttpResponse);
        assert_eq!(event.args[0], Value::Key(id));
        assert_eq!(event.args[1], Value::Integer(200));
        assert_eq!(event.args[3], Value::from("OK"));
    }
}
