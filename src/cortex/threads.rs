//! Thread service client.
//!
//! Five calls, one HTTP exchange each, no retries:
//!
//! | call                  | method | path                                   |
//! |-----------------------|--------|----------------------------------------|
//! | `create_thread`       | POST   | `/threads`                             |
//! | `list_threads`        | GET    | `/threads?origin_application={app}`    |
//! | `get_thread_messages` | GET    | `/threads/{id}`                        |
//! | `rename_thread`       | POST   | `/threads/{id}`                        |
//! | `delete_thread`       | DELETE | `/threads/{id}`                        |

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{IntoUrl, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::config::Endpoints;
use crate::cortex::{CortexError, Thread, ThreadMessages};

/// Operations against the remote thread store.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Creates a thread tagged with `application` and returns its id.
    async fn create_thread(&self, application: &str) -> Result<String, CortexError>;

    /// Lists the application's threads in server order.
    async fn list_threads(&self, application: &str) -> Result<Vec<Thread>, CortexError>;

    /// Fetches a thread's messages. A missing thread is `NotFound`.
    async fn get_thread_messages(&self, thread_id: &str) -> Result<ThreadMessages, CortexError>;

    async fn rename_thread(&self, thread_id: &str, name: &str) -> Result<(), CortexError>;

    /// Deletes a thread. A missing thread is `NotFound`, which callers treat
    /// as already deleted.
    ///
    /// Renaming has no such case: a 404 there is an ordinary `Http` error.
    async fn delete_thread(&self, thread_id: &str) -> Result<(), CortexError>;
}

#[derive(Serialize, Debug)]
struct CreateThreadRequest<'a> {
    origin_application: &'a str,
}

#[derive(Serialize, Debug)]
struct RenameThreadRequest<'a> {
    thread_name: &'a str,
}

/// Thread store over HTTP.
pub struct CortexThreadsClient {
    endpoint: String,
    auth_header: String,
    client: reqwest::Client,
}

impl CortexThreadsClient {
    pub fn new(endpoints: &Endpoints, timeout: Duration) -> Result<Self, CortexError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CortexError::Network(e.to_string()))?;
        Ok(Self {
            endpoint: endpoints.threads_endpoint.clone(),
            auth_header: endpoints.auth_header.clone(),
            client,
        })
    }

    /// The URL of one thread. The id is pushed as a single escaped path
    /// segment, so `/`, `?` or `#` in an id cannot reach another resource.
    fn thread_url(&self, thread_id: &str) -> Result<Url, CortexError> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| CortexError::Network(format!("invalid threads endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CortexError::Network("threads endpoint cannot take a path".to_string()))?
            .pop_if_empty()
            .push(thread_id);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: impl IntoUrl) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
    }

    /// Sends the request and maps non-2xx statuses. `thread_id` is set for
    /// the calls where 404 means the thread is gone (get and delete); every
    /// other failure keeps its status as `Http`.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        thread_id: Option<&str>,
    ) -> Result<reqwest::Response, CortexError> {
        let response = builder
            .send()
            .await
            .map_err(|e| CortexError::Network(e.to_string()))?;

        let status = response.status();
        debug!("Thread service response status: {}", status);
        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::NOT_FOUND
            && let Some(id) = thread_id
        {
            warn!("Thread {} not found", id);
            return Err(CortexError::NotFound(id.to_string()));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        warn!("Thread service error: {} - {}", status.as_u16(), body);
        Err(CortexError::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CortexError> {
        let text = response
            .text()
            .await
            .map_err(|e| CortexError::Network(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| CortexError::Decode(e.to_string()))
    }
}

/// The create call answers with either a bare id or an object carrying it.
fn created_thread_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::Object(map) => map.get("thread_id").or_else(|| map.get("threadId"))?,
        other => other,
    };
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl ThreadStore for CortexThreadsClient {
    async fn create_thread(&self, application: &str) -> Result<String, CortexError> {
        let body = CreateThreadRequest {
            origin_application: application,
        };
        let response = self
            .send(
                self.request(reqwest::Method::POST, &self.endpoint).json(&body),
                None,
            )
            .await?;
        let value: Value = Self::decode(response).await?;
        let id = created_thread_id(&value)
            .ok_or_else(|| CortexError::Decode(format!("no thread id in {value}")))?;
        info!("Created thread {}", id);
        Ok(id)
    }

    async fn list_threads(&self, application: &str) -> Result<Vec<Thread>, CortexError> {
        let builder = self
            .request(reqwest::Method::GET, &self.endpoint)
            .query(&[("origin_application", application)]);
        let response = self.send(builder, None).await?;
        let threads: Vec<Thread> = Self::decode(response).await?;
        debug!("Listed {} threads", threads.len());
        Ok(threads)
    }

    async fn get_thread_messages(&self, thread_id: &str) -> Result<ThreadMessages, CortexError> {
        let url = self.thread_url(thread_id)?;
        let response = self
            .send(self.request(reqwest::Method::GET, url), Some(thread_id))
            .await?;
        let messages: ThreadMessages = Self::decode(response).await?;
        debug!(
            "Thread {} has {} messages",
            thread_id,
            messages.messages.len()
        );
        Ok(messages)
    }

    async fn rename_thread(&self, thread_id: &str, name: &str) -> Result<(), CortexError> {
        let url = self.thread_url(thread_id)?;
        let body = RenameThreadRequest { thread_name: name };
        self.send(self.request(reqwest::Method::POST, url).json(&body), None)
            .await?;
        info!("Renamed thread {} to {:?}", thread_id, name);
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), CortexError> {
        let url = self.thread_url(thread_id)?;
        self.send(self.request(reqwest::Method::DELETE, url), Some(thread_id))
            .await?;
        info!("Deleted thread {}", thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_created_thread_id_shapes() {
        assert_eq!(created_thread_id(&json!("abc")), Some("abc".to_string()));
        assert_eq!(created_thread_id(&json!(123)), Some("123".to_string()));
        assert_eq!(
            created_thread_id(&json!({"thread_id": "t-9"})),
            Some("t-9".to_string())
        );
        assert_eq!(created_thread_id(&json!({"other": 1})), None);
        assert_eq!(created_thread_id(&json!("")), None);
    }

    fn client(threads_endpoint: &str) -> CortexThreadsClient {
        let endpoints = Endpoints {
            auth_header: "Bearer pat".to_string(),
            agent_endpoint: String::new(),
            threads_endpoint: threads_endpoint.to_string(),
        };
        CortexThreadsClient::new(&endpoints, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_thread_url_appends_id() {
        let client = client("https://acct.example.com/api/v2/cortex/threads");
        assert_eq!(
            client.thread_url("t-1").unwrap().as_str(),
            "https://acct.example.com/api/v2/cortex/threads/t-1"
        );
    }

    #[test]
    fn test_thread_url_escapes_reserved_characters() {
        let client = client("https://acct.example.com/api/v2/cortex/threads");
        let url = client.thread_url("a/b?c#d").unwrap();
        assert_eq!(url.path(), "/api/v2/cortex/threads/a%2Fb%3Fc%23d");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_thread_url_rejects_bad_endpoint() {
        let client = client("not a url");
        assert!(matches!(client.thread_url("t-1"), Err(CortexError::Network(_))));
    }

    #[test]
    fn test_request_bodies_use_wire_names() {
        let create = serde_json::to_value(CreateThreadRequest {
            origin_application: "app",
        })
        .unwrap();
        assert_eq!(create, json!({"origin_application": "app"}));

        let rename = serde_json::to_value(RenameThreadRequest { thread_name: "n" }).unwrap();
        assert_eq!(rename, json!({"thread_name": "n"}));
    }
}
