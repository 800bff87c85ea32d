use arcturus_core::{HealthResponse, ProcessStatus};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Tileserver lifecycle verbs exposed by the control API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    Stop,
    Restart,
    Sighup,
}

impl Lifecycle {
    fn path(self) -> &'static str {
        match self {
            Lifecycle::Start => "start",
            Lifecycle::Stop => "stop",
            Lifecycle::Restart => "restart",
            Lifecycle::Sighup => "sighup",
        }
    }
}

#[derive(Deserialize)]
struct SourcesResponse {
    sources: Vec<Value>,
}

#[derive(Deserialize)]
struct MapsResponse {
    maps: Vec<Value>,
}

fn endpoint(server: &str, path: &str) -> String {
    format!("{}{}", server.trim_end_matches('/'), path)
}

/// Decode a success body, or turn the server's `detail` into an error
async fn decode<T: DeserializeOwned>(response: Response) -> anyhow::Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let detail = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("detail").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| "request failed".to_string());
    anyhow::bail!("{} ({})", detail, status)
}

pub async fn health(client: &Client, server: &str) -> anyhow::Result<HealthResponse> {
    let response = client.get(endpoint(server, "/api/health")).send().await?;
    decode(response).await
}

pub async fn process_status(client: &Client, server: &str) -> anyhow::Result<ProcessStatus> {
    let response = client
        .get(endpoint(server, "/api/processes/tileserver"))
        .send()
        .await?;
    decode(response).await
}

pub async fn lifecycle(
    client: &Client,
    server: &str,
    verb: Lifecycle,
) -> anyhow::Result<ProcessStatus> {
    let url = endpoint(server, &format!("/api/processes/tileserver/{}", verb.path()));
    let response = client.post(&url).send().await?;
    decode(response).await
}

pub async fn sources(client: &Client, server: &str) -> anyhow::Result<Vec<Value>> {
    let response = client
        .get(endpoint(server, "/api/tileserver/sources"))
        .send()
        .await?;
    Ok(decode::<SourcesResponse>(response).await?.sources)
}

pub async fn maps(client: &Client, server: &str) -> anyhow::Result<Vec<Value>> {
    let response = client.get(endpoint(server, "/api/maps")).send().await?;
    Ok(decode::<MapsResponse>(response).await?.maps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle_posts_to_verb_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/processes/tileserver/restart")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"running": true, "pid": 4242}"#)
            .create_async()
            .await;

        let status = lifecycle(&Client::new(), &server.url(), Lifecycle::Restart)
            .await
            .unwrap();

        assert_eq!(status, ProcessStatus::running(4242));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_detail_becomes_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/processes/tileserver/start")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "Tileserver binary not found: /opt/tileserver-rs"}"#)
            .create_async()
            .await;

        let err = lifecycle(&Client::new(), &server.url(), Lifecycle::Start)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Tileserver binary not found: /opt/tileserver-rs (404 Not Found)"
        );
    }

    #[tokio::test]
    async fn test_error_without_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/processes/tileserver")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let err = process_status(&Client::new(), &server.url()).await.unwrap_err();

        assert_eq!(err.to_string(), "request failed (502 Bad Gateway)");
    }

    #[tokio::test]
    async fn test_health_and_listings() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/health")
            .with_status(200)
            .with_body(r#"{"status": "ok", "tileserver": {"running": false, "pid": null}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/maps")
            .with_status(200)
            .with_body(r#"{"maps": [{"id": "bright", "path": "styles/bright.json"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/tileserver/sources")
            .with_status(200)
            .with_body(r#"{"sources": [{"id": "a"}, {"id": "b"}]}"#)
            .create_async()
            .await;

        let client = Client::new();
        let url = format!("{}/", server.url());

        let health = health(&client, &url).await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.tileserver, ProcessStatus::stopped());

        let maps = maps(&client, &url).await.unwrap();
        assert_eq!(maps[0]["id"], "bright");

        let sources = sources(&client, &url).await.unwrap();
        assert_eq!(sources.len(), 2);
    }
}
