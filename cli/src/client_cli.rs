use anyhow::{bail, Context, Result};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::io::Write;

#[derive(Debug, Deserialize)]
pub struct DownloadedFile {
    pub name: String,
    pub mtime: String,
    pub size: u64,
}

pub struct ClientCli {
    inner: reqwest::Client,
    base: String,
}

impl ClientCli {
    pub fn new(server: &str) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base: server.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Start a download and copy the streamed output to stdout chunk by chunk.
    pub async fn download(&self, url: &str, args: &str) -> Result<()> {
        let response = self
            .inner
            .post(self.url("/ytdlp"))
            .json(&json!({ "url": url, "args": args }))
            .send()
            .await
            .context("send download request")?;
        let response = error_for_status(response).await?;

        let mut stdout = std::io::stdout();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("read download output")?;
            stdout.write_all(&chunk)?;
            stdout.flush()?;
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<DownloadedFile>> {
        let response = self
            .inner
            .get(self.url("/downloaded"))
            .send()
            .await
            .context("send list request")?;
        let files = error_for_status(response)
            .await?
            .json()
            .await
            .context("decode file list")?;
        Ok(files)
    }

    pub async fn delete(&self, name: &str) -> Result<String> {
        let response = self
            .inner
            .delete(self.url(&format!("/downloaded/{}", encode_path(name))))
            .send()
            .await
            .context("send delete request")?;
        let body: serde_json::Value = error_for_status(response)
            .await?
            .json()
            .await
            .context("decode delete response")?;
        Ok(body["message"].as_str().unwrap_or("deleted").to_string())
    }
}

/// Turn a non-2xx response into an error carrying the server's `detail`.
async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| body["detail"].as_str().map(str::to_string))
        .unwrap_or(text);
    bail!("server returned {}: {}", status, detail)
}

/// Percent-encode each `/`-separated segment of a file name.
fn encode_path(name: &str) -> String {
    name.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}
