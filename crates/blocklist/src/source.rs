use std::{fmt, time::Duration};

use anyhow::Context;

/// Where the entries of a list come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    Http(String),
    File(String),
}

impl ListSource {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Http(raw.to_string())
        } else {
            Self::File(raw.to_string())
        }
    }

    /// Fetch the raw list content.
    pub async fn fetch(&self, client: &reqwest::Client) -> anyhow::Result<String> {
        match self {
            Self::Http(url) => {
                let response = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("failed to download {url}"))?
                    .error_for_status()?;
                Ok(response.text().await?)
            }
            Self::File(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {path}")),
        }
    }
}

impl fmt::Display for ListSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(url) => f.write_str(url),
            Self::File(path) => f.write_str(path),
        }
    }
}

pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build http client")
}

/// Extract the domain entries of a list.
///
/// Lines may be plain domains, `*.domain` wildcards or hosts file lines (`0.0.0.0 domain`),
/// `#` starts a comment.
pub fn parse_entries(content: &str) -> impl Iterator<Item = &str> {
    content.lines().filter_map(|line| {
        let line = match line.find('#') {
            Some(i) => &line[..i],
            None => line,
        };

        line.split_whitespace().last()
    })
}
