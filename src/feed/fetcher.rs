//! Feed fetcher with security measures.
//!
//! This module provides the [`FeedFetcher`] seam used by the poller and an
//! HTTP implementation that fetches and parses RSS/Atom feeds with SSRF
//! protection and resource limits.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;

use super::types::{FeedItem, MediaEnclosure};
use crate::config::FeedsConfig;
use crate::error::{RelayError, Result};

/// Source of feed items.
///
/// Implementations must be safe to call concurrently for different URLs.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch and parse the feed at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>>;
}

/// HTTP feed fetcher.
pub struct HttpFeedFetcher {
    client: Client,
    max_feed_size: u64,
}

impl HttpFeedFetcher {
    /// Create a fetcher from the feeds configuration.
    pub fn new(config: &FeedsConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(redirect_policy(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| RelayError::Feed(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
        })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        validate_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::Feed(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RelayError::Feed(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(RelayError::Feed(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    content_length, self.max_feed_size
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::Feed(format!("failed to read response: {}", e)))?;

        // Content-Length may be absent or wrong
        if bytes.len() as u64 > self.max_feed_size {
            return Err(RelayError::Feed(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_feed_size
            )));
        }

        parse_feed(&bytes)
    }
}

/// Redirect policy that re-checks every hop against [`validate_url`].
fn redirect_policy(max_redirects: usize) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        match check_redirect(attempt.url().as_str(), attempt.previous().len(), max_redirects) {
            Ok(()) => attempt.follow(),
            Err(e) => attempt.error(e),
        }
    })
}

/// Check a redirect target. `hops` is the number of URLs already visited.
fn check_redirect(url: &str, hops: usize, max_redirects: usize) -> Result<()> {
    if hops > max_redirects {
        return Err(RelayError::Feed(format!(
            "too many redirects (max {})",
            max_redirects
        )));
    }
    validate_url(url)
}

/// Validate a URL for SSRF protection.
///
/// This function checks that:
/// - The URL uses http or https scheme
/// - The host is not a private/loopback address
/// - The host is not a reserved hostname
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| RelayError::Feed(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(RelayError::Feed(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| RelayError::Feed("URL has no host".to_string()))?;

    match host {
        url::Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(RelayError::Feed(format!("forbidden host: {}", domain)));
            }
        }
        url::Host::Ipv4(ipv4) => {
            let ip = IpAddr::V4(ipv4);
            if is_private_ip(&ip) {
                return Err(RelayError::Feed(format!(
                    "private IP address not allowed: {}",
                    ip
                )));
            }
        }
        url::Host::Ipv6(ipv6) => {
            let ip = IpAddr::V6(ipv6);
            if is_private_ip(&ip) {
                return Err(RelayError::Feed(format!(
                    "private IP address not allowed: {}",
                    ip
                )));
            }
        }
    }

    Ok(())
}

/// Check if a hostname is forbidden.
fn is_forbidden_hostname(host: &str) -> bool {
    let host = host.to_lowercase();
    if host == "localhost" {
        return true;
    }

    const FORBIDDEN_SUFFIXES: [&str; 7] = [
        ".local",
        ".localhost",
        ".internal",
        ".intranet",
        ".corp",
        ".home",
        ".lan",
    ];
    FORBIDDEN_SUFFIXES
        .iter()
        .any(|suffix| host.ends_with(suffix))
}

/// Check if an IP address is private/reserved.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                || ipv4.is_documentation()
                // Carrier-grade NAT: 100.64.0.0/10
                || (octets[0] == 100 && (64..=127).contains(&octets[1]))
        }
        IpAddr::V6(ipv6) => {
            let segments = ipv6.segments();
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local: fc00::/7
                || (segments[0] & 0xfe00) == 0xfc00
                // Link-local: fe80::/10
                || (segments[0] & 0xffc0) == 0xfe80
                || ipv6
                    .to_ipv4_mapped()
                    .map(|v4| is_private_ip(&IpAddr::V4(v4)))
                    .unwrap_or(false)
        }
    }
}

/// Parse feed bytes into items.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>> {
    let feed = parser::parse(bytes)
        .map_err(|e| RelayError::Feed(format!("failed to parse feed: {}", e)))?;

    Ok(feed.entries.into_iter().map(entry_to_item).collect())
}

fn entry_to_item(entry: Entry) -> FeedItem {
    let media = select_media(&entry);
    let title = entry.title.map(|t| t.content).unwrap_or_default();
    let link = entry.links.first().map(|l| l.href.clone());
    let description = entry
        .summary
        .map(|t| t.content)
        .or(entry.content.and_then(|c| c.body));

    FeedItem {
        title,
        link,
        description,
        published_at: entry.published,
        updated_at: entry.updated,
        media,
    }
}

/// Pick the enclosure to show with an item, preferring images.
fn select_media(entry: &Entry) -> Option<MediaEnclosure> {
    let mut fallback = None;
    for media in &entry.media {
        for content in &media.content {
            let Some(url) = content.url.as_ref().map(|u| u.to_string()) else {
                continue;
            };
            let enclosure = MediaEnclosure {
                url,
                media_type: content.content_type.as_ref().map(|m| m.to_string()),
            };
            if enclosure.is_image() {
                return Some(enclosure);
            }
            if fallback.is_none() {
                fallback = Some(enclosure);
            }
        }
    }
    fallback
}
