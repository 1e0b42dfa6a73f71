// SPDX-License-Identifier: MIT
//! Cookie/session store for the marketplace HTTP client.
//!
//! The marketplace authenticates with browser session cookies. The jar is
//! seeded once at startup from the persisted provider session and then
//! updated opportunistically from every response's `Set-Cookie` values.
//! Last-write-wins per key — cookie refreshes are idempotent, so no expiry
//! tracking is needed for the lifetime of the process.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Thread-safe cookie jar.
///
/// Cheaply cloneable — all clones share the same map via `Arc`. A `BTreeMap`
/// keeps the rendered header string stable across calls.
#[derive(Clone, Default)]
pub struct CookieJar {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace/insert every entry of `cookies` into the jar.
    pub async fn set_all(&self, cookies: impl IntoIterator<Item = (String, String)>) {
        let mut inner = self.inner.write().await;
        for (key, value) in cookies {
            inner.insert(key, value);
        }
    }

    /// Merge cookies from `Set-Cookie` response header values.
    ///
    /// Only the cookie-pair (the first `key=value` segment) of each header is
    /// stored; attributes such as `Path`, `Expires` and `HttpOnly` are dropped.
    pub async fn merge_from_response<'a>(
        &self,
        set_cookie_values: impl IntoIterator<Item = &'a str>,
    ) {
        let mut inner = self.inner.write().await;
        for header in set_cookie_values {
            let pair = header.split(';').next().unwrap_or("");
            if let Some((key, value)) = pair.split_once('=') {
                let (key, value) = (key.trim(), value.trim());
                if !key.is_empty() && !value.is_empty() {
                    debug!(cookie = key, "cookie refreshed");
                    inner.insert(key.to_string(), value.to_string());
                }
            }
        }
    }

    /// Render the jar as a `Cookie` request header value: `k1=v1; k2=v2`.
    pub async fn header_string(&self) -> String {
        let inner = self.inner.read().await;
        inner
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Number of cookies currently held. Used for startup diagnostics.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
