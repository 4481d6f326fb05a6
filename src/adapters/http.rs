//! Thin HTTPS client over `EspHttpConnection`.
//!
//! Shared by the sun-time and Pushover adapters.  TLS uses the ESP-IDF
//! certificate bundle, so no per-host certificates are stored.

use std::time::Duration;

use anyhow::{Context, Result};
use embedded_svc::http::client::{Client as HttpClient, Method};
use esp_idf_svc::http::client::{Configuration as HttpConfiguration, EspHttpConnection};
use esp_idf_svc::io::{Read, Write};
use esp_idf_svc::sys::esp_crt_bundle_attach;

/// Largest response body kept; the rest is discarded.
const MAX_BODY: usize = 2048;

pub struct HttpsClient {
    client: HttpClient<EspHttpConnection>,
}

impl HttpsClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let conn = EspHttpConnection::new(&HttpConfiguration {
            buffer_size: Some(1024),
            timeout: Some(timeout),
            crt_bundle_attach: Some(esp_crt_bundle_attach),
            ..Default::default()
        })
        .context("http connection")?;
        Ok(Self {
            client: HttpClient::wrap(conn),
        })
    }

    /// GET `url`, returning the status and up to [`MAX_BODY`] bytes of body.
    pub fn get(&mut self, url: &str) -> Result<(u16, Vec<u8>)> {
        let headers = [("accept", "application/json")];
        let request = self.client.request(Method::Get, url, &headers)?;
        let mut response = request.submit()?;
        let status = response.status();

        let mut body = Vec::with_capacity(512);
        let mut buf = [0u8; 256];
        loop {
            let n = response.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let room = MAX_BODY.saturating_sub(body.len());
            body.extend_from_slice(&buf[..n.min(room)]);
        }
        Ok((status, body))
    }

    /// POST a JSON body, returning the response status.
    pub fn post_json(&mut self, url: &str, body: &[u8]) -> Result<u16> {
        let len = body.len().to_string();
        let headers = [
            ("content-type", "application/json"),
            ("content-length", len.as_str()),
        ];
        let mut request = self.client.request(Method::Post, url, &headers)?;
        request.write_all(body)?;
        request.flush()?;
        let response = request.submit()?;
        Ok(response.status())
    }
}
