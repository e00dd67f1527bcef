//! HTTP and HTTPS uploads
//!
//! The receiving application is expected to be a MIRC-style submit service.
//! Its replies are classified by looking for a few phrases in the body; a
//! reply that cannot be confirmed as a success counts as a failure.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use http::StatusCode;
use reqwest::{Body, Client};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::{red, send_header, Transmission, Transmitter};
use crate::content_type::ContentTypeResolver;
use crate::error::{Result, TransmitError};

/// Files larger than this are sent with chunked transfer encoding.
pub const MAX_UNCHUNKED: u64 = 20 * 1024 * 1024;

const SUCCESS_PHRASE: &str = "was received and unpacked successfully";
const FAILURE_KEYWORDS: [&str; 3] = ["unsupported", "failed", "error"];

/// Connection settings for [`HttpTransmitter`]
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Applied to connection setup and to each read of the response
    pub timeout: Duration,
    /// Accept any server certificate on HTTPS
    pub accept_invalid_certs: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            accept_invalid_certs: true,
        }
    }
}

/// How a reply body was judged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// The receiver confirmed the upload
    Accepted,
    /// The receiver reported a failure; shown in the error style
    Rejected,
    /// An HTML page that neither confirms nor clearly rejects the upload,
    /// or one that does both
    Ambiguous,
    /// Not an HTML page, so the receiver's protocol is unknown
    Unconfirmed,
}

impl ResponseClass {
    pub fn is_success(self) -> bool {
        self == ResponseClass::Accepted
    }
}

/// Judge a reply body.
///
/// With the MIRC content type forced, only the word "error" marks a failure.
/// Otherwise the body must be an HTML page containing the submit service's
/// success phrase and none of the failure keywords.
pub fn classify_response(body: &str, forced_content_type: bool) -> ResponseClass {
    let lower = body.to_lowercase();

    if forced_content_type {
        return if lower.contains("error") {
            ResponseClass::Rejected
        } else {
            ResponseClass::Accepted
        };
    }

    if !lower.contains("<html>") {
        return ResponseClass::Unconfirmed;
    }

    let succeeded = lower.contains(SUCCESS_PHRASE);
    let failed = FAILURE_KEYWORDS.iter().any(|k| lower.contains(k));
    match (succeeded, failed) {
        (true, false) => ResponseClass::Accepted,
        (false, true) => ResponseClass::Rejected,
        _ => ResponseClass::Ambiguous,
    }
}

struct Reply {
    status: StatusCode,
    body: std::result::Result<String, reqwest::Error>,
}

/// Uploads one file per request to an HTTP or HTTPS URL
pub struct HttpTransmitter {
    client: Client,
    url: String,
    content_types: ContentTypeResolver,
}

impl HttpTransmitter {
    pub fn new(
        url: impl Into<String>,
        content_types: ContentTypeResolver,
        options: &HttpOptions,
    ) -> Result<Self> {
        let url = url.into();
        let client = Client::builder()
            .connect_timeout(options.timeout)
            .read_timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .map_err(|e| TransmitError::ConnectionFailure {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            url,
            content_types,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, file: &Path) -> Result<Reply> {
        let url = url::Url::parse(&self.url).map_err(|e| TransmitError::ConnectionFailure {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        let input = tokio::fs::File::open(file)
            .await
            .map_err(|e| TransmitError::io("Unable to obtain an input stream to read the file", e))?;
        let length = input
            .metadata()
            .await
            .map_err(|e| TransmitError::io("Unable to obtain an input stream to read the file", e))?
            .len();

        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = self.content_types.resolve(&name);
        debug!(
            "POST {} ({} bytes, {}) to {}",
            file.display(),
            length,
            content_type,
            self.url
        );

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", name));
        // without a length the body goes out chunked
        if length <= MAX_UNCHUNKED {
            request = request.header(CONTENT_LENGTH, length);
        }
        let request = request.body(Body::wrap_stream(ReaderStream::new(input)));

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_builder() || e.is_timeout() {
                TransmitError::ConnectionFailure {
                    url: self.url.clone(),
                    reason: e.to_string(),
                }
            } else {
                TransmitError::io("Error sending the file", std::io::Error::other(e))
            }
        })?;

        let status = response.status();
        let body = response.text().await;
        Ok(Reply { status, body })
    }
}

#[async_trait]
impl Transmitter for HttpTransmitter {
    async fn transmit(&self, file: &Path, sequence: u32) -> Transmission {
        let mut message = send_header(sequence, file, &self.url);

        let reply = match self.send(file).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("HTTP send of {} failed: {}", file.display(), e);
                message.push_str(&red(&e));
                return Transmission::failure(e, message);
            }
        };

        let code = format!("<b>ResponseCode = {}</b><br>", reply.status.as_u16());
        if reply.status == StatusCode::OK {
            message.push_str(&code);
        } else {
            message.push_str(&format!("<font color=\"red\">{}</font>", code));
        }

        let body = match reply.body {
            Ok(body) => body,
            Err(e) => {
                warn!("reading response for {} failed: {}", file.display(), e);
                let error = TransmitError::io("Error reading the response", std::io::Error::other(e));
                message.push_str(&red(&error));
                message.push_str("<br>");
                return Transmission::failure(error, message);
            }
        };

        let forced = self.content_types.is_forced();
        match classify_response(&body, forced) {
            ResponseClass::Accepted if !forced => {
                message.push_str("<b>OK</b><br><br>");
                Transmission::success(message)
            }
            ResponseClass::Accepted => {
                message.push_str(&format!("<b>{}</b><br><br>", body));
                Transmission::success(message)
            }
            ResponseClass::Rejected => {
                message.push_str(&format!("<font color=\"red\">{}</font><br><br>", body));
                Transmission::failure(TransmitError::Rejected, message)
            }
            ResponseClass::Ambiguous | ResponseClass::Unconfirmed => {
                message.push_str(&format!("<b>{}</b><br><br>", body));
                Transmission::failure(TransmitError::AmbiguousResponse, message)
            }
        }
    }
}
