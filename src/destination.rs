//! Destination descriptors
//!
//! A destination string is parsed once, when a job is set up, into a
//! [`Destination`]. Transmission code matches on the variant and never looks
//! at the string again.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransmitError};

const HTTP_SCHEME: &str = "http://";
const HTTPS_SCHEME: &str = "https://";
const DICOM_SCHEME: &str = "dicom://";

/// Parsed transmission target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum Destination {
    Http {
        url: String,
    },
    Https {
        url: String,
    },
    Dicom {
        called_aet: String,
        calling_aet: String,
        host: String,
        port: u16,
    },
}

impl Destination {
    /// Parse a destination string.
    ///
    /// The scheme is found by case-insensitive substring search, HTTP first,
    /// then HTTPS, then DICOM. HTTP(S) URLs are kept verbatim and only checked
    /// when a connection is attempted.
    pub fn parse(destination: &str) -> Result<Self> {
        let trimmed = destination.trim();
        let lower = trimmed.to_lowercase();

        if lower.contains(HTTP_SCHEME) {
            Ok(Destination::Http {
                url: trimmed.to_string(),
            })
        } else if lower.contains(HTTPS_SCHEME) {
            Ok(Destination::Https {
                url: trimmed.to_string(),
            })
        } else if lower.contains(DICOM_SCHEME) {
            parse_dicom(trimmed)
        } else {
            Err(TransmitError::malformed(format!(
                "Unsupported destination protocol [{}]",
                trimmed
            )))
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, Destination::Http { .. } | Destination::Https { .. })
    }

    /// The DICOM node this destination addresses, if it is a DICOM destination
    pub fn remote_node(&self) -> Option<dimse::RemoteNode> {
        match self {
            Destination::Dicom {
                called_aet,
                host,
                port,
                ..
            } => Some(dimse::RemoteNode::new(called_aet.clone(), host.clone(), *port)),
            _ => None,
        }
    }
}

// dicom://<calledAET>:<callingAET>@<host>:<port>
fn parse_dicom(destination: &str) -> Result<Destination> {
    let start = destination
        .find("://")
        .map(|k| k + 3)
        .unwrap_or_default();
    let rest = &destination[start..];

    // the titles end at the first '@'; without one the whole rest is titles
    let (titles, address) = match rest.split_once('@') {
        Some((titles, address)) => (titles, Some(address)),
        None => (rest, None),
    };
    let (called_aet, calling_aet) = titles
        .split_once(':')
        .ok_or_else(|| TransmitError::malformed("Missing separator [:] for AE Titles"))?;
    let address =
        address.ok_or_else(|| TransmitError::malformed("Missing terminator [@] for CallingAET"))?;
    let (host, port) = address
        .split_once(':')
        .ok_or_else(|| TransmitError::malformed("Missing separator [:] for Host and Port"))?;

    let port = port.trim();
    let port = port.parse::<u16>().map_err(|_| {
        TransmitError::malformed(format!("Unparseable port number [{}]", port))
    })?;

    Ok(Destination::Dicom {
        called_aet: called_aet.trim().to_string(),
        calling_aet: calling_aet.trim().to_string(),
        host: host.trim().to_string(),
        port,
    })
}

impl FromStr for Destination {
    type Err = TransmitError;

    fn from_str(s: &str) -> Result<Self> {
        Destination::parse(s)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Http { url } | Destination::Https { url } => write!(f, "{}", url),
            Destination::Dicom {
                called_aet,
                calling_aet,
                host,
                port,
            } => write!(f, "dicom://{}:{}@{}:{}", called_aet, calling_aet, host, port),
        }
    }
}
