use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dimse::{DimseScu, RemoteNode, ScuBuilder, StoreStatus};
use tracing::warn;

use super::{red, send_header, Transmission, Transmitter};
use crate::destination::Destination;
use crate::error::{Result, TransmitError};

/// Sends one file to a DICOM storage node
#[async_trait]
pub trait DicomSender: Send + Sync {
    async fn send(&self, file: &Path) -> StoreStatus;
}

/// [`DicomSender`] over the `dimse` SCU, one association per file
#[derive(Debug, Clone)]
pub struct ScuSender {
    scu: DimseScu,
    node: RemoteNode,
}

impl ScuSender {
    /// Build a sender for a DICOM destination. Fails for other destinations
    /// and for AE titles the association layer would refuse.
    pub fn new(destination: &Destination, association_timeout: Duration) -> Result<Self> {
        let Destination::Dicom { calling_aet, .. } = destination else {
            return Err(TransmitError::malformed(format!(
                "{} is not a DICOM destination",
                destination
            )));
        };
        let node = destination
            .remote_node()
            .ok_or_else(|| TransmitError::malformed("missing DICOM node"))?;
        node.validate()
            .map_err(|e| TransmitError::malformed(e.to_string()))?;

        let scu = ScuBuilder::new()
            .local_aet(calling_aet.clone())
            .connection_timeout(association_timeout)
            .association_timeout(association_timeout)
            .build()
            .map_err(|e| TransmitError::malformed(e.to_string()))?;

        Ok(Self { scu, node })
    }

    pub fn node(&self) -> &RemoteNode {
        &self.node
    }
}

#[async_trait]
impl DicomSender for ScuSender {
    async fn send(&self, file: &Path) -> StoreStatus {
        match self.scu.store_file(&self.node, file).await {
            Ok(status) => status,
            Err(e) if e.is_recoverable() => {
                warn!("C-STORE of {} will need a retry: {}", file.display(), e);
                StoreStatus::Retry
            }
            Err(e) => {
                warn!("C-STORE of {} failed: {}", file.display(), e);
                StoreStatus::Fail
            }
        }
    }
}

pub struct DicomTransmitter {
    destination: String,
    sender: Arc<dyn DicomSender>,
}

impl DicomTransmitter {
    /// `destination` is the name shown in progress messages
    pub fn new(destination: impl Into<String>, sender: Arc<dyn DicomSender>) -> Self {
        Self {
            destination: destination.into(),
            sender,
        }
    }
}

#[async_trait]
impl Transmitter for DicomTransmitter {
    async fn transmit(&self, file: &Path, sequence: u32) -> Transmission {
        let mut message = send_header(sequence, file, &self.destination);
        match self.sender.send(file).await {
            StoreStatus::Ok => {
                message.push_str("<b>OK</b><br><br>");
                Transmission::success(message)
            }
            status => {
                let error = TransmitError::RemoteReject(status);
                message.push_str(&red(&error));
                message.push_str("<br>");
                Transmission::failure(error, message)
            }
        }
    }
}
