//! Two channel endpoints connected over a chosen transport.

use anyhow::Result;
use msgchan_core::{Channel, ChannelConfig};
use msgchan_infra::config::resolve_port_buffer;
use msgchan_infra::{Attachment, memory, stream};

use crate::cli::TransportKind;

/// Capacity of the in-process byte pipe used by the stream transport.
const PIPE_CAPACITY: usize = 64 * 1024;

/// A connected pair of endpoints and the pump tasks carrying their traffic.
pub struct Link {
    pub left: Channel,
    pub right: Channel,
    attachments: Vec<Attachment>,
}

impl Link {
    /// Build both endpoints from `config` and connect them.
    pub fn connect(transport: TransportKind, config: &ChannelConfig) -> Self {
        let left = Channel::builder().config(config.clone()).build();
        let right = Channel::builder().config(config.clone()).build();

        let attachments = match transport {
            TransportKind::Memory => {
                let (port1, port2) = memory::port_pair(resolve_port_buffer(config));
                vec![port1.attach(&left), port2.attach(&right)]
            }
            TransportKind::Stream => {
                let (pipe1, pipe2) = tokio::io::duplex(PIPE_CAPACITY);
                let (r1, w1) = tokio::io::split(pipe1);
                let (r2, w2) = tokio::io::split(pipe2);
                vec![
                    stream::attach_stream(&left, r1, w1),
                    stream::attach_stream(&right, r2, w2),
                ]
            }
        };

        tracing::debug!(?transport, "connected channel pair");
        Self {
            left,
            right,
            attachments,
        }
    }

    /// Stop every pump task and wait for them.
    pub async fn close(self) -> Result<()> {
        for attachment in &self.attachments {
            attachment.close();
        }
        for attachment in self.attachments {
            attachment.closed().await?;
        }
        Ok(())
    }
}
