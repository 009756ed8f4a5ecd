//! Newline-delimited JSON transport over a byte stream.
//!
//! Each envelope is encoded as one JSON object followed by `\n`. Works over
//! anything that implements `AsyncRead`/`AsyncWrite`: pipes, sockets, child
//! process stdio, or `tokio::io::duplex` in tests.

use msgchan_core::{Channel, Envelope, InboundHandler};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::attachment::Attachment;
use crate::error::TransportError;

/// Wire `channel` to a byte stream. Must be called inside a tokio runtime.
///
/// Spawns a writer task draining outbound envelopes into `writer` and a
/// reader task decoding lines from `reader` into the channel's inbound
/// handler. Lines that do not decode as an envelope are logged and skipped.
pub fn attach_stream<R, W>(channel: &Channel, reader: R, writer: W) -> Attachment
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Envelope>();
    channel.register_outbound(move |envelope| {
        if out_tx.send(envelope).is_err() {
            debug!("stream writer stopped, dropping envelope");
        }
    });

    let cancel = CancellationToken::new();
    let writer_task = tokio::spawn(write_envelopes(out_rx, writer, cancel.clone()));
    let reader_task = tokio::spawn(read_envelopes(
        channel.inbound_handler(),
        reader,
        cancel.clone(),
    ));

    Attachment::new(cancel, vec![writer_task, reader_task])
}

/// Encode one envelope as a JSON line.
pub fn encode_line(envelope: &Envelope) -> Result<Vec<u8>, TransportError> {
    let mut line = serde_json::to_vec(envelope)?;
    line.push(b'\n');
    Ok(line)
}

async fn write_envelopes<W>(
    mut out_rx: mpsc::UnboundedReceiver<Envelope>,
    mut writer: W,
    cancel: CancellationToken,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = out_rx.recv() => match next {
                Some(envelope) => {
                    writer.write_all(&encode_line(&envelope)?).await?;
                    writer.flush().await?;
                }
                None => break,
            },
        }
    }
    writer.shutdown().await?;
    debug!("stream writer stopped");
    Ok(())
}

async fn read_envelopes<R>(
    handler: InboundHandler,
    reader: R,
    cancel: CancellationToken,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Envelope>(&line) {
            Ok(envelope) => handler.handle(envelope),
            Err(err) => warn!(%err, "skipping undecodable line"),
        }
    }
    debug!("stream reader stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgchan_core::{ChannelError, FetchOptions, RemoteError};
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::DuplexStream;

    fn attach_half(channel: &Channel, stream: DuplexStream) -> Attachment {
        let (reader, writer) = tokio::io::split(stream);
        attach_stream(channel, reader, writer)
    }

    #[test]
    fn encode_line_appends_newline() {
        let line = encode_line(&Envelope::notification("test", json!(4))).unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        let text = std::str::from_utf8(&line).unwrap();
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.starts_with('{'));
    }

    #[tokio::test]
    async fn fetch_over_duplex_stream() {
        let (left, right) = tokio::io::duplex(64 * 1024);
        let a = Channel::new();
        let b = Channel::new();
        let _att_a = attach_half(&a, left);
        let _att_b = attach_half(&b, right);

        b.on("x", |event| {
            event.send(2 * event.data_as::<i64>()?)?;
            Ok(())
        });
        b.on("fails", |_| Err(RemoteError::with_kind("RangeError", "too big")));

        let val: i64 = a.fetch("x", 6, None).unwrap().decode().await.unwrap();
        assert_eq!(val, 12);

        let err = a.fetch("fails", 1, None).unwrap().await.unwrap_err();
        assert!(matches!(err, ChannelError::Rejected(ref remote) if remote.kind == "RangeError"));
    }

    #[tokio::test]
    async fn undecodable_lines_are_skipped() {
        let (raw, wired) = tokio::io::duplex(64 * 1024);
        let channel = Channel::new();
        let _att = attach_half(&channel, wired);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        channel.on("ping", move |event| {
            let _ = seen_tx.send(event.data().clone());
            Ok(())
        });

        let (_raw_reader, mut raw_writer) = tokio::io::split(raw);
        raw_writer.write_all(b"not json at all\n\n").await.unwrap();
        raw_writer
            .write_all(&encode_line(&Envelope::notification("ping", json!("pong"))).unwrap())
            .await
            .unwrap();

        let data = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data, json!("pong"));
    }

    #[tokio::test]
    async fn dropping_channel_ends_writer_and_peer_reader() {
        let (left, right) = tokio::io::duplex(1024);
        let a = Channel::new();
        let b = Channel::new();
        let att_a = attach_half(&a, left);
        let att_b = attach_half(&b, right);

        drop(a);
        drop(b);

        tokio::time::timeout(Duration::from_secs(1), att_a.closed())
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), att_b.closed())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn closed_stream_times_out_fetch() {
        let (left, right) = tokio::io::duplex(1024);
        let a = Channel::new();
        let b = Channel::new();
        let _att_a = attach_half(&a, left);
        let att_b = attach_half(&b, right);
        b.on("echo", |event| {
            event.send(event.data().clone())?;
            Ok(())
        });

        att_b.close();
        att_b.closed().await.unwrap();

        let err = a
            .fetch("echo", 1, Some(FetchOptions::with_timeout(300)))
            .unwrap()
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
