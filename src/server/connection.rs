//! One TCP client: a line reader feeding the world task and a writer draining what
//! the world sends back.

use log::{debug, trace};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::logutil::escape_log;

pub type ConnectionId = Uuid;

/// Longest line accepted from a client; longer lines are answered with an error.
pub const MAX_LINE_LEN: usize = 512;

/// Everything a connection task reports to the world task.
#[derive(Debug)]
pub enum WorldInput {
    Connected {
        conn: ConnectionId,
        outbound: mpsc::UnboundedSender<String>,
    },
    Line {
        conn: ConnectionId,
        line: String,
    },
    /// A line longer than [`MAX_LINE_LEN`] was discarded.
    Oversized {
        conn: ConnectionId,
    },
    Disconnected {
        conn: ConnectionId,
    },
}

/// One read from a client stream.
#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    Line(String),
    /// The line ran past the limit; its bytes were discarded up to the next newline.
    Oversized,
    Closed,
}

/// Read the next newline-terminated line, holding at most `limit + 1` bytes of it in
/// memory. A trailing `\r` is stripped and invalid UTF-8 is replaced.
pub async fn read_line_bounded<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let chunk = limit as u64 + 1;
    buf.clear();
    if (&mut *reader).take(chunk).read_until(b'\n', buf).await? == 0 {
        return Ok(LineRead::Closed);
    }
    if buf.last() != Some(&b'\n') && buf.len() > limit {
        // drain the rest of the line in bounded chunks
        loop {
            buf.clear();
            let read = (&mut *reader).take(chunk).read_until(b'\n', buf).await?;
            if read == 0 || buf.last() == Some(&b'\n') {
                return Ok(LineRead::Oversized);
            }
        }
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(LineRead::Line(String::from_utf8_lossy(buf).into_owned()))
}

/// Pump `stream` until the client hangs up or the world drops this connection's sender.
pub async fn serve_connection(stream: TcpStream, inputs: mpsc::UnboundedSender<WorldInput>) {
    let conn = Uuid::new_v4();
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let (reader, mut writer) = stream.into_split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    if inputs.send(WorldInput::Connected { conn, outbound }).is_err() {
        return;
    }
    debug!("connection {} from {}", conn, peer);

    let write_half = async move {
        while let Some(line) = outbound_rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err()
                || writer.write_all(b"\n").await.is_err()
            {
                break;
            }
        }
        let _ = writer.shutdown().await;
    };

    let line_inputs = inputs.clone();
    let read_half = async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(MAX_LINE_LEN + 1);
        loop {
            let input = match read_line_bounded(&mut reader, &mut buf, MAX_LINE_LEN).await {
                Ok(LineRead::Line(line)) => {
                    trace!("{} <- {}", conn, escape_log(&line));
                    WorldInput::Line { conn, line }
                }
                Ok(LineRead::Oversized) => {
                    debug!("{} sent a line over {} bytes", conn, MAX_LINE_LEN);
                    WorldInput::Oversized { conn }
                }
                Ok(LineRead::Closed) => break,
                Err(e) => {
                    debug!("connection {} read error: {}", conn, e);
                    break;
                }
            };
            if line_inputs.send(input).is_err() {
                break;
            }
        }
    };

    // whichever side finishes first ends the connection
    tokio::select! {
        _ = write_half => {}
        _ = read_half => {}
    }
    let _ = inputs.send(WorldInput::Disconnected { conn });
    debug!("connection {} closed", conn);
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(mut input: &[u8], limit: usize) -> Vec<LineRead> {
        let mut buf = Vec::new();
        let mut out = Vec::new();
        loop {
            let read = read_line_bounded(&mut input, &mut buf, limit).await.expect("read");
            assert!(buf.len() <= limit + 1);
            if read == LineRead::Closed {
                return out;
            }
            out.push(read);
        }
    }

    #[tokio::test]
    async fn test_lines_are_split_and_trimmed() {
        let reads = read_all(b"LOGIN Ada\r\nACCEPT\nINV", 16).await;
        assert_eq!(
            reads,
            vec![
                LineRead::Line("LOGIN Ada".to_string()),
                LineRead::Line("ACCEPT".to_string()),
                LineRead::Line("INV".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_long_line_is_skipped_without_buffering_it() {
        let mut input = vec![b'x'; 10_000];
        input.extend_from_slice(b"\nWHO\n");
        let reads = read_all(&input, 8).await;
        assert_eq!(reads, vec![LineRead::Oversized, LineRead::Line("WHO".to_string())]);
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let reads = read_all(b"12345678\n123456789\n", 8).await;
        assert_eq!(reads, vec![LineRead::Line("12345678".to_string()), LineRead::Oversized]);
    }

    #[tokio::test]
    async fn test_unterminated_flood_ends_as_oversized() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[b'y'; 600])
            .read(&[b'y'; 600])
            .build();
        let mut reader = BufReader::with_capacity(64, &mut stream);
        let mut buf = Vec::new();
        let read = read_line_bounded(&mut reader, &mut buf, MAX_LINE_LEN)
            .await
            .expect("read");
        assert_eq!(read, LineRead::Oversized);
        assert!(buf.len() <= MAX_LINE_LEN + 1);
    }
}
