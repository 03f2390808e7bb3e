//! Newline-delimited JSON framing.
//!
//! Each frame is one JSON document followed by `\n`. A trailing `\r` is
//! tolerated. The final frame of a stream may omit the newline.

use serde::Serialize;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Outcome of reading one frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A complete frame is in the buffer.
    Line,
    /// The frame exceeded the limit and was discarded up to its newline.
    TooLarge(usize),
    /// The peer closed the stream.
    Eof,
}

/// Reads one frame of at most `limit` bytes into `buf`.
///
/// The limit applies to the frame without its line terminator.
pub(crate) async fn read_frame<R>(reader: &mut R, limit: usize, buf: &mut Vec<u8>) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    // Room for the frame, "\r\n" and nothing else.
    let read = (&mut *reader)
        .take(limit as u64 + 2)
        .read_until(b'\n', buf)
        .await?;
    if read == 0 {
        return Ok(Frame::Eof);
    }

    let terminated = buf.last() == Some(&b'\n');
    if terminated {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    if buf.len() <= limit {
        return Ok(Frame::Line);
    }

    let mut size = buf.len();
    if !terminated {
        let (skipped, crlf) = discard_line(reader, buf.last().copied()).await?;
        size += skipped;
        size -= usize::from(crlf);
    }
    buf.clear();
    Ok(Frame::TooLarge(size))
}

/// Skips input up to and including the next newline.
///
/// Returns the bytes skipped before the newline and whether the byte right
/// before it, possibly `last`, was `\r`.
async fn discard_line<R>(reader: &mut R, mut last: Option<u8>) -> io::Result<(usize, bool)>
where
    R: AsyncBufRead + Unpin,
{
    let mut skipped = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok((skipped, false));
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if pos > 0 {
                    last = Some(available[pos - 1]);
                }
                reader.consume(pos + 1);
                return Ok((skipped + pos, last == Some(b'\r')));
            }
            None => {
                let len = available.len();
                last = available.last().copied();
                reader.consume(len);
                skipped += len;
            }
        }
    }
}

/// Writes `value` as one frame.
pub(crate) async fn write_frame<W, T>(writer: &mut W, value: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn frames(input: &[u8], limit: usize) -> Vec<(Frame, Vec<u8>)> {
        let mut reader = BufReader::with_capacity(4, input);
        let mut buf = Vec::new();
        let mut out = Vec::new();
        loop {
            let frame = read_frame(&mut reader, limit, &mut buf).await.unwrap();
            if frame == Frame::Eof {
                return out;
            }
            out.push((frame, buf.clone()));
        }
    }

    #[tokio::test]
    async fn splits_lines() {
        let out = frames(b"{\"a\":1}\r\n[]\nlast", 64).await;
        assert_eq!(
            out,
            vec![
                (Frame::Line, b"{\"a\":1}".to_vec()),
                (Frame::Line, b"[]".to_vec()),
                (Frame::Line, b"last".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn oversized_frame_is_skipped() {
        let out = frames(b"0123456789abcdef\nok\n", 8).await;
        assert_eq!(
            out,
            vec![(Frame::TooLarge(16), Vec::new()), (Frame::Line, b"ok".to_vec())]
        );
    }

    #[tokio::test]
    async fn frame_at_limit_is_accepted() {
        let out = frames(b"12345678\n", 8).await;
        assert_eq!(out, vec![(Frame::Line, b"12345678".to_vec())]);
    }

    #[tokio::test]
    async fn crlf_frame_at_limit_is_accepted() {
        let out = frames(b"12345678\r\n123456789\r\nok\r\n", 8).await;
        assert_eq!(
            out,
            vec![
                (Frame::Line, b"12345678".to_vec()),
                (Frame::TooLarge(9), Vec::new()),
                (Frame::Line, b"ok".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn unterminated_frame_over_limit_is_skipped() {
        let out = frames(b"123456789\nok", 8).await;
        assert_eq!(
            out,
            vec![(Frame::TooLarge(9), Vec::new()), (Frame::Line, b"ok".to_vec())]
        );
    }

    #[tokio::test]
    async fn write_appends_newline() {
        let mut out = Vec::new();
        write_frame(&mut out, &serde_json::json!({"ok": true}))
            .await
            .unwrap();
        assert_eq!(out, b"{\"ok\":true}\n");
    }
}
