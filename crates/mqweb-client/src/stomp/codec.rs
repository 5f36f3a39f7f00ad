//! tokio-util codec for STOMP 1.2 frames and heart-beats

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::frame::{escape, unescape, Frame};

/// Largest frame accepted from the broker
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// What the broker can put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompItem {
    Frame(Frame),
    Heartbeat,
}

#[derive(Debug, Default)]
pub struct StompCodec;

fn invalid(reason: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason.into())
}

/// Position of the newline ending the header block and of the first body byte
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut from = 0;
    while let Some(offset) = buf[from..].iter().position(|b| *b == b'\n') {
        let newline = from + offset;
        let rest = &buf[newline + 1..];
        if rest.first() == Some(&b'\n') {
            return Some((newline, newline + 2));
        }
        if rest.starts_with(b"\r\n") {
            return Some((newline, newline + 3));
        }
        from = newline + 1;
    }
    None
}

fn check_size(buffered: usize) -> io::Result<()> {
    if buffered > MAX_FRAME_SIZE {
        Err(invalid(format!("frame exceeds {MAX_FRAME_SIZE} bytes")))
    } else {
        Ok(())
    }
}

fn parse_head(head: &[u8]) -> io::Result<Frame> {
    let head = std::str::from_utf8(head).map_err(|e| invalid(e.to_string()))?;
    let mut lines = head
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line));

    let command = lines
        .next()
        .filter(|command| !command.is_empty())
        .ok_or_else(|| invalid("missing frame command"))?;
    let mut frame = Frame::new(command);
    let escaped = frame.escapes_headers();

    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| invalid(format!("malformed header line '{line}'")))?;
        let (name, value) = if escaped {
            (
                unescape(name).ok_or_else(|| invalid(format!("bad escape in '{name}'")))?,
                unescape(value).ok_or_else(|| invalid(format!("bad escape in '{value}'")))?,
            )
        } else {
            (name.to_string(), value.to_string())
        };
        frame.headers.push((name, value));
    }
    Ok(frame)
}

impl Decoder for StompCodec {
    type Item = StompItem;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<StompItem>> {
        if src.first() == Some(&b'\n') {
            src.advance(1);
            return Ok(Some(StompItem::Heartbeat));
        }
        if src.starts_with(b"\r\n") {
            src.advance(2);
            return Ok(Some(StompItem::Heartbeat));
        }
        if src.as_ref() == b"\r" {
            return Ok(None);
        }

        let Some((head_end, body_start)) = find_head_end(src) else {
            check_size(src.len())?;
            return Ok(None);
        };
        let mut frame = parse_head(&src[..head_end])?;

        let body_len = match frame.get_header("content-length") {
            Some(length) => length
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid(format!("bad content-length '{length}'")))?,
            None => match src[body_start..].iter().position(|b| *b == 0) {
                Some(length) => length,
                None => {
                    check_size(src.len())?;
                    return Ok(None);
                }
            },
        };
        check_size(body_len)?;

        let total = body_start + body_len + 1;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        if src[total - 1] != 0 {
            return Err(invalid("frame body is not NUL terminated"));
        }

        let mut raw = src.split_to(total);
        raw.advance(body_start);
        raw.truncate(body_len);
        frame.body = raw.freeze();
        Ok(Some(StompItem::Frame(frame)))
    }
}

impl Encoder<Frame> for StompCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> io::Result<()> {
        let escaped = frame.escapes_headers();

        dst.extend_from_slice(frame.command.as_bytes());
        dst.put_u8(b'\n');
        for (name, value) in &frame.headers {
            if escaped {
                dst.extend_from_slice(escape(name).as_bytes());
                dst.put_u8(b':');
                dst.extend_from_slice(escape(value).as_bytes());
            } else {
                dst.extend_from_slice(name.as_bytes());
                dst.put_u8(b':');
                dst.extend_from_slice(value.as_bytes());
            }
            dst.put_u8(b'\n');
        }
        dst.put_u8(b'\n');
        dst.extend_from_slice(&frame.body);
        dst.put_u8(0);
        Ok(())
    }
}
