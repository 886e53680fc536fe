//! Line framing for the TCP byte stream.
//!
//! Frames on `\n`, tolerating `\r\n`, and decodes lossily: the target servers
//! occasionally emit bytes that are not valid UTF-8 and a chat bot should
//! shrug those off rather than drop the connection. Parsing into a
//! [`Message`](super::Message) happens in the session so a malformed line can
//! be logged and skipped individually.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Upper bound for a single inbound line, terminator included.
const MAX_LINE_LENGTH: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("line exceeds maximum length ({MAX_LINE_LENGTH} bytes)")]
    LineTooLong,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Frames raw lines on `\n` boundaries; outgoing lines get `\r\n` appended.
#[derive(Debug, Default)]
pub struct LineCodec;

impl Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let mut line = src.split_to(pos);
                src.advance(1);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                Ok(Some(String::from_utf8_lossy(&line).into_owned()))
            }
            None if src.len() > MAX_LINE_LENGTH => Err(CodecError::LineTooLong),
            None => Ok(None),
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_complete_line() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::from("PING :token\r\n");
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line, "PING :token");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_accepts_bare_lf() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::from("PING :token\n");
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line, "PING :token");
    }

    #[test]
    fn decode_partial_line_then_complete() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::from("NICK mod");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"bot\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "NICK modbot");
    }

    #[test]
    fn decode_two_lines_in_one_read() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::from("NICK modbot\r\nJOIN #room\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "NICK modbot");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "JOIN #room");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_rejects_oversized_line() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::from(vec![b'A'; MAX_LINE_LENGTH + 1].as_slice());
        assert!(matches!(
            codec.decode(&mut buf).unwrap_err(),
            CodecError::LineTooLong
        ));
    }

    #[test]
    fn decode_survives_invalid_utf8() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::from(&b"PING :a\xffb\r\n"[..]);
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert!(line.starts_with("PING :a"));
    }

    #[test]
    fn encode_appends_crlf() {
        let mut codec = LineCodec;
        let mut buf = BytesMut::new();
        codec.encode("PONG :abc123".to_owned(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"PONG :abc123\r\n");
    }
}
