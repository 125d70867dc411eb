//! `Content-Length` framing (the tsserver wire format).
//!
//! ```text
//! Content-Length: 27\r\n
//! \r\n
//! {"seq":1,"type":"Files"}
//! ```

use std::io::{BufRead, Write};

use tsz_common::limits::MAX_FRAME_BYTES;

use crate::error::CheckerError;

/// Read one framed message. `Ok(None)` on a clean end of stream.
///
/// A header line that is not `Content-Length:` is taken as a raw JSON
/// message, which keeps hand-driven sessions (`echo '{..}' | worker`) usable.
pub fn read_frame<R: BufRead>(reader: &mut R) -> Result<Option<String>, CheckerError> {
    let mut header_line = String::new();
    loop {
        header_line.clear();
        if reader.read_line(&mut header_line)? == 0 {
            return Ok(None);
        }
        if !header_line.trim().is_empty() {
            break;
        }
    }
    let header = header_line.trim();

    let Some(len_str) = header.strip_prefix("Content-Length:") else {
        return Ok(Some(header.to_string()));
    };
    let content_length = len_str
        .trim()
        .parse::<usize>()
        .map_err(|_| CheckerError::InvalidHeader(header.to_string()))?;
    if content_length > MAX_FRAME_BYTES {
        return Err(CheckerError::FrameTooLarge {
            len: content_length,
            limit: MAX_FRAME_BYTES,
        });
    }

    // Blank separator line.
    let mut blank_line = String::new();
    reader.read_line(&mut blank_line)?;

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    String::from_utf8(body)
        .map(Some)
        .map_err(|_| CheckerError::InvalidHeader("message body is not UTF-8".to_string()))
}

/// Frame `message` into bytes ready for the wire.
pub fn encode_frame(message: &str) -> Vec<u8> {
    let mut frame = format!("Content-Length: {}\r\n\r\n", message.len()).into_bytes();
    frame.extend_from_slice(message.as_bytes());
    frame
}

pub fn write_frame<W: Write>(writer: &mut W, message: &str) -> Result<(), CheckerError> {
    writer.write_all(&encode_frame(message))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "../tests/framing_tests.rs"]
mod framing_tests;
