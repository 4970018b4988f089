use bytes::{Buf, BytesMut};
use serde_json::Value;

/// A line longer than this without a newline is flushed as text.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// One decoded unit of the inbound stream.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Json(Value),
    /// A line that is not JSON.
    Text(String),
}

/**
Incremental decoder for the newline delimited responses of a device.

TCP does not keep message boundaries, so bytes are appended to a buffer that
lives as long as the connection and only complete lines are taken out of it.
A trailing partial line stays in the buffer until the next read completes it.
*/
#[derive(Debug, Default)]
pub struct ResponseDecoder {
    buffer: BytesMut,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        ResponseDecoder {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// The buffer reads should append to.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes waiting for the rest of their line.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Takes every complete line out of the buffer.
    pub fn decode(&mut self) -> Vec<InboundFrame> {
        let mut frames = Vec::new();
        loop {
            let Some(end) = self.buffer.iter().position(|&b| b == b'\n') else {
                if self.buffer.len() > MAX_LINE_LENGTH {
                    let line = self.buffer.split();
                    frames.push(InboundFrame::Text(
                        String::from_utf8_lossy(&line).into_owned(),
                    ));
                }
                break;
            };
            let line = self.buffer.split_to(end);
            self.buffer.advance(1);
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            Self::decode_line(line, &mut frames);
        }
        frames
    }

    // Some firmwares put several objects on one line. Whatever follows the
    // last object that parses is kept as text.
    fn decode_line(line: &str, frames: &mut Vec<InboundFrame>) {
        let mut values = serde_json::Deserializer::from_str(line).into_iter::<Value>();
        while let Some(value) = values.next() {
            match value {
                Ok(value) => frames.push(InboundFrame::Json(value)),
                Err(_) => {
                    let rest = line[values.byte_offset()..].trim();
                    if !rest.is_empty() {
                        frames.push(InboundFrame::Text(rest.to_string()));
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_keeps_partial_line() {
        let mut decoder = ResponseDecoder::new();
        decoder.extend(br#"{"id":1,"res"#);
        assert!(decoder.decode().is_empty());
        assert_eq!(decoder.pending_len(), 12);

        decoder.extend(b"ult\":[\"ok\"]}\r\n");
        assert_eq!(
            decoder.decode(),
            vec![InboundFrame::Json(json!({"id": 1, "result": ["ok"]}))]
        );
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_decode_multiple_lines_in_one_read() {
        let mut decoder = ResponseDecoder::new();
        decoder.extend(b"{\"id\":1,\"result\":[\"ok\"]}\r\n{\"id\":2,\"result\":[\"on\"]}\r\n{\"id\":3");
        let frames = decoder.decode();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], InboundFrame::Json(json!({"id": 2, "result": ["on"]})));
        assert_eq!(decoder.pending_len(), 7);
    }

    #[test]
    fn test_decode_concatenated_objects_on_one_line() {
        let mut decoder = ResponseDecoder::new();
        decoder.extend(b"{\"id\":1}{\"id\":2}\n");
        assert_eq!(
            decoder.decode(),
            vec![
                InboundFrame::Json(json!({"id": 1})),
                InboundFrame::Json(json!({"id": 2}))
            ]
        );
    }

    #[test]
    fn test_decode_non_json_line_is_text() {
        let mut decoder = ResponseDecoder::new();
        decoder.extend(b"\r\nnot json\r\n");
        assert_eq!(
            decoder.decode(),
            vec![InboundFrame::Text("not json".to_string())]
        );
    }

    #[test]
    fn test_decode_keeps_objects_before_trailing_garbage() {
        let mut decoder = ResponseDecoder::new();
        decoder.extend(b"{\"id\":1,\"result\":[\"ok\"]}junk\r\n");
        assert_eq!(
            decoder.decode(),
            vec![
                InboundFrame::Json(json!({"id": 1, "result": ["ok"]})),
                InboundFrame::Text("junk".to_string())
            ]
        );
    }

    #[test]
    fn test_decode_flushes_oversized_line() {
        let mut decoder = ResponseDecoder::new();
        decoder.extend(&vec![b'a'; MAX_LINE_LENGTH + 1]);
        let frames = decoder.decode();
        assert_eq!(frames.len(), 1);
        assert_eq!(decoder.pending_len(), 0);
    }
}
