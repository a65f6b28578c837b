use super::ChunkStream;
use crate::error::ChatError;
use futures::stream::{Stream, StreamExt};

/// Turns raw body chunks into text. Chunk boundaries may split a multi-byte
/// UTF-8 sequence; the incomplete tail is held back until the next chunk.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    carry: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);

        let mut out = String::new();
        let mut input: &[u8] = &self.carry;

        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    input = &[];
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix is UTF-8
                    out.push_str(&String::from_utf8_lossy(valid));

                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[bad..];
                        }
                        // Incomplete sequence at the end, wait for more bytes
                        None => {
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }

        self.carry = input.to_vec();
        out
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            return None;
        }
        let tail = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        Some(tail)
    }
}

/// Decode a raw body stream into text fragments. A transport error ends the
/// stream after being yielded once; empty fragments are never produced.
pub fn text_stream<S, B, E>(body: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = (Box::pin(body), Utf8ChunkDecoder::new(), false);

    let stream = futures::stream::unfold(state, |(mut body, mut decoder, done)| async move {
        if done {
            return None;
        }
        loop {
            match body.next().await {
                Some(Ok(bytes)) => {
                    let text = decoder.decode(bytes.as_ref());
                    if !text.is_empty() {
                        return Some((Ok(text), (body, decoder, false)));
                    }
                }
                Some(Err(e)) => {
                    let err = ChatError::StreamTransport(e.to_string());
                    return Some((Err(err), (body, decoder, true)));
                }
                None => {
                    return decoder
                        .finish()
                        .map(|tail| (Ok(tail), (body, decoder, true)));
                }
            }
        }
    });

    Box::pin(stream)
}
