use crate::{Frame, MAX_FRAME_LEN};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame exceeds maximum length of {max} bytes")]
    FrameTooLarge { max: usize },
    #[error("malformed frame body: {0}")]
    Malformed(#[from] bincode::Error),
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decodes/encodes [`Frame`]s from a length-delimited byte stream.
///
/// Framing (the 4-byte big-endian length prefix) is delegated to
/// `tokio_util`'s [`LengthDelimitedCodec`]; this type only (de)serialises the
/// body bytes it produces/consumes with `bincode`. Oversized length prefixes
/// are rejected before any body bytes are buffered.
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
    max_len: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_frame_length(MAX_FRAME_LEN)
    }

    /// Build a codec with a non-default maximum frame length. Exposed mainly
    /// for tests that need to exercise the oversized-frame rejection path
    /// without allocating `MAX_FRAME_LEN` bytes.
    pub fn with_max_frame_length(max_len: usize) -> Self {
        let mut inner = LengthDelimitedCodec::new();
        inner.set_max_frame_length(max_len);
        FrameCodec { inner, max_len }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        let Some(mut body) = self.inner.decode(src).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                CodecError::FrameTooLarge { max: self.max_len }
            } else {
                CodecError::Io(e)
            }
        })?
        else {
            return Ok(None);
        };
        let frame: Frame = bincode::deserialize(body.split_to(body.len()).chunk())?;
        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), CodecError> {
        let encoded = bincode::serialize(&item)?;
        if encoded.len() > self.max_len {
            return Err(CodecError::FrameTooLarge { max: self.max_len });
        }
        let mut body = BytesMut::with_capacity(encoded.len());
        body.put_slice(&encoded);
        self.inner.encode(body.freeze(), dst).map_err(CodecError::Io)
    }
}

/// Encode a single [`Frame`] to its on-wire bytes (length prefix included) up
/// front, independent of any particular connection's `Framed` sink.
///
/// Fan-out uses this to serialise a publish once per matching sub-topic and
/// hand the same [`bytes::Bytes`] to every subscriber of that sub-topic,
/// rather than re-encoding per recipient.
pub fn encode_frame(frame: &Frame) -> Result<bytes::Bytes, CodecError> {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    codec.encode(frame.clone(), &mut buf)?;
    Ok(buf.freeze())
}
