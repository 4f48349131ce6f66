//! RPC message encoding/decoding

use crate::protocol::RpcMessageType;
use bytes::{BufMut, Bytes, BytesMut};
use flint_core::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default maximum encoded message size
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Frame header: [length: 4 bytes][format: 1 byte][flags: 1 byte]
pub const FRAME_HEADER_LEN: usize = 6;

const MAX_FRAME_PAYLOAD: usize = u32::MAX as usize;

const FLAG_COMPRESSED: u8 = 0x01;

/// Serialization format for RPC messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationFormat {
    /// JSON serialization (human-readable)
    Json,
    /// MessagePack serialization (binary, compact)
    #[default]
    MessagePack,
    /// Bincode serialization (binary, fast)
    Bincode,
}

impl SerializationFormat {
    fn wire_byte(self) -> u8 {
        match self {
            SerializationFormat::Json => 0,
            SerializationFormat::MessagePack => 1,
            SerializationFormat::Bincode => 2,
        }
    }

    fn from_wire_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(SerializationFormat::Json),
            1 => Ok(SerializationFormat::MessagePack),
            2 => Ok(SerializationFormat::Bincode),
            f => Err(Error::Protocol(format!("Unknown format: {}", f))),
        }
    }
}

impl FromStr for SerializationFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(SerializationFormat::Json),
            "msgpack" | "messagepack" => Ok(SerializationFormat::MessagePack),
            "bincode" => Ok(SerializationFormat::Bincode),
            other => Err(Error::InvalidArgument(format!(
                "Unknown serialization format: {}",
                other
            ))),
        }
    }
}

/// RPC codec for message serialization/deserialization
#[derive(Debug, Clone)]
pub struct RpcCodec {
    format: SerializationFormat,
    compression: bool,
    max_message_size: usize,
}

impl RpcCodec {
    /// Create a new RPC codec with the default format
    pub fn new() -> Self {
        Self::with_format(SerializationFormat::default())
    }

    /// Create a new RPC codec with specified format
    pub fn with_format(format: SerializationFormat) -> Self {
        Self {
            format,
            compression: false,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Enable compression
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Set maximum message size.
    ///
    /// Clamped to `u32::MAX`, the largest length a frame header can carry.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_message_size = max_size.min(MAX_FRAME_PAYLOAD);
        self
    }

    /// Serialize typed data to bytes
    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serialize_with(self.format, value)
    }

    /// Deserialize typed data from bytes
    pub fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        deserialize_with(self.format, data)
    }

    /// Get codec format
    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    /// Check if compression is enabled
    pub fn compression_enabled(&self) -> bool {
        self.compression
    }

    /// Get maximum message size
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Compress data using deflate
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        use flate2::write::DeflateEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .map_err(|e| Error::Serialization(format!("Compression failed: {}", e)))?;

        encoder
            .finish()
            .map_err(|e| Error::Serialization(format!("Compression finish failed: {}", e)))
    }

    /// Decompress data using deflate
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        use flate2::read::DeflateDecoder;
        use std::io::Read;

        let mut decoder = DeflateDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| Error::Serialization(format!("Decompression failed: {}", e)))?;

        Ok(decompressed)
    }
}

impl Default for RpcCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize_with<T: Serialize>(format: SerializationFormat, value: &T) -> Result<Vec<u8>> {
    match format {
        SerializationFormat::Json => serde_json::to_vec(value)
            .map_err(|e| Error::Serialization(format!("JSON serialization failed: {}", e))),
        SerializationFormat::MessagePack => rmp_serde::to_vec(value)
            .map_err(|e| Error::Serialization(format!("MessagePack serialization failed: {}", e))),
        SerializationFormat::Bincode => bincode::serialize(value)
            .map_err(|e| Error::Serialization(format!("Bincode serialization failed: {}", e))),
    }
}

fn deserialize_with<T: DeserializeOwned>(format: SerializationFormat, data: &[u8]) -> Result<T> {
    match format {
        SerializationFormat::Json => serde_json::from_slice(data)
            .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {}", e))),
        SerializationFormat::MessagePack => rmp_serde::from_slice(data).map_err(|e| {
            Error::Serialization(format!("MessagePack deserialization failed: {}", e))
        }),
        SerializationFormat::Bincode => bincode::deserialize(data)
            .map_err(|e| Error::Serialization(format!("Bincode deserialization failed: {}", e))),
    }
}

/// Length-prefixed framing of RPC messages over a byte stream.
///
/// The sender's format and compression are recorded in each frame header, so
/// a peer decodes frames regardless of its own encoding settings.
#[derive(Debug, Clone, Default)]
pub struct WireProtocol {
    codec: RpcCodec,
}

impl WireProtocol {
    /// Create a new wire protocol
    pub fn new(codec: RpcCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &RpcCodec {
        &self.codec
    }

    /// Encode message for wire transmission
    pub fn encode_for_wire(&self, message: &RpcMessageType) -> Result<Bytes> {
        let mut data = self.codec.serialize(message)?;
        if self.codec.compression {
            data = self.codec.compress(&data)?;
        }

        if data.len() > self.codec.max_message_size {
            return Err(Error::InvalidArgument(format!(
                "Message size {} exceeds maximum size {}",
                data.len(),
                self.codec.max_message_size
            )));
        }

        let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + data.len());
        frame.put_u32(data.len() as u32);
        frame.put_u8(self.codec.format.wire_byte());
        frame.put_u8(if self.codec.compression { FLAG_COMPRESSED } else { 0 });
        frame.extend_from_slice(&data);

        Ok(frame.freeze())
    }

    /// Decode message from a complete frame
    pub fn decode_from_wire(&self, wire_data: &[u8]) -> Result<RpcMessageType> {
        if wire_data.len() < FRAME_HEADER_LEN {
            return Err(Error::Protocol("Wire data too short".to_string()));
        }

        let mut header = [0u8; FRAME_HEADER_LEN];
        header.copy_from_slice(&wire_data[..FRAME_HEADER_LEN]);
        let length = self.check_header(&header)?;

        if wire_data.len() < FRAME_HEADER_LEN + length {
            return Err(Error::Protocol(format!(
                "Wire data length mismatch: expected {}, got {}",
                FRAME_HEADER_LEN + length,
                wire_data.len()
            )));
        }

        self.decode_body(&header, &wire_data[FRAME_HEADER_LEN..FRAME_HEADER_LEN + length])
    }

    /// Write one framed message to an async stream
    pub async fn write_message<W>(&self, writer: &mut W, message: &RpcMessageType) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = self.encode_for_wire(message)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one framed message from an async stream.
    ///
    /// Returns `Ok(None)` when the peer closed the stream between frames.
    pub async fn read_message<R>(&self, reader: &mut R) -> Result<Option<RpcMessageType>>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; FRAME_HEADER_LEN];
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let length = self.check_header(&header)?;
        let mut body = vec![0u8; length];
        reader.read_exact(&mut body).await?;

        self.decode_body(&header, &body).map(Some)
    }

    fn check_header(&self, header: &[u8; FRAME_HEADER_LEN]) -> Result<usize> {
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        if length > self.codec.max_message_size {
            return Err(Error::Protocol(format!(
                "Message size {} exceeds maximum size {}",
                length, self.codec.max_message_size
            )));
        }
        Ok(length)
    }

    fn decode_body(&self, header: &[u8; FRAME_HEADER_LEN], body: &[u8]) -> Result<RpcMessageType> {
        let format = SerializationFormat::from_wire_byte(header[4])?;
        let compressed = header[5] & FLAG_COMPRESSED != 0;

        if compressed {
            let data = self.codec.decompress(body)?;
            deserialize_with(format, &data)
        } else {
            deserialize_with(format, body)
        }
    }
}
