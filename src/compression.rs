//! Compression codecs for stored dataset payloads

use crate::error::{Result, SourceError};
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Compression methods a dataset payload may be stored with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    /// Raw little-endian elements
    None,
    /// Deflate/ZIP compression
    Deflate,
    /// Byte-wise run-length encoding, useful for sparse masks
    Rle,
    /// Zstandard compression
    #[default]
    Zstd,
}

/// Codec for one compression method
pub trait Codec: Send + Sync {
    /// Compress data at the given level (0-9, clamped)
    fn compress(&self, data: &[u8], level: u8) -> Result<Vec<u8>>;

    /// Decompress data; fails if the output length differs from `expected_size`
    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>>;

    fn method(&self) -> CompressionMethod;
}

fn check_size(decoded: Vec<u8>, expected_size: usize) -> Result<Vec<u8>> {
    if decoded.len() != expected_size {
        return Err(SourceError::Decompression(format!(
            "expected {} bytes, decoded {}",
            expected_size,
            decoded.len()
        )));
    }
    Ok(decoded)
}

#[derive(Debug, Default)]
pub struct NoneCodec;

impl Codec for NoneCodec {
    fn compress(&self, data: &[u8], _level: u8) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        check_size(data.to_vec(), expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::None
    }
}

#[derive(Debug, Default)]
pub struct DeflateCodec;

impl Codec for DeflateCodec {
    fn compress(&self, data: &[u8], level: u8) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(data, FlateCompression::new(level.min(9) as u32));
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| SourceError::Compression(e.to_string()))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let mut decoded = Vec::with_capacity(expected_size);
        DeflateDecoder::new(data)
            .read_to_end(&mut decoded)
            .map_err(|e| SourceError::Decompression(e.to_string()))?;
        check_size(decoded, expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }
}

#[derive(Debug, Default)]
pub struct ZstdCodec;

impl Codec for ZstdCodec {
    fn compress(&self, data: &[u8], level: u8) -> Result<Vec<u8>> {
        zstd::encode_all(data, level.min(9) as i32)
            .map_err(|e| SourceError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let decoded =
            zstd::decode_all(data).map_err(|e| SourceError::Decompression(e.to_string()))?;
        check_size(decoded, expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }
}

/// Pairs of (run length, byte)
#[derive(Debug, Default)]
pub struct RleCodec;

impl Codec for RleCodec {
    fn compress(&self, data: &[u8], _level: u8) -> Result<Vec<u8>> {
        let mut encoded = Vec::new();
        let mut i = 0;
        while i < data.len() {
            let byte = data[i];
            let run = data[i..]
                .iter()
                .take(255)
                .take_while(|&&b| b == byte)
                .count();
            encoded.push(run as u8);
            encoded.push(byte);
            i += run;
        }
        Ok(encoded)
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        if data.len() % 2 != 0 {
            return Err(SourceError::Decompression(
                "RLE data must have even length".to_string(),
            ));
        }
        let mut decoded = Vec::with_capacity(expected_size);
        for pair in data.chunks_exact(2) {
            decoded.extend(std::iter::repeat(pair[1]).take(pair[0] as usize));
        }
        check_size(decoded, expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Rle
    }
}

/// Get the codec for a given method
pub fn get_codec(method: CompressionMethod) -> Box<dyn Codec> {
    match method {
        CompressionMethod::None => Box::new(NoneCodec),
        CompressionMethod::Deflate => Box::new(DeflateCodec),
        CompressionMethod::Rle => Box::new(RleCodec),
        CompressionMethod::Zstd => Box::new(ZstdCodec),
    }
}
