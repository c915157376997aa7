// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Base64 float32 vector encoding (`encoding_format: "base64"`)
//!
//! Wire format: each value as a 4-byte IEEE-754 single-precision float in
//! little-endian byte order, concatenated in index order, then standard
//! padded base64. This is what `numpy.frombuffer(base64.b64decode(s),
//! dtype="<f4")` and the OpenAI SDKs expect.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Errors decoding a base64 vector
#[derive(Error, Debug, PartialEq)]
pub enum VectorCodecError {
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),

    #[error("Decoded length {0} is not a multiple of 4 bytes")]
    InvalidLength(usize),
}

/// Encodes a vector as base64 of its little-endian f32 bytes
pub fn encode_vector(vector: &[f32]) -> String {
    let bytes: Vec<u8> = vector.iter().flat_map(|v| v.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

/// Decodes a string produced by [`encode_vector`]
pub fn decode_vector(encoded: &str) -> Result<Vec<f32>, VectorCodecError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| VectorCodecError::InvalidBase64(e.to_string()))?;

    if bytes.len() % 4 != 0 {
        return Err(VectorCodecError::InvalidLength(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
