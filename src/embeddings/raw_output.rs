// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Raw inference output and its normalization into a row matrix
//!
//! Inference backends do not agree on an output layout. Some hand back a
//! dense tensor with a shape descriptor, some a single flat vector, some a
//! list of per-item vectors (optionally wrapped in an object). [`RawOutput`]
//! names those three layouts explicitly and [`RawOutput::to_matrix`] turns
//! each of them into one `Vec<f32>` per input text.

use crate::embeddings::EmbeddingError;
use serde::{Deserialize, Serialize};

/// One row of a [`RawOutput::Rows`] output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRow {
    /// A bare numeric buffer
    Buffer(Vec<f32>),
    /// An object wrapping the buffer, e.g. `{"data": [...]}`
    Wrapped { data: Vec<f32> },
}

impl RawRow {
    fn into_vec(self) -> Vec<f32> {
        match self {
            RawRow::Buffer(data) | RawRow::Wrapped { data } => data,
        }
    }
}

/// Output of one batched inference call
///
/// The untagged serde form accepts the JSON layouts produced by common
/// embedding runtimes:
/// - `{"dims": [2, 384], "data": [...]}` (tensor)
/// - `[0.1, 0.2, ...]` (single vector)
/// - `[[...], [...]]` or `[{"data": [...]}, ...]` (rows)
///
/// Variant order matters: serde also accepts a two-element sequence as a
/// `Tensor`, so the sequence layouts are tried first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOutput {
    /// One buffer per input item
    Rows(Vec<RawRow>),
    /// One flat buffer, interpreted as exactly one row
    Vector(Vec<f32>),
    /// Dense row-major tensor with an explicit shape
    Tensor { dims: Vec<usize>, data: Vec<f32> },
}

impl RawOutput {
    /// Normalizes the output into a matrix of equal-length rows
    ///
    /// - `Tensor`: rows = `dims[0]` (1 for rank 1), width = last dim, data is
    ///   sliced row-major. `data.len()` must equal `rows * width`.
    /// - `Vector`: a single row holding the whole buffer.
    /// - `Rows`: one row per item, every row as wide as the first one.
    ///
    /// Zero-width rows, rank-0 tensors and ragged rows are rejected.
    pub fn to_matrix(self) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match self {
            RawOutput::Tensor { dims, data } => {
                let (rows, width) = match dims.as_slice() {
                    [] => {
                        return Err(EmbeddingError::UnexpectedOutputShape(
                            "tensor has rank 0".to_string(),
                        ))
                    }
                    [width] => (1, *width),
                    [rows, .., width] => (*rows, *width),
                };

                if width == 0 {
                    return Err(EmbeddingError::UnexpectedOutputShape(format!(
                        "tensor {:?} has zero-width rows",
                        dims
                    )));
                }

                if rows.checked_mul(width) != Some(data.len()) {
                    return Err(EmbeddingError::UnexpectedOutputShape(format!(
                        "tensor {:?} holds {} values, expected {} rows of {}",
                        dims,
                        data.len(),
                        rows,
                        width
                    )));
                }

                Ok(data.chunks_exact(width).map(<[f32]>::to_vec).collect())
            }
            RawOutput::Vector(data) => {
                if data.is_empty() {
                    return Err(EmbeddingError::UnexpectedOutputShape(
                        "empty vector".to_string(),
                    ));
                }
                Ok(vec![data])
            }
            RawOutput::Rows(items) => {
                let rows: Vec<Vec<f32>> = items.into_iter().map(RawRow::into_vec).collect();

                let Some(width) = rows.first().map(Vec::len) else {
                    return Ok(rows);
                };

                if width == 0 {
                    return Err(EmbeddingError::UnexpectedOutputShape(
                        "rows have zero width".to_string(),
                    ));
                }

                if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
                    return Err(EmbeddingError::UnexpectedOutputShape(format!(
                        "row {} has {} values, expected {}",
                        index,
                        row.len(),
                        width
                    )));
                }

                Ok(rows)
            }
        }
    }
}

impl From<Vec<Vec<f32>>> for RawOutput {
    fn from(rows: Vec<Vec<f32>>) -> Self {
        RawOutput::Rows(rows.into_iter().map(RawRow::Buffer).collect())
    }
}
