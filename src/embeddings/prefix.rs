// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Instruction prefixing for E5-style models
//!
//! E5 checkpoints were trained with task-conditioning prefixes, so a query
//! and a passage with the same text must be embedded differently.

use serde::{Deserialize, Serialize};

/// Prefix used for search queries under the e5 policy
pub const QUERY_PREFIX: &str = "query: ";

/// Prefix used for indexed passages under the e5 policy
pub const PASSAGE_PREFIX: &str = "passage: ";

/// Role of the texts being embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Query,
    #[default]
    Passage,
}

impl Mode {
    pub fn prefix(&self) -> &'static str {
        match self {
            Mode::Query => QUERY_PREFIX,
            Mode::Passage => PASSAGE_PREFIX,
        }
    }
}

/// Whether texts get an instruction prefix before inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionPolicy {
    /// Texts pass through unchanged
    None,
    /// Texts get `"query: "` or `"passage: "` depending on [`Mode`]
    #[default]
    E5,
}

/// Applies the instruction policy to a batch, preserving order
pub fn apply_instruction(texts: &[String], mode: Mode, instruction: InstructionPolicy) -> Vec<String> {
    match instruction {
        InstructionPolicy::None => texts.to_vec(),
        InstructionPolicy::E5 => {
            let prefix = mode.prefix();
            texts
                .iter()
                .map(|text| format!("{}{}", prefix, text))
                .collect()
        }
    }
}
