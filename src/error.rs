// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for the decomposition bridge
//!
//! An engine that reports a failed decomposition is not an error: `compute`
//! returns [`ComputeOutcome::Failure`](crate::session::ComputeOutcome) for that.
//! The variants here cover API misuse, bad input and engine trouble, and
//! [`DecompositionError::is_usage_error`] tells the first group apart.

use crate::batch::IndexFormat;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, DecompositionError>;

#[derive(Debug, Error)]
pub enum DecompositionError {
    /// Hull data was requested before a successful compute
    #[error("no convex hulls available")]
    NoConvexHulls,

    #[error("hull index {index} is out of range, the session holds {count} convex hulls")]
    IndexOutOfRange { index: usize, count: u32 },

    /// A session supports exactly one compute call
    #[error("compute was already invoked on this session")]
    AlreadyComputed,

    #[error("a compute is still in flight on this session")]
    ComputeInProgress,

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// The engine instance could not be created
    #[error("failed to create decomposition engine: {0}")]
    EngineCreation(String),

    #[error("decomposition engine error: {0}")]
    Engine(String),

    #[error("convex hull {index} is malformed: {reason}")]
    MalformedHull { index: usize, reason: String },

    #[error("convex hull {index} has {vertex_count} vertices, the configured limit is {limit}")]
    VertexLimitExceeded {
        index: usize,
        vertex_count: usize,
        limit: u32,
    },

    #[error("{vertex_count} vertices cannot be addressed with {format:?} indices")]
    IndexOverflow {
        vertex_count: usize,
        format: IndexFormat,
    },

    /// The compute worker exited without reporting a result
    #[error("compute worker terminated before reporting a result")]
    WorkerLost,

    #[error("engine state is poisoned by a panic in a previous call")]
    Poisoned,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DecompositionError {
    /// True when the error comes from using the API in the wrong state or
    /// with a bad index, as opposed to input or engine problems.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::NoConvexHulls
                | Self::IndexOutOfRange { .. }
                | Self::AlreadyComputed
                | Self::ComputeInProgress
        )
    }

    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
