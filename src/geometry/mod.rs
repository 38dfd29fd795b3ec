// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - host mesh representation and primitives

mod bbox;
mod mesh;
mod primitives;

pub use bbox::BoundingBox;
pub use mesh::Mesh;
pub use primitives::Primitive;
