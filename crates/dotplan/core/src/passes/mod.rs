// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Planning Passes
//!
//! The three visitors run by [`crate::Planner`], in order:
//!
//! 1. [`RestrictionNormalizer`] (pre-order) rewrites restrictions into
//!    sargable and residual parts, expanding disjunctions into unions.
//! 2. [`DeviceDeterminer`] (post-order) finds the subtrees a device can
//!    evaluate.
//! 3. [`AccessPathDeterminer`] (post-order) chooses physical strategies for
//!    what stays in process.
//!
//! Each pass is idempotent. Running one twice on the same tree leaves the
//! tree as the first run did.

pub mod access_path;
pub mod device;
pub mod normalize;

pub use access_path::{AccessPathDeterminer, AccessPathStats};
pub use device::{DeviceDeterminer, DeviceStats};
pub use normalize::{NormalizationStats, RestrictionNormalizer};
