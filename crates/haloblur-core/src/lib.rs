//! # Haloblur Core
//!
//! The numerical backbone of haloblur. This crate implements the pieces of a
//! depth-weighted matrix blur that can be split across a fixed set of
//! workers: every worker receives a contiguous block of rows plus the
//! `depth`-wide halo above and below it, and computes its block without
//! ever seeing the rest of the matrix.
//!
//! ## Pipeline
//!
//! ```text
//! plan ──► build_padded ──► (scatter) ──► Kernel::apply ──► (gather) ──► assemble
//! ```
//!
//! Scatter and gather are transport concerns and live in `haloblur-compute`;
//! everything here is pure and allocation-bounded by `N` and `depth`.
//!
//! ## Modules
//!
//! - [`types`]: Run parameters, weighting modes, geometry errors.
//! - [`padding`]: Zero-bordered embedding of the input matrix.
//! - [`partition`]: Row-block planning and displacement tables.
//! - [`kernel`]: Chebyshev-ring weighted neighbourhood sum.
//! - [`assemble`]: Placement of gathered blocks and integer rounding.

pub mod assemble;
pub mod kernel;
pub mod padding;
pub mod partition;
pub mod types;

pub use assemble::{assemble, round_matrix, GatheredBlock};
pub use kernel::{weighted_sum, Kernel};
pub use padding::{build_padded, PaddedMatrix};
pub use partition::{plan, DisplacementTable, PartitionError, PartitionPlan, RowBlock};
pub use types::{clamp_depth, BlurParams, GeometryError, Weighting};
