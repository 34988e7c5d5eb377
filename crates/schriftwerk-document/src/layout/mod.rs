// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout module — pixel-space to page-margin mapping and word placement.

pub mod mapper;
pub mod reconstruct;

pub use mapper::CoordinateMapper;
pub use reconstruct::{PageReconstructor, ReconstructionOutcome, ReconstructionStats};
