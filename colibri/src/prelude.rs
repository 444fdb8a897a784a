// SPDX-License-Identifier: BSD-3-Clause

//! The prelude.

pub use crate::error::{Error, Result};
pub use crate::word::Word;
pub use crate::{GcGuard, Heap, Threading};
