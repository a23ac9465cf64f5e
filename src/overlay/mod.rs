//! Overlay Module
//!
//! Two-layer key lookup: a mutable working set over a read-only default set.
//!
//! ## Lookup Order
//! ```text
//! get(key) ──► working set ──hit──► value (ValueSource::Stored)
//!                  │miss
//!                  ▼
//!              default set ──hit──► value (ValueSource::Default)
//!                  │miss
//!                  ▼
//!             KeyNotFound
//! ```
//!
//! Writes and removals only ever touch the working set. The default set is
//! fixed at open.

mod table;

pub use table::Overlay;

/// Layer a value was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Explicitly set in the working set
    Stored,

    /// Fallback from the default set
    Default,
}
