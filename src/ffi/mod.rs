//! FFI Module
//!
//! Native boundary for non-Rust callers.
//!
//! ## Components
//! - `buffer`: flat, length-prefixed encoding of value trees
//! - `exports`: `extern "C"` functions over an opaque store handle
//!
//! ## Ownership Rules
//! ```text
//!  caller                          library
//!  ──────                          ───────
//!  (ptr, len) inputs  ──borrow──►  read during the call only
//!  *mut Kvs handle    ◄──owned───  kvs_open  ... kvs_close
//!  KvsBuffer outputs  ◄──owned───  any getter ... kvs_buffer_free
//! ```
//!
//! Values cross the boundary as one flat buffer, never as a pointer graph,
//! so a single free routine covers every output.

pub mod buffer;
pub mod exports;

pub use buffer::{decode_value, encode_value, MAX_DEPTH};
pub use exports::{
    KvsBuffer, KvsStatus, KVS_INVALID_ARGUMENT, KVS_INVALID_HANDLE, KVS_OK,
};
