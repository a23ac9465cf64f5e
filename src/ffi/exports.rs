//! C ABI exports
//!
//! Every function returns a `KvsStatus`: `KVS_OK` on success, one of the
//! boundary codes for a bad handle or argument, otherwise the `ErrorCode`
//! discriminant of the failure. Panics are caught here and reported as
//! `UnmappedError`.

#![allow(unsafe_code)]

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::{ptr, slice};

use tracing::error;

use crate::config::{Config, OpenNeedDefaults, OpenNeedKvs};
use crate::error::{ErrorCode, KvsError, Result};
use crate::kvs::Kvs;
use crate::storage::{InstanceId, SnapshotId};
use crate::value::KvsValue;

use super::buffer::{decode_value, encode_value};

/// Status returned by every exported function
pub type KvsStatus = i32;

pub const KVS_OK: KvsStatus = 100;
pub const KVS_INVALID_HANDLE: KvsStatus = 101;
pub const KVS_INVALID_ARGUMENT: KvsStatus = 102;

/// Byte buffer owned by the library
///
/// Release with `kvs_buffer_free` exactly once.
#[repr(C)]
#[derive(Debug)]
pub struct KvsBuffer {
    pub ptr: *mut u8,
    pub len: usize,
}

impl KvsBuffer {
    pub const fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
        }
    }

    fn from_vec(data: Vec<u8>) -> Self {
        let boxed = data.into_boxed_slice();
        let len = boxed.len();
        let ptr = Box::into_raw(boxed) as *mut u8;
        Self { ptr, len }
    }

    /// View the contents
    ///
    /// # Safety
    /// The buffer must come from this library and not have been freed.
    pub unsafe fn as_slice(&self) -> &[u8] {
        if self.ptr.is_null() {
            &[]
        } else {
            slice::from_raw_parts(self.ptr, self.len)
        }
    }
}

impl Default for KvsBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

// =============================================================================
// Boundary Helpers
// =============================================================================

fn guarded<F>(f: F) -> KvsStatus
where
    F: FnOnce() -> KvsStatus,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(_) => {
            error!("Panic caught at native boundary");
            ErrorCode::UnmappedError as KvsStatus
        }
    }
}

fn status_of(result: Result<()>) -> KvsStatus {
    match result {
        Ok(()) => KVS_OK,
        Err(e) => e.code() as KvsStatus,
    }
}

/// Borrow a UTF-8 string argument; a null pointer is only valid with length 0
unsafe fn str_arg<'a>(ptr: *const u8, len: usize) -> Option<&'a str> {
    if ptr.is_null() {
        return (len == 0).then_some("");
    }
    std::str::from_utf8(slice::from_raw_parts(ptr, len)).ok()
}

unsafe fn bytes_arg<'a>(ptr: *const u8, len: usize) -> Option<&'a [u8]> {
    if ptr.is_null() {
        return (len == 0).then_some(&[][..]);
    }
    Some(slice::from_raw_parts(ptr, len))
}

fn need_flag(flag: u32) -> Option<bool> {
    match flag {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

/// Encode and hand out a value, or report the failure
unsafe fn emit_value(result: Result<KvsValue>, out: *mut KvsBuffer) -> KvsStatus {
    status_of(result.and_then(|value| {
        let encoded = encode_value(&value)?;
        *out = KvsBuffer::from_vec(encoded.to_vec());
        Ok(())
    }))
}

unsafe fn emit_path(result: Result<std::path::PathBuf>, out: *mut KvsBuffer) -> KvsStatus {
    status_of(result.and_then(|path| {
        let text = path_text(&path)?;
        *out = KvsBuffer::from_vec(text.as_bytes().to_vec());
        Ok(())
    }))
}

fn path_text(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| KvsError::ConversionFailed(format!("non UTF-8 path: {}", path.display())))
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Open a store and hand back an owned handle
///
/// `need_defaults` and `need_kvs` are 0 (optional) or 1 (required).
///
/// # Safety
/// String arguments must point to `len` readable bytes. `out_handle` must be
/// writable. The returned handle must be released with `kvs_close`.
#[no_mangle]
pub unsafe extern "C" fn kvs_open(
    dir_ptr: *const u8,
    dir_len: usize,
    process_ptr: *const u8,
    process_len: usize,
    instance_id: usize,
    need_defaults: u32,
    need_kvs: u32,
    out_handle: *mut *mut Kvs,
) -> KvsStatus {
    guarded(|| {
        if out_handle.is_null() {
            return KVS_INVALID_HANDLE;
        }
        let (Some(dir), Some(process_name)) =
            (str_arg(dir_ptr, dir_len), str_arg(process_ptr, process_len))
        else {
            return KVS_INVALID_ARGUMENT;
        };
        let (Some(need_defaults), Some(need_kvs)) = (need_flag(need_defaults), need_flag(need_kvs))
        else {
            return KVS_INVALID_ARGUMENT;
        };

        let config = Config::builder()
            .dir(dir)
            .process_name(process_name)
            .instance_id(InstanceId::new(instance_id))
            .need_defaults(OpenNeedDefaults::from(need_defaults))
            .need_kvs(OpenNeedKvs::from(need_kvs))
            .build();

        match Kvs::open(config) {
            Ok(kvs) => {
                *out_handle = Box::into_raw(Box::new(kvs));
                KVS_OK
            }
            Err(e) => e.code() as KvsStatus,
        }
    })
}

/// Release a handle, flushing first if flush-on-exit is set
///
/// # Safety
/// `handle` must come from `kvs_open` and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn kvs_close(handle: *mut Kvs) -> KvsStatus {
    guarded(|| {
        if handle.is_null() {
            return KVS_INVALID_HANDLE;
        }
        drop(Box::from_raw(handle));
        KVS_OK
    })
}

/// Release a buffer returned by any function of this library
///
/// # Safety
/// `buffer` must come from this library and not have been freed before.
#[no_mangle]
pub unsafe extern "C" fn kvs_buffer_free(buffer: KvsBuffer) {
    if buffer.ptr.is_null() {
        return;
    }
    let raw = ptr::slice_from_raw_parts_mut(buffer.ptr, buffer.len);
    drop(Box::from_raw(raw));
}

/// # Safety
/// `handle` must be a live handle from `kvs_open`.
#[no_mangle]
pub unsafe extern "C" fn kvs_set_flush_on_exit(handle: *const Kvs, flush: bool) -> KvsStatus {
    guarded(|| match handle.as_ref() {
        Some(kvs) => {
            kvs.set_flush_on_exit(flush);
            KVS_OK
        }
        None => KVS_INVALID_HANDLE,
    })
}

// =============================================================================
// Key Operations
// =============================================================================

/// # Safety
/// `handle` must be a live handle from `kvs_open`.
#[no_mangle]
pub unsafe extern "C" fn kvs_reset(handle: *const Kvs) -> KvsStatus {
    guarded(|| match handle.as_ref() {
        Some(kvs) => status_of(kvs.reset()),
        None => KVS_INVALID_HANDLE,
    })
}

/// Working-set keys as an encoded array of strings
///
/// # Safety
/// `handle` must be a live handle; `out` must be writable.
#[no_mangle]
pub unsafe extern "C" fn kvs_get_all_keys(handle: *const Kvs, out: *mut KvsBuffer) -> KvsStatus {
    guarded(|| {
        let Some(kvs) = handle.as_ref() else {
            return KVS_INVALID_HANDLE;
        };
        if out.is_null() {
            return KVS_INVALID_ARGUMENT;
        }
        let keys = kvs
            .get_all_keys()
            .map(|keys| KvsValue::Array(keys.into_iter().map(KvsValue::String).collect()));
        emit_value(keys, out)
    })
}

/// # Safety
/// `handle` must be a live handle; `key_ptr` must point to `key_len` bytes;
/// `out` must be writable.
#[no_mangle]
pub unsafe extern "C" fn kvs_key_exists(
    handle: *const Kvs,
    key_ptr: *const u8,
    key_len: usize,
    out: *mut bool,
) -> KvsStatus {
    guarded(|| {
        let Some(kvs) = handle.as_ref() else {
            return KVS_INVALID_HANDLE;
        };
        let Some(key) = str_arg(key_ptr, key_len) else {
            return KVS_INVALID_ARGUMENT;
        };
        if out.is_null() {
            return KVS_INVALID_ARGUMENT;
        }
        status_of(kvs.key_exists(key).map(|exists| *out = exists))
    })
}

/// Value of a key, with default fallback, as an encoded buffer
///
/// # Safety
/// `handle` must be a live handle; `key_ptr` must point to `key_len` bytes;
/// `out` must be writable.
#[no_mangle]
pub unsafe extern "C" fn kvs_get_value(
    handle: *const Kvs,
    key_ptr: *const u8,
    key_len: usize,
    out: *mut KvsBuffer,
) -> KvsStatus {
    guarded(|| {
        let Some(kvs) = handle.as_ref() else {
            return KVS_INVALID_HANDLE;
        };
        let Some(key) = str_arg(key_ptr, key_len) else {
            return KVS_INVALID_ARGUMENT;
        };
        if out.is_null() {
            return KVS_INVALID_ARGUMENT;
        }
        emit_value(kvs.get_value(key), out)
    })
}

/// # Safety
/// Same as `kvs_get_value`.
#[no_mangle]
pub unsafe extern "C" fn kvs_get_default_value(
    handle: *const Kvs,
    key_ptr: *const u8,
    key_len: usize,
    out: *mut KvsBuffer,
) -> KvsStatus {
    guarded(|| {
        let Some(kvs) = handle.as_ref() else {
            return KVS_INVALID_HANDLE;
        };
        let Some(key) = str_arg(key_ptr, key_len) else {
            return KVS_INVALID_ARGUMENT;
        };
        if out.is_null() {
            return KVS_INVALID_ARGUMENT;
        }
        emit_value(kvs.get_default_value(key), out)
    })
}

/// # Safety
/// Same as `kvs_key_exists`.
#[no_mangle]
pub unsafe extern "C" fn kvs_is_value_default(
    handle: *const Kvs,
    key_ptr: *const u8,
    key_len: usize,
    out: *mut bool,
) -> KvsStatus {
    guarded(|| {
        let Some(kvs) = handle.as_ref() else {
            return KVS_INVALID_HANDLE;
        };
        let Some(key) = str_arg(key_ptr, key_len) else {
            return KVS_INVALID_ARGUMENT;
        };
        if out.is_null() {
            return KVS_INVALID_ARGUMENT;
        }
        status_of(kvs.is_value_default(key).map(|is_default| *out = is_default))
    })
}

/// Store an encoded value under a key
///
/// A malformed value buffer fails with `ConversionFailed` and leaves the
/// store untouched.
///
/// # Safety
/// `handle` must be a live handle; both pointers must cover their lengths.
#[no_mangle]
pub unsafe extern "C" fn kvs_set_value(
    handle: *const Kvs,
    key_ptr: *const u8,
    key_len: usize,
    value_ptr: *const u8,
    value_len: usize,
) -> KvsStatus {
    guarded(|| {
        let Some(kvs) = handle.as_ref() else {
            return KVS_INVALID_HANDLE;
        };
        let (Some(key), Some(raw)) = (
            str_arg(key_ptr, key_len),
            bytes_arg(value_ptr, value_len),
        ) else {
            return KVS_INVALID_ARGUMENT;
        };
        status_of(decode_value(raw).and_then(|value| kvs.set_value(key, value)))
    })
}

/// # Safety
/// `handle` must be a live handle; `key_ptr` must point to `key_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn kvs_remove_key(
    handle: *const Kvs,
    key_ptr: *const u8,
    key_len: usize,
) -> KvsStatus {
    guarded(|| {
        let Some(kvs) = handle.as_ref() else {
            return KVS_INVALID_HANDLE;
        };
        let Some(key) = str_arg(key_ptr, key_len) else {
            return KVS_INVALID_ARGUMENT;
        };
        status_of(kvs.remove_key(key))
    })
}

// =============================================================================
// Snapshot Operations
// =============================================================================

/// # Safety
/// `handle` must be a live handle from `kvs_open`.
#[no_mangle]
pub unsafe extern "C" fn kvs_flush(handle: *const Kvs) -> KvsStatus {
    guarded(|| match handle.as_ref() {
        Some(kvs) => status_of(kvs.flush()),
        None => KVS_INVALID_HANDLE,
    })
}

/// # Safety
/// `handle` must be a live handle; `out` must be writable.
#[no_mangle]
pub unsafe extern "C" fn kvs_snapshot_count(handle: *const Kvs, out: *mut usize) -> KvsStatus {
    guarded(|| {
        let Some(kvs) = handle.as_ref() else {
            return KVS_INVALID_HANDLE;
        };
        if out.is_null() {
            return KVS_INVALID_ARGUMENT;
        }
        *out = kvs.snapshot_count();
        KVS_OK
    })
}

/// # Safety
/// `out` must be writable.
#[no_mangle]
pub unsafe extern "C" fn kvs_snapshot_max_count(out: *mut usize) -> KvsStatus {
    guarded(|| {
        if out.is_null() {
            return KVS_INVALID_ARGUMENT;
        }
        *out = Kvs::max_snapshot_count();
        KVS_OK
    })
}

/// # Safety
/// `handle` must be a live handle from `kvs_open`.
#[no_mangle]
pub unsafe extern "C" fn kvs_snapshot_restore(handle: *const Kvs, snapshot_id: usize) -> KvsStatus {
    guarded(|| match handle.as_ref() {
        Some(kvs) => status_of(kvs.snapshot_restore(SnapshotId::new(snapshot_id))),
        None => KVS_INVALID_HANDLE,
    })
}

/// Payload path of a generation as UTF-8 bytes
///
/// # Safety
/// `handle` must be a live handle; `out` must be writable.
#[no_mangle]
pub unsafe extern "C" fn kvs_get_kvs_filename(
    handle: *const Kvs,
    snapshot_id: usize,
    out: *mut KvsBuffer,
) -> KvsStatus {
    guarded(|| {
        let Some(kvs) = handle.as_ref() else {
            return KVS_INVALID_HANDLE;
        };
        if out.is_null() {
            return KVS_INVALID_ARGUMENT;
        }
        emit_path(kvs.get_kvs_filename(SnapshotId::new(snapshot_id)), out)
    })
}

/// Hash path of a generation as UTF-8 bytes
///
/// # Safety
/// `handle` must be a live handle; `out` must be writable.
#[no_mangle]
pub unsafe extern "C" fn kvs_get_hash_filename(
    handle: *const Kvs,
    snapshot_id: usize,
    out: *mut KvsBuffer,
) -> KvsStatus {
    guarded(|| {
        let Some(kvs) = handle.as_ref() else {
            return KVS_INVALID_HANDLE;
        };
        if out.is_null() {
            return KVS_INVALID_ARGUMENT;
        }
        emit_path(kvs.get_hash_filename(SnapshotId::new(snapshot_id)), out)
    })
}
