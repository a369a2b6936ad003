//! C ABI for callers in another runtime.
//!
//! Ownership contract: a non-null buffer returned by `regionjoin_classify`
//! belongs to this library. The caller copies what it needs out of it, then
//! calls `regionjoin_release` exactly once on it. The buffer must not be read
//! after release and must never be freed with `free()` or any other
//! allocator.

use core::ffi::c_char;
use std::cell::RefCell;
use std::ffi::{CStr, CString};

use super::pack::{pack_labels, TransportError};
use crate::config::EngineConfig;
use crate::models::{GeoPoint, RegionSpec};
use crate::pip::PipService;

/// Point layout shared with C callers
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPoint {
    pub lat: f64,
    pub lon: f64,
}

impl From<RawPoint> for GeoPoint {
    fn from(p: RawPoint) -> Self {
        GeoPoint::new(p.lat, p.lon)
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_last_error(msg: String) {
    tracing::warn!("regionjoin_classify failed: {}", msg);
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(msg));
}

fn take_last_error() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow_mut().take())
}

/// Copy a C string array into owned Rust strings.
///
/// # Safety
/// `ptr` must point to `len` valid NUL-terminated strings.
unsafe fn read_strings(
    ptr: *const *const c_char,
    len: usize,
    what: &'static str,
) -> Result<Vec<String>, TransportError> {
    if len == 0 {
        return Ok(Vec::new());
    }
    if ptr.is_null() {
        return Err(TransportError::NullPointer(what));
    }
    let items = std::slice::from_raw_parts(ptr, len);
    items
        .iter()
        .enumerate()
        .map(|(index, &s)| {
            if s.is_null() {
                return Err(TransportError::NullPointer(what));
            }
            CStr::from_ptr(s)
                .to_str()
                .map(str::to_string)
                .map_err(|_| TransportError::InvalidUtf8 { what, index })
        })
        .collect()
}

/// # Safety
/// Same requirements as `regionjoin_classify`.
unsafe fn classify_raw(
    points: *const RawPoint,
    num_points: usize,
    wkts: *const *const c_char,
    names: *const *const c_char,
    num_regions: usize,
    workers: usize,
) -> Result<(CString, usize, usize), TransportError> {
    let points: Vec<GeoPoint> = if num_points == 0 {
        Vec::new()
    } else if points.is_null() {
        return Err(TransportError::NullPointer("points"));
    } else {
        std::slice::from_raw_parts(points, num_points)
            .iter()
            .map(|&p| GeoPoint::from(p))
            .collect()
    };

    let wkts = read_strings(wkts, num_regions, "wkt")?;
    let names = read_strings(names, num_regions, "name")?;
    let regions: Vec<RegionSpec> = names
        .into_iter()
        .zip(wkts)
        .map(|(name, wkt)| RegionSpec { name, wkt })
        .collect();

    let mut config = EngineConfig::default();
    if workers > 0 {
        config = config.with_workers(workers);
    }

    let result = PipService::new(config).classify(&points, &regions)?;
    let packed = pack_labels(result.labels())?;
    Ok((packed, result.len(), result.skipped().len()))
}

/// Classify `num_points` points against `num_regions` WKT regions.
///
/// Returns a packed, NUL-terminated buffer of `|||`-separated labels and
/// writes the label count to `out_count` and the number of malformed regions
/// skipped to `out_skipped` (both optional). `workers == 0` uses every
/// available core. Returns NULL on failure; the message is available from
/// `regionjoin_last_error`.
///
/// # Safety
/// * `points` must point to `num_points` readable `RawPoint`s (may be NULL
///   when `num_points == 0`)
/// * `wkts` and `names` must each point to `num_regions` NUL-terminated
///   strings
/// * `out_count` and `out_skipped` must be NULL or writable
/// * A non-null result must be passed to `regionjoin_release` exactly once
#[no_mangle]
pub unsafe extern "C" fn regionjoin_classify(
    points: *const RawPoint,
    num_points: usize,
    wkts: *const *const c_char,
    names: *const *const c_char,
    num_regions: usize,
    workers: usize,
    out_count: *mut usize,
    out_skipped: *mut usize,
) -> *mut c_char {
    if !out_count.is_null() {
        *out_count = 0;
    }
    if !out_skipped.is_null() {
        *out_skipped = 0;
    }

    match classify_raw(points, num_points, wkts, names, num_regions, workers) {
        Ok((packed, count, skipped)) => {
            if !out_count.is_null() {
                *out_count = count;
            }
            if !out_skipped.is_null() {
                *out_skipped = skipped;
            }
            packed.into_raw()
        }
        Err(err) => {
            set_last_error(err.to_string());
            std::ptr::null_mut()
        }
    }
}

/// Release a buffer returned by `regionjoin_classify`. NULL is ignored.
///
/// # Safety
/// * `buffer` must be NULL or a pointer returned by `regionjoin_classify`
/// * Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn regionjoin_release(buffer: *mut c_char) {
    if buffer.is_null() {
        return;
    }
    drop(CString::from_raw(buffer));
}

/// Copy the calling thread's last error into `out` (NUL-terminated) and
/// clear it. Returns the number of bytes written, excluding the NUL.
///
/// # Safety
/// `out` must be NULL or writable for `out_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn regionjoin_last_error(out: *mut c_char, out_len: usize) -> usize {
    if out.is_null() || out_len == 0 {
        return 0;
    }
    let msg = take_last_error().unwrap_or_default();
    let bytes = msg.as_bytes();
    let n = bytes.len().min(out_len - 1);
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), out as *mut u8, n);
    *out.add(n) = 0;
    n
}
