//! Caller-side scoped ownership of a packed label buffer.

use core::ffi::c_char;
use std::ffi::{CStr, CString};
use std::ptr::NonNull;

use super::exports::{regionjoin_classify, regionjoin_last_error, regionjoin_release, RawPoint};
use super::pack::{unpack_labels, TransportError};
use crate::models::{GeoPoint, RegionSpec};

/// A buffer returned by `regionjoin_classify`, released exactly once on drop.
#[derive(Debug)]
pub struct PackedLabels {
    ptr: NonNull<c_char>,
    count: usize,
    skipped: usize,
}

impl PackedLabels {
    /// Take ownership of a buffer returned by `regionjoin_classify`.
    ///
    /// # Safety
    /// `ptr` must come from `regionjoin_classify` and must not be released
    /// anywhere else.
    pub unsafe fn from_raw(ptr: *mut c_char, count: usize, skipped: usize) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self {
            ptr,
            count,
            skipped,
        })
    }

    /// Run a classification through the C ABI.
    pub fn classify(
        points: &[GeoPoint],
        regions: &[RegionSpec],
        workers: usize,
    ) -> Result<Self, TransportError> {
        let raw: Vec<RawPoint> = points
            .iter()
            .map(|p| RawPoint {
                lat: p.lat,
                lon: p.lon,
            })
            .collect();
        let wkts = c_strings(regions.iter().map(|r| r.wkt.as_str()))?;
        let names = c_strings(regions.iter().map(|r| r.name.as_str()))?;
        let wkt_ptrs: Vec<*const c_char> = wkts.iter().map(|s| s.as_ptr()).collect();
        let name_ptrs: Vec<*const c_char> = names.iter().map(|s| s.as_ptr()).collect();

        let mut count = 0usize;
        let mut skipped = 0usize;
        // SAFETY: every pointer refers to a live local buffer of the stated length
        let ptr = unsafe {
            regionjoin_classify(
                raw.as_ptr(),
                raw.len(),
                wkt_ptrs.as_ptr(),
                name_ptrs.as_ptr(),
                regions.len(),
                workers,
                &mut count,
                &mut skipped,
            )
        };

        // SAFETY: `ptr` was just returned by `regionjoin_classify`
        match unsafe { Self::from_raw(ptr, count, skipped) } {
            Some(packed) => Ok(packed),
            None => Err(TransportError::Failed(last_error())),
        }
    }

    pub fn as_c_str(&self) -> &CStr {
        // SAFETY: the buffer stays alive and unmodified until drop
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Copy the labels out of the buffer, checking them against `count`.
    pub fn to_labels(&self) -> Result<Vec<String>, TransportError> {
        let text = self
            .as_c_str()
            .to_str()
            .map_err(|_| TransportError::InvalidUtf8 {
                what: "label buffer",
                index: 0,
            })?;
        unpack_labels(text, self.count)
    }
}

impl Drop for PackedLabels {
    fn drop(&mut self) {
        // SAFETY: owned pointer from `regionjoin_classify`, released only here
        unsafe { regionjoin_release(self.ptr.as_ptr()) }
    }
}

fn c_strings<'a>(items: impl Iterator<Item = &'a str>) -> Result<Vec<CString>, TransportError> {
    items
        .enumerate()
        .map(|(index, s)| CString::new(s).map_err(|_| TransportError::NulInLabel { index }))
        .collect()
}

fn last_error() -> String {
    let mut buf = vec![0u8; 1024];
    // SAFETY: `buf` is writable for its full length
    let n = unsafe { regionjoin_last_error(buf.as_mut_ptr() as *mut c_char, buf.len()) };
    buf.truncate(n);
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pip::OUTSIDE_LABEL;

    fn regions() -> Vec<RegionSpec> {
        vec![
            RegionSpec::new(
                "Lima",
                "POLYGON((-77.5 -11.5, -76.5 -11.5, -76.5 -12.5, -77.5 -12.5, -77.5 -11.5))",
            ),
            RegionSpec::new(
                "Arequipa",
                "POLYGON((-72.0 -16.0, -71.0 -16.0, -71.0 -17.0, -72.0 -17.0, -72.0 -16.0))",
            ),
        ]
    }

    #[test]
    fn test_classify_through_c_abi() {
        let points = [
            GeoPoint::new(-12.0464, -77.0428),
            GeoPoint::new(-16.4090, -71.5375),
            GeoPoint::new(4.7110, -74.0721),
        ];
        let packed = PackedLabels::classify(&points, &regions(), 2).unwrap();
        assert_eq!(packed.count(), 3);
        assert_eq!(packed.skipped(), 0);
        assert_eq!(packed.to_labels().unwrap(), ["Lima", "Arequipa", OUTSIDE_LABEL]);
    }

    #[test]
    fn test_empty_batch_through_c_abi() {
        let packed = PackedLabels::classify(&[], &regions(), 0).unwrap();
        assert_eq!(packed.count(), 0);
        assert!(packed.to_labels().unwrap().is_empty());
    }

    #[test]
    fn test_skipped_region_reported() {
        let mut regions = regions();
        regions.insert(0, RegionSpec::new("Roto", "POLYGON((1 1))"));
        let packed =
            PackedLabels::classify(&[GeoPoint::new(-12.0, -77.0)], &regions, 1).unwrap();
        assert_eq!(packed.skipped(), 1);
        assert_eq!(packed.to_labels().unwrap(), ["Lima"]);
    }

    #[test]
    fn test_unpackable_name_sets_last_error() {
        let regions = vec![RegionSpec::new(
            "Lima|Callao",
            "POLYGON((0 0, 0 10, 10 10, 10 0))",
        )];
        let err = PackedLabels::classify(&[GeoPoint::new(5.0, 5.0)], &regions, 1).unwrap_err();
        assert!(err.to_string().contains("cannot be packed"));
    }

    #[test]
    fn test_null_inputs_are_rejected() {
        let mut count = 7usize;
        // SAFETY: null pointers with non-zero lengths are rejected before any read
        let ptr = unsafe {
            regionjoin_classify(
                std::ptr::null(),
                3,
                std::ptr::null(),
                std::ptr::null(),
                0,
                1,
                &mut count,
                std::ptr::null_mut(),
            )
        };
        assert!(ptr.is_null());
        assert_eq!(count, 0);
        assert!(last_error().contains("points"));

        // SAFETY: NULL is ignored
        unsafe { regionjoin_release(std::ptr::null_mut()) };
    }

    #[test]
    fn test_count_disagreeing_with_buffer_is_an_error() {
        let packed = PackedLabels::classify(&[GeoPoint::new(-12.0, -77.0)], &regions(), 1).unwrap();
        let text = packed.as_c_str().to_owned();
        // Re-wrap the same labels under a wrong count
        // SAFETY: `into_raw` hands over a CString this test owns; the guard
        // releases it through `regionjoin_release`, which is `CString::from_raw`
        let wrong = unsafe { PackedLabels::from_raw(text.into_raw(), 2, 0) }.unwrap();
        assert!(matches!(
            wrong.to_labels(),
            Err(TransportError::CountMismatch {
                expected: 2,
                found: 1
            })
        ));
    }
}
