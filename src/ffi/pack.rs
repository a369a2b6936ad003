//! Delimiter packing of labels into a single C string.

use std::ffi::CString;

use thiserror::Error;

use crate::error::ClassifyError;

/// Separator between labels in a packed buffer
pub const LABEL_DELIMITER: &str = "|||";

/// Errors at the foreign-function boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Labels may not contain `|` at all, otherwise a name ending or starting
    /// with `|` would split ambiguously next to the delimiter.
    #[error("label {index} ({label:?}) contains '|' and cannot be packed")]
    DelimiterInLabel { index: usize, label: String },
    #[error("label {index} contains a NUL byte and cannot be packed")]
    NulInLabel { index: usize },
    #[error("null pointer passed for {0}")]
    NullPointer(&'static str),
    #[error("{what} #{index} is not valid UTF-8")]
    InvalidUtf8 { what: &'static str, index: usize },
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    /// Failure reported across the C ABI, carrying `regionjoin_last_error`
    #[error("classification failed: {0}")]
    Failed(String),
    #[error("packed buffer holds {found} label(s), expected {expected}")]
    CountMismatch { expected: usize, found: usize },
}

/// Join labels with `LABEL_DELIMITER` into one NUL-terminated buffer.
pub fn pack_labels<S: AsRef<str>>(labels: &[S]) -> Result<CString, TransportError> {
    let mut packed = String::with_capacity(labels.iter().map(|l| l.as_ref().len() + 3).sum());
    for (index, label) in labels.iter().enumerate() {
        let label = label.as_ref();
        if label.contains('|') {
            return Err(TransportError::DelimiterInLabel {
                index,
                label: label.to_string(),
            });
        }
        if index > 0 {
            packed.push_str(LABEL_DELIMITER);
        }
        packed.push_str(label);
    }
    CString::new(packed).map_err(|e| TransportError::NulInLabel {
        index: packed_index_of(labels, e.nul_position()),
    })
}

fn packed_index_of<S: AsRef<str>>(labels: &[S], byte: usize) -> usize {
    let mut end = 0;
    for (index, label) in labels.iter().enumerate() {
        end += label.as_ref().len();
        if byte < end {
            return index;
        }
        end += LABEL_DELIMITER.len();
    }
    labels.len().saturating_sub(1)
}

/// Split a packed buffer holding `count` labels.
///
/// An empty buffer is zero labels when `count` is 0 and one empty label
/// otherwise. Any other disagreement with `count` is an error.
pub fn unpack_labels(packed: &str, count: usize) -> Result<Vec<String>, TransportError> {
    if count == 0 && packed.is_empty() {
        return Ok(Vec::new());
    }
    let labels: Vec<String> = packed.split(LABEL_DELIMITER).map(str::to_string).collect();
    if labels.len() != count {
        return Err(TransportError::CountMismatch {
            expected: count,
            found: labels.len(),
        });
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_and_unpack() {
        let labels = ["Lima", "Fuera de Perú", "Arequipa"];
        let packed = pack_labels(&labels).unwrap();
        assert_eq!(packed.to_str().unwrap(), "Lima|||Fuera de Perú|||Arequipa");
        assert_eq!(unpack_labels(packed.to_str().unwrap(), 3).unwrap(), labels);
    }

    #[test]
    fn test_empty_batch_and_empty_label() {
        let none: [&str; 0] = [];
        let packed = pack_labels(&none).unwrap();
        assert!(unpack_labels(packed.to_str().unwrap(), 0).unwrap().is_empty());

        let packed = pack_labels(&[""]).unwrap();
        assert_eq!(unpack_labels(packed.to_str().unwrap(), 1).unwrap(), [""]);
    }

    #[test]
    fn test_pipe_in_label_rejected() {
        let err = pack_labels(&["Lima", "Tacna|"]).unwrap_err();
        assert!(matches!(err, TransportError::DelimiterInLabel { index: 1, .. }));
    }

    #[test]
    fn test_nul_in_label_rejected() {
        let err = pack_labels(&["Lima", "Pu\0no"]).unwrap_err();
        assert!(matches!(err, TransportError::NulInLabel { index: 1 }));
    }

    #[test]
    fn test_unpack_rejects_wrong_count() {
        let err = unpack_labels("Lima|||Ica", 3).unwrap_err();
        assert!(matches!(
            err,
            TransportError::CountMismatch {
                expected: 3,
                found: 2
            }
        ));

        let err = unpack_labels("Lima", 0).unwrap_err();
        assert!(matches!(err, TransportError::CountMismatch { expected: 0, found: 1 }));

        let err = unpack_labels("", 2).unwrap_err();
        assert!(matches!(err, TransportError::CountMismatch { expected: 2, found: 1 }));
    }
}
