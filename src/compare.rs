use std::fmt;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use json_array_stream::{ArrayStreamReader, StreamError};
use thiserror::Error;

use crate::canonical::canonical_bytes;
use crate::fingerprint::fingerprint;
use crate::shred::ShredCounter;

/// Which of the two input streams an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSide {
    Left,
    Right,
}

impl fmt::Display for StreamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSide::Left => f.write_str("left"),
            StreamSide::Right => f.write_str("right"),
        }
    }
}

/// A comparison failed before a verdict could be derived.
#[derive(Debug, Error)]
#[error("{side} input: {source}")]
pub struct CompareError {
    pub side: StreamSide,
    #[source]
    pub source: StreamError,
}

/// Outcome of a successful comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Both documents contain the same multiset of elements.
    Identical,
    /// The documents differ. `mismatch_count` is the number of distinct
    /// fingerprints with a nonzero residual count, not the number of
    /// differing elements.
    Different { mismatch_count: usize },
}

/// Compares two JSON array documents as multisets of canonical elements.
///
/// Both streams are consumed concurrently, one element at a time, against a
/// shared [`ShredCounter`]: the left stream increases each element's
/// fingerprint count and the right stream decreases it. Top-level element
/// order therefore never affects the verdict. When a stream fails, the other
/// one is told to stop at its next element boundary and the failure is
/// reported instead of a verdict; when both fail, the left stream's error is
/// surfaced.
pub fn compare<L, R>(left: L, right: R) -> Result<Verdict, CompareError>
where
    L: Read + Send,
    R: Read + Send,
{
    let counter = ShredCounter::new();
    let stop = AtomicBool::new(false);

    let (left_result, right_result) = thread::scope(|scope| {
        let counter = &counter;
        let stop = &stop;
        let left_task =
            scope.spawn(move || consume_stream(left, counter, StreamSide::Left, stop));
        let right_task =
            scope.spawn(move || consume_stream(right, counter, StreamSide::Right, stop));
        (join(left_task), join(right_task))
    });

    settle(left_result, right_result, &counter)
}

/// Derives the outcome once both tasks have finished. Errors are fatal and
/// the left stream's error is preferred when both tasks report one, so the
/// choice is deterministic regardless of scheduling.
fn settle(
    left_result: Result<(), StreamError>,
    right_result: Result<(), StreamError>,
    counter: &ShredCounter,
) -> Result<Verdict, CompareError> {
    if let Err(source) = left_result {
        return Err(CompareError {
            side: StreamSide::Left,
            source,
        });
    }
    if let Err(source) = right_result {
        return Err(CompareError {
            side: StreamSide::Right,
            source,
        });
    }

    if counter.is_empty() {
        Ok(Verdict::Identical)
    } else {
        Ok(Verdict::Different {
            mismatch_count: counter.size(),
        })
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

fn consume_stream<R: Read>(
    input: R,
    counter: &ShredCounter,
    side: StreamSide,
    stop: &AtomicBool,
) -> Result<(), StreamError> {
    let mut reader = ArrayStreamReader::from_reader(input);
    let mut elements = 0u64;
    loop {
        if stop.load(Ordering::Relaxed) {
            // The peer failed; our partial updates will be ignored.
            log::debug!("{side} stream stopped early after {elements} elements");
            return Ok(());
        }
        match reader.next_element() {
            Ok(Some(element)) => {
                let fingerprint = fingerprint(&canonical_bytes(&element));
                match side {
                    StreamSide::Left => counter.increase(fingerprint),
                    StreamSide::Right => counter.decrease(fingerprint),
                }
                elements += 1;
            }
            Ok(None) => {
                log::debug!("{side} stream done after {elements} elements");
                return Ok(());
            }
            Err(err) => {
                stop.store(true, Ordering::Relaxed);
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn compare_strs(left: &str, right: &str) -> Result<Verdict, CompareError> {
        compare(left.as_bytes(), right.as_bytes())
    }

    #[test]
    fn test_empty_arrays_are_identical() {
        assert_eq!(compare_strs("[]", "[]").unwrap(), Verdict::Identical);
    }

    #[test]
    fn test_top_level_order_is_ignored() {
        assert_eq!(
            compare_strs(r#"[{"a": 1}, "x"]"#, r#"["x", {"a": 1}]"#).unwrap(),
            Verdict::Identical
        );
    }

    #[test]
    fn test_whitespace_is_irrelevant() {
        assert_eq!(
            compare_strs("[1,2]", " [ 2 ,\n  1 ]\n").unwrap(),
            Verdict::Identical
        );
    }

    #[test]
    fn test_object_key_order_is_ignored() {
        assert_eq!(
            compare_strs(r#"[{"a": 1, "b": 2}]"#, r#"[{"b": 2, "a": 1}]"#).unwrap(),
            Verdict::Identical
        );
    }

    #[test]
    fn test_nested_array_order_matters() {
        assert_eq!(
            compare_strs("[[1, 2]]", "[[2, 1]]").unwrap(),
            Verdict::Different { mismatch_count: 2 }
        );
    }

    #[test]
    fn test_duplicates_are_counted() {
        assert_eq!(
            compare_strs(r#"[{"a": 1}, {"a": 1}]"#, r#"[{"a": 1}]"#).unwrap(),
            Verdict::Different { mismatch_count: 1 }
        );
    }

    #[test]
    fn test_number_and_string_are_distinct() {
        assert_eq!(
            compare_strs("[1]", r#"["1"]"#).unwrap(),
            Verdict::Different { mismatch_count: 2 }
        );
    }

    #[test]
    fn test_float_representations_normalize() {
        assert_eq!(
            compare_strs("[1.0]", "[1e0]").unwrap(),
            Verdict::Identical
        );
        assert_eq!(
            compare_strs("[1.0]", "[1.00]").unwrap(),
            Verdict::Identical
        );
    }

    #[test]
    fn test_integer_and_float_are_distinct() {
        assert_eq!(
            compare_strs("[1]", "[1.0]").unwrap(),
            Verdict::Different { mismatch_count: 2 }
        );
    }

    #[test]
    fn test_error_reports_the_failing_side() {
        let err = compare_strs("[]", "[oops]").unwrap_err();
        assert_eq!(err.side, StreamSide::Right);
        assert!(matches!(err.source, StreamError::MalformedElement { .. }));

        let err = compare_strs("{", "[]").unwrap_err();
        assert_eq!(err.side, StreamSide::Left);
    }

    #[test]
    fn test_left_error_wins_when_both_streams_fail() {
        // Exercised on `settle` directly: with cancellation in play, one of
        // two racing end-to-end failures may be suppressed.
        let counter = ShredCounter::new();
        let left = Err(StreamError::MalformedStructure {
            msg: "left".into(),
            location: Default::default(),
        });
        let right = Err(StreamError::MalformedStructure {
            msg: "right".into(),
            location: Default::default(),
        });
        let err = settle(left, right, &counter).unwrap_err();
        assert_eq!(err.side, StreamSide::Left);

        // An end-to-end double failure still reports an error, whichever
        // side it is attributed to.
        assert!(compare_strs("}", "}").is_err());
    }

    #[test]
    fn test_parse_failure_is_never_reported_as_a_difference() {
        // The documents differ *and* the right one is malformed; the error
        // must win over any verdict.
        let result = compare_strs(r#"[1, 2, 3]"#, "[oops");
        assert!(result.is_err());
    }

    #[test]
    fn test_larger_shuffled_documents() {
        let mut left = Vec::new();
        let mut right = Vec::new();
        for i in 0..500 {
            left.push(format!(r#"{{"id": {i}, "tag": "item"}}"#));
            right.push(format!(r#"{{"tag": "item", "id": {}}}"#, 499 - i));
        }
        let left_doc = format!("[{}]", left.join(","));
        let right_doc = format!("[{}]", right.join(","));
        assert_eq!(
            compare_strs(&left_doc, &right_doc).unwrap(),
            Verdict::Identical
        );
    }
}
