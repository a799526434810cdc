//! Assertions for decoded records.

use crate::record::FakeName;

/// Assert that two record lists are equal in order and content.
///
/// # Panics
///
/// Panics if the lists differ in length or at any index; the message names the
/// first differing index and both records.
///
/// # Example
///
/// ```
/// use linepipe::testing::{assert_records_equal, sample_contacts};
///
/// let a = sample_contacts(3);
/// assert_records_equal(&a, &sample_contacts(3));
/// ```
pub fn assert_records_equal(actual: &[FakeName], expected: &[FakeName]) {
    if let Some((i, (a, e))) = actual
        .iter()
        .zip(expected)
        .enumerate()
        .find(|(_, (a, e))| a != e)
    {
        panic!("record mismatch at index {i} (id {}):\n  Expected: {e:?}\n  Actual:   {a:?}", e.id);
    }
    assert_eq!(
        actual.len(),
        expected.len(),
        "record count mismatch: expected {}, got {}",
        expected.len(),
        actual.len()
    );
}

/// Assert that two record lists hold the same records, compared by `id`.
///
/// # Panics
///
/// Panics if the lists differ after sorting by `id`.
pub fn assert_records_unordered_equal(actual: &[FakeName], expected: &[FakeName]) {
    let mut a = actual.to_vec();
    let mut e = expected.to_vec();
    a.sort_by_key(|r| r.id);
    e.sort_by_key(|r| r.id);
    assert_records_equal(&a, &e);
}

/// Assert that record ids appear in strictly increasing order.
///
/// # Panics
///
/// Panics at the first id that does not increase.
pub fn assert_ids_increasing(records: &[FakeName]) {
    for pair in records.windows(2) {
        assert!(
            pair[0].id < pair[1].id,
            "ids out of order: {} followed by {}",
            pair[0].id,
            pair[1].id
        );
    }
}
