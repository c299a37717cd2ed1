//! First-use model checks.

use std::collections::BTreeSet;
use std::sync::Mutex;

use strato_sql_core::Table;

static CHECKED: Mutex<BTreeSet<&'static str>> = Mutex::new(BTreeSet::new());

/// Runs one-time sanity checks for a table the first time it is queried.
///
/// A table without a primary key still works for reads, but `update` and
/// `delete` by key are unavailable; warn once rather than on every call.
pub fn ensure_registered<T: Table>() {
    let mut checked = match CHECKED.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if !checked.insert(T::NAME) {
        return;
    }
    if T::PRIMARY_KEY.is_none() {
        tracing::warn!(
            target: "strato_orm",
            table = T::NAME,
            "table has no primary key; update/delete by key are unavailable"
        );
    }
}
