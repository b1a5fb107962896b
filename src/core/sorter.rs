//! # Priority sorters.
//!
//! A sorter turns the ids of the live tasks into a priority list. It is called
//! by the coordinator on `run` start, after every accepted add, and on
//! [`Manager::refresh_priority`](crate::Manager::refresh_priority).
//!
//! The input ids are sorted lexicographically, so a stable sorter yields a
//! deterministic order for equal keys.

use std::sync::Arc;

/// Callback computing the priority list from the live task ids.
pub type PrioritySorter = Arc<dyn Fn(&[String]) -> Vec<String> + Send + Sync>;

/// Builds a sorter ranking ids by ascending `key` (wrap the key in
/// [`std::cmp::Reverse`] for descending order). Ties keep the input order.
///
/// # Example
/// ```
/// use std::cmp::Reverse;
/// use taskrank::rank_by;
///
/// let sorter = rank_by(|id: &str| Reverse(id.len()));
/// let ids = vec!["a".to_string(), "bbb".to_string(), "cc".to_string()];
/// assert_eq!(sorter(ids.as_slice()), vec!["bbb", "cc", "a"]);
/// ```
pub fn rank_by<K, F>(key: F) -> PrioritySorter
where
    K: Ord,
    F: Fn(&str) -> K + Send + Sync + 'static,
{
    Arc::new(move |ids: &[String]| {
        let mut ranked = ids.to_vec();
        ranked.sort_by_cached_key(|id| key(id.as_str()));
        ranked
    })
}
