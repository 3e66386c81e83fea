//! Cache key space.
//!
//! One blob key per category, one transient lease key per category, and a
//! single sorted set for realtime scores.

use crate::domain::posts::Category;

const NAMESPACE: &str = "vetrina";

/// Key of the serialized listing blob for `category`.
pub fn category_key(category: Category) -> String {
    format!("{NAMESPACE}:category:{category}")
}

/// Key of the refresh lease guarding `category` rebuilds.
pub fn lease_key(category: Category) -> String {
    format!("{NAMESPACE}:lease:{category}")
}

/// Key of the realtime score sorted set.
pub const REALTIME_SCORES_KEY: &str = "vetrina:scores:realtime";
