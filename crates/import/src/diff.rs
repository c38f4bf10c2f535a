use sha2::{Digest, Sha256};

/// What differs between a persisted entity and its incoming version.
///
/// `fields` covers every scalar column; `collections` lists the owned
/// collections that must be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset<C> {
    pub fields: bool,
    pub collections: Vec<C>,
}

impl<C> Default for Changeset<C> {
    fn default() -> Self {
        Self {
            fields: false,
            collections: Vec::new(),
        }
    }
}

impl<C> Changeset<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        !self.fields && self.collections.is_empty()
    }

    pub fn field_if(&mut self, differs: bool) {
        self.fields |= differs;
    }

    pub fn collection_if(&mut self, collection: C, differs: bool) {
        if differs {
            self.collections.push(collection);
        }
    }
}

/// Same length and element-wise equal in order.
pub fn ordered_eq<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a == b
}

/// Equal as multisets.
pub fn unordered_eq<T: Ord>(a: &[T], b: &[T]) -> bool {
    unordered_eq_by(a, b, |item| item)
}

/// Equal as multisets of `key(item)`.
pub fn unordered_eq_by<'a, T, K, F>(a: &'a [T], b: &'a [T], key: F) -> bool
where
    K: Ord,
    F: Fn(&'a T) -> K,
{
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<K> = a.iter().map(&key).collect();
    let mut right: Vec<K> = b.iter().map(&key).collect();
    left.sort();
    right.sort();
    left == right
}

/// Content fingerprint of an encoded record: `sha256:<hex>`.
pub fn fingerprint(encoded: &str) -> String {
    let digest = Sha256::digest(encoded.as_bytes());
    format!("sha256:{:x}", digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_eq_is_order_sensitive() {
        assert!(ordered_eq(&[1, 2, 3], &[1, 2, 3]));
        assert!(!ordered_eq(&[1, 2, 3], &[3, 2, 1]));
        assert!(!ordered_eq(&[1, 2], &[1, 2, 2]));
    }

    #[test]
    fn unordered_eq_counts_repeats() {
        assert!(unordered_eq(&["a", "b", "a"], &["a", "a", "b"]));
        assert!(!unordered_eq(&["a", "b", "b"], &["a", "a", "b"]));
        assert!(!unordered_eq(&["a"], &["a", "a"]));
    }

    #[test]
    fn unordered_eq_by_projects_before_comparing() {
        let a = [("x", 1), ("y", 2)];
        let b = [("y", 9), ("x", 8)];
        assert!(unordered_eq_by(&a, &b, |(name, _)| *name));
        assert!(!unordered_eq(&a, &b));
    }

    #[test]
    fn changeset_starts_empty() {
        let mut changes: Changeset<&str> = Changeset::new();
        assert!(changes.is_empty());
        changes.collection_if("actions", false);
        assert!(changes.is_empty());
        changes.collection_if("sources", true);
        assert_eq!(changes.collections, vec!["sources"]);
        assert!(!changes.is_empty());
    }

    #[test]
    fn fingerprint_is_sha256_hex() {
        let fp = fingerprint("{}");
        assert_eq!(fp, "sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a");
        assert_ne!(fingerprint(r#"{"a":1}"#), fp);
    }
}
