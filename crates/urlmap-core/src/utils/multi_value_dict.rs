//! A dictionary that can hold multiple values per key.
//!
//! [`MultiValueDict`] backs the reverse-name index: several URL patterns may
//! be registered under the same name, and the per-key value order decides
//! reverse-lookup precedence, so appends must preserve insertion order
//! within each key.

use std::collections::hash_map;
use std::collections::HashMap;
use std::hash::Hash;

/// A dictionary that maps keys to ordered lists of values.
///
/// [`get`](MultiValueDict::get) returns the **last** value appended for a
/// key, while [`get_list`](MultiValueDict::get_list) returns all of them in
/// append order.
///
/// # Examples
///
/// ```
/// use urlmap_core::utils::MultiValueDict;
///
/// let mut d = MultiValueDict::new();
/// d.append("name-conflict".to_string(), "first-pattern");
/// d.append("name-conflict".to_string(), "last-pattern");
///
/// assert_eq!(d.get(&"name-conflict".to_string()), Some(&"last-pattern"));
/// assert_eq!(
///     d.get_list(&"name-conflict".to_string()),
///     Some(&vec!["first-pattern", "last-pattern"]),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MultiValueDict<K: Eq + Hash, V> {
    inner: HashMap<K, Vec<V>>,
}

impl<K: Eq + Hash, V> Default for MultiValueDict<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> MultiValueDict<K, V> {
    /// Creates an empty `MultiValueDict`.
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Returns a reference to the **last** value associated with the key,
    /// or `None` if the key is not present.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key).and_then(|v| v.last())
    }

    /// Returns a reference to all values associated with the key in append
    /// order, or `None` if the key is not present.
    pub fn get_list(&self, key: &K) -> Option<&Vec<V>> {
        self.inner.get(key)
    }

    /// Sets the value for a key, replacing any existing values.
    pub fn set(&mut self, key: K, value: V) {
        self.inner.insert(key, vec![value]);
    }

    /// Appends a value to the list for the given key.
    pub fn append(&mut self, key: K, value: V) {
        self.inner.entry(key).or_default().push(value);
    }

    /// Appends every value in `values` to the list for the given key,
    /// preserving their order.
    pub fn append_list(&mut self, key: K, values: impl IntoIterator<Item = V>) {
        self.inner.entry(key).or_default().extend(values);
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> hash_map::Keys<'_, K, Vec<V>> {
        self.inner.keys()
    }

    /// Returns an iterator over (key, value-list) pairs.
    pub fn iter(&self) -> hash_map::Iter<'_, K, Vec<V>> {
        self.inner.iter()
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the dictionary contains no keys.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns `true` if the dictionary contains the specified key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }
}

impl<'a, K: Eq + Hash, V> IntoIterator for &'a MultiValueDict<K, V> {
    type Item = (&'a K, &'a Vec<V>);
    type IntoIter = hash_map::Iter<'a, K, Vec<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}
