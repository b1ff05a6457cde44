use hashbrown::HashMap;
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt::{self, Debug};
use std::hash::{BuildHasher, Hash};
use std::ptr;
use std::sync::Arc;

/// Value-equality predicate shared by a [`SyncMultimap`] and all of its clones.
pub type Equals<V> = Arc<dyn Fn(&V, &V) -> bool + Send + Sync>;

/// Thread-safe multimap where every key maps to an ordered list of distinct values.
///
/// Whether two values are "the same" is decided by a predicate handed to the constructor,
/// so `V` does not need to implement [`PartialEq`]. Values under a key keep their insertion
/// order, and a key never exists without at least one value.
///
/// All methods take `&self`: a single reader/writer lock guards the whole table, so the map
/// can be shared between threads by reference or through an [`Arc`].
///
/// # Examples
///
/// ```
/// use sync_multimap::SyncMultimap;
///
/// let map = SyncMultimap::new(|a: &i32, b: &i32| a == b);
/// map.add("a", 1);
/// map.add("a", 2);
/// map.add("a", 1);
///
/// assert_eq!(map.get("a"), [1, 2]);
/// assert_eq!(map.len(), 1);
/// assert_eq!(map.count(), 2);
/// ```
pub struct SyncMultimap<K, V, S = RandomState> {
    pub(crate) table: RwLock<HashMap<K, Vec<V>, S>>,
    pub(crate) equals: Equals<V>,
}

impl<K, V> SyncMultimap<K, V, RandomState> {
    /// Creates an empty `SyncMultimap` which compares values with `equals`.
    #[must_use]
    pub fn new<F>(equals: F) -> Self
    where
        F: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        Self::with_hasher(equals, RandomState::new())
    }

    /// Creates an empty `SyncMultimap` with room for at least `capacity` keys.
    #[must_use]
    pub fn with_capacity<F>(capacity: usize, equals: F) -> Self
    where
        F: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        Self::with_capacity_and_hasher(capacity, equals, RandomState::new())
    }
}

impl<K, V> SyncMultimap<K, V, RandomState>
where
    V: PartialEq + 'static,
{
    /// Creates an empty `SyncMultimap` which compares values with `==`.
    #[must_use]
    pub fn with_partial_eq() -> Self {
        Self::default()
    }
}

impl<K, V, S> SyncMultimap<K, V, S> {
    /// Creates an empty `SyncMultimap` which will use the given hash builder to hash keys.
    pub fn with_hasher<F>(equals: F, hash_builder: S) -> Self
    where
        F: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        Self::from_table(HashMap::with_hasher(hash_builder), Arc::new(equals))
    }

    /// Creates an empty `SyncMultimap` with room for at least `capacity` keys, using the given
    /// hash builder to hash keys.
    pub fn with_capacity_and_hasher<F>(capacity: usize, equals: F, hash_builder: S) -> Self
    where
        F: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        Self::from_table(
            HashMap::with_capacity_and_hasher(capacity, hash_builder),
            Arc::new(equals),
        )
    }

    pub(crate) fn from_table(table: HashMap<K, Vec<V>, S>, equals: Equals<V>) -> Self {
        Self {
            table: RwLock::new(table),
            equals,
        }
    }

    /// Returns the predicate used to compare values.
    ///
    /// Pass it to [`SyncMultimap::with_shared_equals`] when building maps that should compare
    /// equal to this one.
    pub fn equals(&self) -> &Equals<V> {
        &self.equals
    }

    /// Creates an empty `SyncMultimap` reusing an existing predicate.
    pub fn with_shared_equals(equals: Equals<V>, hash_builder: S) -> Self {
        Self::from_table(HashMap::with_hasher(hash_builder), equals)
    }

    /// Returns the number of keys in the map.
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns the number of values stored across all keys.
    pub fn count(&self) -> usize {
        self.table.read().values().map(Vec::len).sum()
    }

    /// Returns `true` if the map contains no keys.
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Removes every key and value. Keeps the allocated memory for reuse.
    pub fn clear(&self) {
        self.table.write().clear();
    }

    /// Returns every key in arbitrary order.
    ///
    /// The keys are copied out, so the result stays valid while the map keeps changing.
    ///
    /// # Examples
    ///
    /// ```
    /// use sync_multimap::SyncMultimap;
    ///
    /// let map = SyncMultimap::with_partial_eq();
    /// map.add(1, 'x');
    /// map.add(1, 'y');
    /// map.add(2, 'z');
    ///
    /// let mut keys = map.keys();
    /// keys.sort_unstable(); // Sort since the keys are returned in arbitrary order.
    ///
    /// assert_eq!(keys, [1, 2]);
    /// ```
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.table.read().keys().cloned().collect()
    }

    /// Calls `visit` once for every key-value pair.
    ///
    /// Keys are visited in arbitrary order, values of one key in insertion order. The read
    /// lock is held for the whole traversal, so the visitor sees one consistent state.
    ///
    /// The visitor must not call back into the same map. A write from inside the visitor
    /// deadlocks, and even a nested read may block behind a writer queued on another thread.
    ///
    /// # Examples
    ///
    /// ```
    /// use sync_multimap::SyncMultimap;
    ///
    /// let map = SyncMultimap::with_partial_eq();
    /// map.add("a", 1);
    /// map.add("a", 2);
    /// map.add("b", 3);
    ///
    /// let mut sum = 0;
    /// map.for_each(|_, value| sum += value);
    ///
    /// assert_eq!(sum, 6);
    /// ```
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V),
    {
        let table = self.table.read();

        for (key, values) in table.iter() {
            for value in values {
                visit(key, value);
            }
        }
    }
}

impl<K, V, S> SyncMultimap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Adds `value` under `key` unless an equal value is already stored there.
    ///
    /// Returns whether the value was added.
    pub fn add(&self, key: K, value: V) -> bool {
        let mut table = self.table.write();
        insert_distinct(&mut table, key, value, &*self.equals)
    }

    /// Removes a key together with all of its values, returning the values if the key was present.
    pub fn remove<Q>(&self, key: &Q) -> Option<Vec<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.write().remove(key)
    }

    /// Removes the values under `key` that are equal to `value`, dropping the key once it has no
    /// values left.
    ///
    /// Returns whether anything was removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use sync_multimap::SyncMultimap;
    ///
    /// let map = SyncMultimap::with_partial_eq();
    /// map.add("a", 1);
    /// map.add("a", 2);
    ///
    /// assert!(map.remove_value("a", &1));
    /// assert_eq!(map.get("a"), [2]);
    ///
    /// assert!(map.remove_value("a", &2));
    /// assert!(!map.contains_key("a"));
    /// ```
    pub fn remove_value<Q>(&self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut table = self.table.write();

        let Some(values) = table.get_mut(key) else {
            return false;
        };

        let before = values.len();
        values.retain(|stored| !(self.equals)(stored, value));
        let removed = values.len() != before;

        if values.is_empty() {
            table.remove(key);
        }

        removed
    }

    /// Returns a copy of the values stored under `key`, in insertion order.
    ///
    /// An absent key yields an empty `Vec`.
    pub fn get<Q>(&self, key: &Q) -> Vec<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.table.read().get(key).cloned().unwrap_or_default()
    }

    /// Returns `true` if a value equal to `value` is stored under `key`.
    pub fn contains<Q>(&self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table
            .read()
            .get(key)
            .is_some_and(|values| values.iter().any(|stored| (self.equals)(stored, value)))
    }

    /// Returns `true` if the map holds at least one value for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.read().contains_key(key)
    }

    /// Returns `true` if both maps hold the same keys and, for every key, the same values.
    ///
    /// Values are compared with this map's predicate and their order under a key is ignored.
    /// Only one lock is held at a time: this map is copied under its own read lock, which is
    /// released before `other` is read. Two threads running `a.equal(&b)` and `b.equal(&a)`
    /// therefore cannot deadlock.
    ///
    /// Taking that copy is why `K` and `V` must be [`Clone`]. The same bound applies to the
    /// [`PartialEq`] impl and to the free [`equal`](crate::equal) function.
    ///
    /// # Examples
    ///
    /// ```
    /// use sync_multimap::SyncMultimap;
    ///
    /// let a = SyncMultimap::with_partial_eq();
    /// a.add("k", 1);
    /// a.add("k", 2);
    ///
    /// let b = SyncMultimap::with_partial_eq();
    /// b.add("k", 2);
    /// b.add("k", 1);
    ///
    /// assert!(a.equal(&b));
    /// ```
    pub fn equal(&self, other: &Self) -> bool
    where
        K: Clone,
        V: Clone,
    {
        if ptr::eq(self, other) {
            return true;
        }

        let snapshot: Vec<(K, Vec<V>)> = self
            .table
            .read()
            .iter()
            .map(|(key, values)| (key.clone(), values.clone()))
            .collect();

        let theirs = other.table.read();

        snapshot.len() == theirs.len()
            && snapshot.iter().all(|(key, ours)| {
                theirs
                    .get(key)
                    .is_some_and(|values| same_values(ours, values, &*self.equals))
            })
    }
}

/// Returns `true` if `a` and `b` hold the same keys and values; see [`SyncMultimap::equal`].
pub fn equal<K, V, S>(a: &SyncMultimap<K, V, S>, b: &SyncMultimap<K, V, S>) -> bool
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher,
{
    a.equal(b)
}

impl<K, V, S> Clone for SyncMultimap<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    /// Deep-copies the table. The clone shares the predicate but nothing else.
    fn clone(&self) -> Self {
        Self::from_table(self.table.read().clone(), Arc::clone(&self.equals))
    }
}

impl<K, V, S> PartialEq for SyncMultimap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl<K, V, S> Default for SyncMultimap<K, V, S>
where
    V: PartialEq + 'static,
    S: Default,
{
    fn default() -> Self {
        Self::with_hasher(partial_eq::<V>, S::default())
    }
}

impl<K, V, S> Debug for SyncMultimap<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.table.read().iter()).finish()
    }
}

impl<K, V, S> FromIterator<(K, V)> for SyncMultimap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq + 'static,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K, V)> for SyncMultimap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Adds every pair, skipping values already present under their key.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let table = self.table.get_mut();

        for (key, value) in iter {
            insert_distinct(table, key, value, &*self.equals);
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for SyncMultimap<K, V, RandomState>
where
    K: Eq + Hash,
    V: PartialEq + 'static,
{
    /// # Examples
    ///
    /// ```
    /// use sync_multimap::SyncMultimap;
    ///
    /// let map = SyncMultimap::from([("a", 1), ("a", 2), ("a", 1), ("b", 3)]);
    ///
    /// assert_eq!(map.len(), 2);
    /// assert_eq!(map.count(), 3);
    /// ```
    fn from(arr: [(K, V); N]) -> Self {
        Self::from_iter(arr)
    }
}

pub(crate) fn partial_eq<V: PartialEq>(a: &V, b: &V) -> bool {
    a == b
}

fn insert_distinct<K, V, S>(
    table: &mut HashMap<K, Vec<V>, S>,
    key: K,
    value: V,
    equals: &(dyn Fn(&V, &V) -> bool + Send + Sync),
) -> bool
where
    K: Eq + Hash,
    S: BuildHasher,
{
    let values = table.entry(key).or_default();

    if values.iter().any(|stored| equals(stored, &value)) {
        return false;
    }

    values.push(value);
    true
}

// Decoded sequences may hold equal values, so containment is checked both ways.
fn same_values<V>(a: &[V], b: &[V], equals: &(dyn Fn(&V, &V) -> bool + Send + Sync)) -> bool {
    a.len() == b.len()
        && a.iter().all(|x| b.iter().any(|y| equals(x, y)))
        && b.iter().all(|y| a.iter().any(|x| equals(x, y)))
}
