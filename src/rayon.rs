use crate::SyncMultimap;
use rayon::iter::{FromParallelIterator, IntoParallelIterator, ParallelExtend, ParallelIterator};
use std::hash::{BuildHasher, Hash};

impl<K: Sync, V: Sync, S> SyncMultimap<K, V, S> {
    /// Calls `visit` (potentially in parallel) once for every key-value pair.
    ///
    /// Keys are spread over the rayon pool; the values of one key are visited in insertion order
    /// on a single worker. The read lock is held until every call returns, so the same
    /// reentrancy rules as [`SyncMultimap::for_each`] apply.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::atomic::{AtomicI32, Ordering};
    /// use sync_multimap::SyncMultimap;
    ///
    /// let map = SyncMultimap::from([("a", 1), ("a", 2), ("b", 3)]);
    ///
    /// let sum = AtomicI32::new(0);
    /// map.par_for_each(|_, value| {
    ///     sum.fetch_add(*value, Ordering::Relaxed);
    /// });
    ///
    /// assert_eq!(sum.into_inner(), 6);
    /// ```
    pub fn par_for_each<F>(&self, visit: F)
    where
        F: Fn(&K, &V) + Send + Sync,
    {
        let table = self.table.read();

        (&*table).into_par_iter().for_each(|(key, values)| {
            for value in values {
                visit(key, value);
            }
        });
    }
}

impl<K, V, S> FromParallelIterator<(K, V)> for SyncMultimap<K, V, S>
where
    K: Eq + Hash + Send,
    V: PartialEq + Send + 'static,
    S: BuildHasher + Default,
{
    fn from_par_iter<P>(par_iter: P) -> Self
    where
        P: IntoParallelIterator<Item = (K, V)>,
    {
        let mut map = Self::default();
        map.par_extend(par_iter);
        map
    }
}

impl<K, V, S> ParallelExtend<(K, V)> for SyncMultimap<K, V, S>
where
    K: Eq + Hash + Send,
    V: Send,
    S: BuildHasher,
{
    /// Collects the pairs in parallel, then adds them under a single write.
    ///
    /// Pairs coming from an unindexed iterator reach each key in no particular order.
    fn par_extend<I>(&mut self, par_iter: I)
    where
        I: IntoParallelIterator<Item = (K, V)>,
    {
        let pairs: Vec<(K, V)> = par_iter.into_par_iter().collect();
        self.extend(pairs);
    }
}
