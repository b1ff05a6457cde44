use crate::error::{Error, Result};
use crate::map::{self, SyncMultimap};
use hashbrown::HashMap;
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

impl<K, V> SyncMultimap<K, V, RandomState>
where
    K: DeserializeOwned + Eq + Hash,
    V: DeserializeOwned,
{
    /// Builds a `SyncMultimap` from a JSON object whose fields hold arrays of values.
    ///
    /// Values are taken as they appear in the input: duplicates within an array are kept, not
    /// merged through `equals`. Fields holding an empty array are skipped, and when a field is
    /// repeated the last occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `bytes` is not valid JSON or is not an object of arrays of
    /// `K` and `V`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sync_multimap::SyncMultimap;
    ///
    /// let map: SyncMultimap<String, i32> =
    ///     SyncMultimap::from_json(br#"{"a":[1,2],"b":[3]}"#, |a, b| a == b)?;
    ///
    /// assert_eq!(map.len(), 2);
    /// assert_eq!(map.count(), 3);
    /// assert!(map.contains("a", &2));
    /// assert!(!map.contains("b", &1));
    /// # Ok::<(), sync_multimap::Error>(())
    /// ```
    pub fn from_json<F>(bytes: &[u8], equals: F) -> Result<Self>
    where
        F: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        Self::from_json_with_hasher(bytes, equals, RandomState::new())
    }
}

impl<K, V, S> SyncMultimap<K, V, S>
where
    K: DeserializeOwned + Eq + Hash,
    V: DeserializeOwned,
    S: BuildHasher,
{
    /// Like [`SyncMultimap::from_json`], using the given hash builder to hash keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] on malformed input.
    #[instrument(level = "trace", skip_all, fields(len = bytes.len()))]
    pub fn from_json_with_hasher<F>(bytes: &[u8], equals: F, hash_builder: S) -> Result<Self>
    where
        F: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        let entries = parse(bytes)?;

        let mut table = HashMap::with_hasher(hash_builder);
        fill(&mut table, entries);
        trace!(keys = table.len(), "decoded multimap");

        Ok(Self::from_table(table, Arc::new(equals)))
    }

    /// Replaces the whole content of the map with the JSON object in `bytes`.
    ///
    /// The input is parsed before the write lock is taken. On error the map is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `bytes` is not valid JSON or is not an object of arrays of
    /// `K` and `V`.
    #[instrument(level = "trace", skip_all, fields(len = bytes.len()))]
    pub fn decode(&self, bytes: &[u8]) -> Result<()> {
        let entries = parse(bytes)?;

        let mut table = self.table.write();
        fill(&mut table, entries);
        trace!(keys = table.len(), "decoded multimap");

        Ok(())
    }
}

impl<K, V, S> SyncMultimap<K, V, S>
where
    K: Serialize,
    V: Serialize,
{
    /// Encodes the map as a JSON object of key to array of values, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if a key cannot be used as a JSON object field name.
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
    /// assert_eq!(map.encode()?, br#"{"a":[1,2]}"#);
    /// # Ok::<(), sync_multimap::Error>(())
    /// ```
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::Encode)
    }
}

impl<K, V, H> Serialize for SyncMultimap<K, V, H>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.table.read().iter())
    }
}

/// Decodes with `==` as the value predicate.
impl<'de, K, V, S> Deserialize<'de> for SyncMultimap<K, V, S>
where
    K: Deserialize<'de> + Eq + Hash,
    V: Deserialize<'de> + PartialEq + 'static,
    S: BuildHasher + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Entries::deserialize(deserializer)?;

        let mut table = HashMap::with_hasher(S::default());
        fill(&mut table, entries);

        Ok(Self::from_table(table, Arc::new(map::partial_eq::<V>)))
    }
}

/// Fields of an encoded multimap, in document order.
struct Entries<K, V>(Vec<(K, Vec<V>)>);

impl<'de, K, V> Deserialize<'de> for Entries<K, V>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor<K, V> {
            marker: PhantomData<Entries<K, V>>,
        }

        impl<'de, K, V> Visitor<'de> for EntriesVisitor<K, V>
        where
            K: Deserialize<'de>,
            V: Deserialize<'de>,
        {
            type Value = Entries<K, V>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of arrays")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));

                while let Some((key, values)) = map.next_entry::<K, Vec<V>>()? {
                    entries.push((key, values));
                }

                Ok(Entries(entries))
            }
        }

        let visitor = EntriesVisitor {
            marker: PhantomData,
        };

        deserializer.deserialize_map(visitor)
    }
}

fn parse<K, V>(bytes: &[u8]) -> Result<Entries<K, V>>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
{
    serde_json::from_slice(bytes).map_err(|err| {
        debug!(error = %err, "rejected encoded multimap");
        Error::Decode(err)
    })
}

fn fill<K, V, S>(table: &mut HashMap<K, Vec<V>, S>, entries: Entries<K, V>)
where
    K: Eq + Hash,
    S: BuildHasher,
{
    table.clear();
    table.reserve(entries.0.len());

    for (key, values) in entries.0 {
        if values.is_empty() {
            table.remove(&key);
        } else {
            table.insert(key, values);
        }
    }
}
