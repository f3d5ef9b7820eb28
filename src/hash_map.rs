use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::hash_table::Entry as TableEntry;
use crate::hash_table::HashTable;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used when none is specified.
        ///
        /// `foldhash`'s fixed-seed state, so two runs of the benchmark place
        /// every key in the same root.
        pub type DefaultHashBuilder = foldhash::fast::FixedState;
    } else {
        /// The hasher builder used when none is specified.
        pub type DefaultHashBuilder =
            core::hash::BuildHasherDefault<std::collections::hash_map::DefaultHasher>;
    }
}

/// An insert-once key-value map over the chained [`HashTable`].
///
/// `HashMap<K, V, S>` hashes keys with the builder `S` and buckets them by
/// `hash % capacity`. The number of roots is fixed at construction; extra
/// keys go into per-root overflow chains.
///
/// Inserting a key that is already present leaves the stored value untouched:
/// the first writer wins.
#[derive(Clone)]
pub struct HashMap<K, V, S = DefaultHashBuilder> {
    table: HashTable<(K, V)>,
    hash_builder: S,
}

impl<K, V, S> Debug for HashMap<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashMap")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Creates a map with `capacity` root slots and a default hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use omni_fetch::HashMap;
    /// #
    /// let map: HashMap<String, f64> = HashMap::with_capacity(100);
    /// assert_eq!(map.capacity(), 100);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates a map with `capacity` root slots and the given hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            hash_builder,
        }
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of root slots.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Hashes a key with this map's hasher builder.
    ///
    /// The result can be handed to [`prefetch`](Self::prefetch) and
    /// [`lookup_hashed`](Self::lookup_hashed) to avoid hashing twice.
    #[inline]
    pub fn hash_key<Q>(&self, key: &Q) -> u64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.hash_builder.hash_one(key)
    }

    /// Inserts a key-value pair if the key is absent.
    ///
    /// Returns `true` if the pair was inserted and `false` if the key was
    /// already present, in which case the map is unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use omni_fetch::HashMap;
    /// #
    /// let mut map: HashMap<String, f64> = HashMap::with_capacity(8);
    /// assert!(map.insert("a".to_string(), 1.0));
    /// assert!(!map.insert("a".to_string(), 2.0));
    /// assert_eq!(map.get("a"), Some(&1.0));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = self.hash_builder.hash_one(&key);
        match self.table.entry(hash, |(k, _)| k == &key) {
            TableEntry::Occupied(_) => false,
            TableEntry::Vacant(entry) => {
                entry.insert((key, value));
                true
            }
        }
    }

    /// Returns a reference to the value for `key`, if present.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_hashed(self.hash_key(key), key)
    }

    /// Returns a reference to the value for `key` using a precomputed hash.
    ///
    /// `hash` must come from [`hash_key`](Self::hash_key) on this map.
    pub fn get_hashed<Q>(&self, hash: u64, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table
            .find(hash, |(k, _)| Borrow::<Q>::borrow(k) == key)
            .map(|(_, v)| v)
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Returns the value for a key that is known to be present.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not in the map.
    #[track_caller]
    pub fn lookup<Q>(&self, key: &Q) -> &V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup_hashed(self.hash_key(key), key)
    }

    /// Like [`lookup`](Self::lookup), with a precomputed hash.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not in the map.
    #[track_caller]
    #[inline]
    pub fn lookup_hashed<Q>(&self, hash: u64, key: &Q) -> &V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.get_hashed(hash, key) {
            Some(value) => value,
            None => panic!("lookup of a key that is not in the map"),
        }
    }

    /// Issues a cache prefetch hint for the root slot of `hash`.
    #[inline(always)]
    pub fn prefetch(&self, hash: u64) {
        self.table.prefetch(hash);
    }

    /// Counts roots by chain length. See [`HashTable::chain_histogram`].
    #[cfg(feature = "stats")]
    pub fn chain_histogram(&self) -> alloc::vec::Vec<usize> {
        self.table.chain_histogram()
    }

    /// Returns chain and utilization statistics for the underlying table.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> crate::hash_table::DebugStats {
        self.table.debug_stats()
    }

    /// Pretty-prints the chain-length histogram to stderr.
    #[cfg(feature = "stats")]
    pub fn print_chain_histogram(&self) {
        self.table.print_chain_histogram();
    }
}
