//! A fixed-capacity hash table with per-bucket overflow chains.
//!
//! The table allocates a fixed array of root slots up front. A value lands in
//! the root slot at `hash % capacity`; later values that map to the same root
//! are appended to a singly-linked chain hanging off that root. Chain nodes
//! live in the same arena as the roots and are linked by index, so a lookup
//! that misses the root walks forward through the arena rather than chasing
//! heap pointers.
//!
//! The table never grows, never rehashes and never removes values. Like the
//! rest of this crate's tables, callers supply the hash and an equality
//! predicate for each operation.

use alloc::vec::Vec;
use core::fmt::Debug;

/// Link value marking the end of a chain.
const NIL: usize = usize::MAX;

#[inline(always)]
fn prefetch<T>(ptr: *const T) {
    #[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
    // SAFETY: `_mm_prefetch` is a hint and never dereferences the pointer, so
    // any address (including one past the end of an allocation) is fine.
    unsafe {
        use core::arch::x86_64::*;
        _mm_prefetch(ptr as *const i8, _MM_HINT_T0);
    }

    #[cfg(not(all(target_arch = "x86_64", target_feature = "sse2")))]
    let _ = ptr;
}

#[derive(Clone)]
struct Node<V> {
    hash: u64,
    next: usize,
    /// `None` only for a root slot that nothing has hashed to yet.
    value: Option<V>,
}

impl<V> Node<V> {
    #[inline(always)]
    fn unused() -> Self {
        Node {
            hash: 0,
            next: NIL,
            value: None,
        }
    }
}

/// Chain statistics for hash table analysis.
///
/// Only available with the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of values currently in the table
    pub populated: usize,
    /// Number of root slots
    pub buckets: usize,
    /// Number of root slots holding a value
    pub used_buckets: usize,
    /// Number of values stored in overflow nodes
    pub overflow_entries: usize,
    /// Length of the longest chain, counting the root
    pub longest_chain: usize,
    /// Average chain length over used roots
    pub average_chain: f64,
    /// Total memory in bytes reserved by the node arena
    pub total_bytes: usize,
}

#[cfg(feature = "stats")]
impl DebugStats {
    /// Pretty-print the statistics to stderr.
    pub fn print(&self) {
        eprintln!("=== Hash Table Chain Statistics ===");
        eprintln!(
            "Population: {} values in {}/{} roots ({:.2}% used)",
            self.populated,
            self.used_buckets,
            self.buckets,
            if self.buckets == 0 {
                0.0
            } else {
                self.used_buckets as f64 / self.buckets as f64 * 100.0
            }
        );
        eprintln!("Overflow: {} entries", self.overflow_entries);
        eprintln!(
            "Chains: longest {}, average {:.3}",
            self.longest_chain, self.average_chain
        );
        eprintln!("Total Allocated: {} bytes", self.total_bytes);
    }
}

/// A fixed-capacity hash table using separate chaining.
///
/// `HashTable<V>` stores values of type `V`. Every operation takes the full
/// 64-bit hash of the value's key and an equality predicate; the table
/// compares stored hashes before calling the predicate.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use omni_fetch::hash_table::Entry;
/// # use omni_fetch::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # fn hash_str(s: &str) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     s.hash(&mut hasher);
/// #     hasher.finish()
/// # }
/// #
/// let mut table = HashTable::with_capacity(16);
/// let hash = hash_str("alice");
///
/// match table.entry(hash, |(k, _): &(String, f64)| k == "alice") {
///     Entry::Vacant(entry) => {
///         entry.insert(("alice".to_string(), 1.5));
///     }
///     Entry::Occupied(_) => unreachable!(),
/// }
///
/// assert_eq!(table.find(hash, |(k, _)| k == "alice").map(|(_, v)| *v), Some(1.5));
/// ```
#[derive(Clone)]
pub struct HashTable<V> {
    /// Root slots occupy `0..buckets`; overflow nodes are appended after them.
    nodes: Vec<Node<V>>,
    buckets: usize,
    populated: usize,
}

impl<V> Debug for HashTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field("populated", &self.populated)
            .field("buckets", &self.buckets)
            .field("overflow", &(self.nodes.len() - self.buckets))
            .finish()
    }
}

impl<V> HashTable<V> {
    /// Creates a new hash table with `capacity` root slots.
    ///
    /// The number of roots is fixed for the lifetime of the table. A capacity
    /// of zero is rounded up to a single root.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use omni_fetch::hash_table::HashTable;
    /// #
    /// let table: HashTable<String> = HashTable::with_capacity(100);
    /// assert_eq!(table.capacity(), 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        let buckets = capacity.max(1);
        let mut nodes = Vec::with_capacity(buckets);
        nodes.resize_with(buckets, Node::unused);

        Self {
            nodes,
            buckets,
            populated: 0,
        }
    }

    #[inline(always)]
    fn root_index(&self, hash: u64) -> usize {
        (hash % self.buckets as u64) as usize
    }

    #[inline(always)]
    fn node(&self, index: usize) -> &Node<V> {
        debug_assert!(index < self.nodes.len());
        // SAFETY: `index` is either a root index (< buckets <= nodes.len()) or a
        // `next` link, which only ever points at a node that has already been
        // pushed onto the arena. Nodes are never removed.
        unsafe { self.nodes.get_unchecked(index) }
    }

    /// Returns `true` if the table contains no values.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of values in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns the number of root slots.
    ///
    /// The table holds any number of values; values beyond one per root are
    /// stored in overflow chains.
    pub fn capacity(&self) -> usize {
        self.buckets
    }

    /// Gets the entry for a value with the given hash.
    ///
    /// The root slot is checked first, then the chain in insertion order. The
    /// returned [`Entry::Vacant`] remembers where a new value would go: the
    /// root itself if it has never been used, otherwise the tail of its chain.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use omni_fetch::hash_table::Entry;
    /// # use omni_fetch::hash_table::HashTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_str(s: &str) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     s.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = HashTable::with_capacity(10);
    /// let hash = hash_str("key");
    ///
    /// table.entry(hash, |s: &String| s == "key").or_insert("key".to_string());
    /// assert!(matches!(
    ///     table.entry(hash, |s: &String| s == "key"),
    ///     Entry::Occupied(_)
    /// ));
    /// ```
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Entry<'_, V> {
        let mut index = self.root_index(hash);
        loop {
            let node = self.node(index);
            let Some(value) = &node.value else {
                return Entry::Vacant(VacantEntry {
                    table: self,
                    hash,
                    target: Target::Root(index),
                });
            };

            if node.hash == hash && eq(value) {
                return Entry::Occupied(OccupiedEntry { table: self, index });
            }

            match node.next {
                NIL => {
                    return Entry::Vacant(VacantEntry {
                        table: self,
                        hash,
                        target: Target::Tail(index),
                    });
                }
                next => index = next,
            }
        }
    }

    /// Finds a value by hash and equality predicate.
    ///
    /// Cost is proportional to the length of the chain rooted at
    /// `hash % capacity`.
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        let mut index = self.root_index(hash);
        loop {
            let node = self.node(index);
            let value = node.value.as_ref()?;
            if node.hash == hash && eq(value) {
                return Some(value);
            }

            match node.next {
                NIL => return None,
                next => index = next,
            }
        }
    }

    /// Issues a cache prefetch hint for the root slot `hash` maps to.
    ///
    /// This is a no-op on targets without SSE2.
    #[inline(always)]
    pub fn prefetch(&self, hash: u64) {
        prefetch(self.nodes.as_ptr().wrapping_add(self.root_index(hash)));
    }

    /// Counts roots by chain length.
    ///
    /// Index `n` of the result holds the number of roots whose chain (root
    /// included) holds `n` values; unused roots are counted at index 0.
    #[cfg(feature = "stats")]
    pub fn chain_histogram(&self) -> Vec<usize> {
        let mut hist = alloc::vec![0usize; 1];

        for root in 0..self.buckets {
            let len = self.chain_len(root);
            if hist.len() <= len {
                hist.resize(len + 1, 0);
            }
            hist[len] += 1;
        }

        hist
    }

    #[cfg(feature = "stats")]
    fn chain_len(&self, root: usize) -> usize {
        let mut node = self.node(root);
        if node.value.is_none() {
            return 0;
        }

        let mut len = 1;
        while node.next != NIL {
            node = self.node(node.next);
            len += 1;
        }
        len
    }

    /// Returns chain and utilization statistics for debugging.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> DebugStats {
        let hist = self.chain_histogram();
        let used_buckets = self.buckets - hist[0];

        DebugStats {
            populated: self.populated,
            buckets: self.buckets,
            used_buckets,
            overflow_entries: self.nodes.len() - self.buckets,
            longest_chain: hist.len() - 1,
            average_chain: if used_buckets == 0 {
                0.0
            } else {
                self.populated as f64 / used_buckets as f64
            },
            total_bytes: self.nodes.capacity() * core::mem::size_of::<Node<V>>(),
        }
    }

    /// Pretty-prints the chain-length histogram to stderr.
    #[cfg(feature = "stats")]
    pub fn print_chain_histogram(&self) {
        let hist = self.chain_histogram();
        let max = hist.iter().copied().max().unwrap_or(0);
        if max == 0 {
            eprintln!("chain histogram: empty");
            return;
        }

        eprintln!("chain histogram ({} values):", self.populated);
        for (len, &count) in hist.iter().enumerate() {
            let width = (count * 60).div_ceil(max);
            eprintln!("{:>3} | {} ({})", len, "█".repeat(width), count);
        }
    }
}

/// A view into a single entry in the hash table, which may be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, V> {
    /// A vacant entry - the key is not present in the table
    Vacant(VacantEntry<'a, V>),
    /// An occupied entry - the key is present in the table
    Occupied(OccupiedEntry<'a, V>),
}

impl<'a, V> Entry<'a, V> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value now in the entry.
    ///
    /// An occupied entry keeps its existing value; `default` is dropped.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }
}

enum Target {
    /// An unused root slot.
    Root(usize),
    /// The last node of a chain; the new node is linked after it.
    Tail(usize),
}

/// A view into a vacant entry in the hash table.
pub struct VacantEntry<'a, V> {
    table: &'a mut HashTable<V>,
    hash: u64,
    target: Target,
}

impl<'a, V> VacantEntry<'a, V> {
    /// Inserts a value into the vacant entry and returns a mutable reference
    /// to it.
    ///
    /// A vacant root is filled in place. Otherwise a new overflow node is
    /// appended to the arena and linked at the end of the chain.
    pub fn insert(self, value: V) -> &'a mut V {
        let table = self.table;
        table.populated += 1;

        let index = match self.target {
            Target::Root(index) => {
                table.nodes[index].hash = self.hash;
                index
            }
            Target::Tail(tail) => {
                let index = table.nodes.len();
                table.nodes.push(Node {
                    hash: self.hash,
                    next: NIL,
                    value: None,
                });
                table.nodes[tail].next = index;
                index
            }
        };

        table.nodes[index].value.insert(value)
    }
}

/// A view into an occupied entry in the hash table.
pub struct OccupiedEntry<'a, V> {
    table: &'a mut HashTable<V>,
    index: usize,
}

impl<'a, V> OccupiedEntry<'a, V> {
    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        match &self.table.nodes[self.index].value {
            Some(value) => value,
            None => unreachable!("occupied entry points at an unused root"),
        }
    }

    /// Converts the entry into a mutable reference to its value.
    pub fn into_mut(self) -> &'a mut V {
        match &mut self.table.nodes[self.index].value {
            Some(value) => value,
            None => unreachable!("occupied entry points at an unused root"),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[derive(Debug, PartialEq, Clone)]
    struct Item {
        key: String,
        value: f64,
    }

    fn hash_key(state: &HashState, key: &str) -> u64 {
        let mut h = state.build_hasher();
        h.write(key.as_bytes());
        h.finish()
    }

    fn insert(table: &mut HashTable<Item>, hash: u64, key: &str, value: f64) -> bool {
        match table.entry(hash, |v| v.key == key) {
            Entry::Vacant(v) => {
                v.insert(Item {
                    key: key.to_string(),
                    value,
                });
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Walks the chain rooted at `root`, returning keys in chain order.
    fn chain_keys(table: &HashTable<Item>, root: usize) -> Vec<String> {
        let mut keys = Vec::new();
        let mut index = root;
        while index != NIL {
            let node = &table.nodes[index];
            match &node.value {
                Some(item) => keys.push(item.key.clone()),
                None => break,
            }
            index = node.next;
        }
        keys
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(64);
        for k in 0..256 {
            let key = alloc::format!("key_{k}");
            let hash = hash_key(&state, &key);
            assert!(insert(&mut table, hash, &key, k as f64 * 0.5));
            assert_eq!(
                table.find(hash, |v| v.key == key).map(|v| v.value),
                Some(k as f64 * 0.5),
                "{:#?}",
                table
            );
        }
        assert_eq!(table.len(), 256);

        for k in 0..256 {
            let key = alloc::format!("key_{k}");
            let hash = hash_key(&state, &key);
            assert_eq!(
                table.find(hash, |v| v.key == key).map(|v| v.value),
                Some(k as f64 * 0.5)
            );
        }

        let miss_hash = hash_key(&state, "missing");
        assert!(table.find(miss_hash, |v| v.key == "missing").is_none());
    }

    #[test]
    fn duplicate_entry_keeps_first_value() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(8);
        let hash = hash_key(&state, "dup");

        assert!(insert(&mut table, hash, "dup", 7.0));
        assert!(!insert(&mut table, hash, "dup", 11.0));

        match table.entry(hash, |v| v.key == "dup") {
            Entry::Occupied(occ) => assert_eq!(occ.get().value, 7.0),
            Entry::Vacant(_) => panic!("entry should be occupied"),
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn explicit_collision() {
        let mut table: HashTable<Item> = HashTable::with_capacity(4);
        // All of these land on root 1.
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            assert!(insert(&mut table, 1 + 4 * i as u64, key, i as f64));
        }

        assert_eq!(table.len(), 4);
        assert_eq!(chain_keys(&table, 1), ["a", "b", "c", "d"]);
        assert_eq!(table.nodes.len(), 4 + 3);

        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            assert_eq!(
                table.find(1 + 4 * i as u64, |v| v.key == *key).map(|v| v.value),
                Some(i as f64)
            );
        }
    }

    #[test]
    fn same_hash_distinct_keys_chain() {
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        assert!(insert(&mut table, 99, "first", 1.0));
        assert!(insert(&mut table, 99, "second", 2.0));
        assert!(!insert(&mut table, 99, "second", 3.0));

        assert_eq!(table.find(99, |v| v.key == "first").map(|v| v.value), Some(1.0));
        assert_eq!(table.find(99, |v| v.key == "second").map(|v| v.value), Some(2.0));
        assert!(table.find(99, |v| v.key == "third").is_none());
    }

    #[test]
    fn unused_root_stays_unused_until_hit() {
        let mut table: HashTable<Item> = HashTable::with_capacity(3);
        assert!(insert(&mut table, 0, "zero", 0.0));
        assert!(insert(&mut table, 3, "three", 3.0));

        assert!(table.nodes[1].value.is_none());
        assert!(table.nodes[2].value.is_none());
        assert!(table.find(1, |_| true).is_none());
        assert_eq!(chain_keys(&table, 0), ["zero", "three"]);
    }

    #[test]
    fn zero_capacity_uses_single_root() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        assert_eq!(table.capacity(), 1);
        assert!(table.is_empty());

        for k in 0..32 {
            let key = alloc::format!("{k}");
            assert!(insert(&mut table, hash_key(&state, &key), &key, k as f64));
        }
        assert_eq!(table.len(), 32);
        assert_eq!(chain_keys(&table, 0).len(), 32);
    }

    #[test]
    fn or_insert_keeps_existing() {
        let mut table: HashTable<String> = HashTable::with_capacity(10);
        let value = table.entry(5, |s| s == "key").or_insert("key".to_string());
        assert_eq!(value, "key");

        *table.entry(5, |s| s == "key").or_insert("other".to_string()) = "changed".to_string();
        assert_eq!(table.find(5, |s| s == "changed").map(String::as_str), Some("changed"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn prefetch_any_hash() {
        let table: HashTable<Item> = HashTable::with_capacity(7);
        for hash in [0, 1, 6, 7, u64::MAX] {
            table.prefetch(hash);
        }
    }

    #[test]
    fn test_clone() {
        let state = HashState::default();
        let mut original: HashTable<Item> = HashTable::with_capacity(2);
        let data = [("hello", 1.0), ("world", 2.0), ("rust", 3.0), ("clone", 4.0)];
        for (key, value) in data {
            insert(&mut original, hash_key(&state, key), key, value);
        }

        let cloned = original.clone();
        assert_eq!(cloned.len(), data.len());
        for (key, value) in data {
            let hash = hash_key(&state, key);
            assert_eq!(cloned.find(hash, |v| v.key == key).map(|v| v.value), Some(value));
        }
    }

    #[test]
    #[cfg(feature = "stats")]
    fn chain_statistics() {
        let mut table: HashTable<Item> = HashTable::with_capacity(4);
        insert(&mut table, 0, "a", 0.0);
        insert(&mut table, 4, "b", 0.0);
        insert(&mut table, 8, "c", 0.0);
        insert(&mut table, 1, "d", 0.0);

        assert_eq!(table.chain_histogram(), [2, 1, 0, 1]);

        let stats = table.debug_stats();
        assert_eq!(stats.populated, 4);
        assert_eq!(stats.buckets, 4);
        assert_eq!(stats.used_buckets, 2);
        assert_eq!(stats.overflow_entries, 2);
        assert_eq!(stats.longest_chain, 3);
        assert_eq!(stats.average_chain, 2.0);
        stats.print();
        table.print_chain_histogram();
    }
}
