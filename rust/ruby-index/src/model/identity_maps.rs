//! Hash maps keyed by ids that are already xxh3 hashes. Rehashing them would be wasted work, so the hasher passes the
//! id through untouched.

use std::{
    collections::{HashMap, HashSet},
    hash::{BuildHasher, Hasher},
};

#[derive(Default)]
pub struct PassthroughHasher {
    hash: u64,
}

impl Hasher for PassthroughHasher {
    fn write(&mut self, _bytes: &[u8]) {
        unreachable!("PassthroughHasher only accepts precomputed u64 ids");
    }

    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }

    fn finish(&self) -> u64 {
        self.hash
    }
}

#[derive(Default, Clone, Copy)]
pub struct PassthroughBuilder;

impl BuildHasher for PassthroughBuilder {
    type Hasher = PassthroughHasher;

    fn build_hasher(&self) -> Self::Hasher {
        PassthroughHasher::default()
    }
}

pub type IdentityHashMap<K, V> = HashMap<K, V, PassthroughBuilder>;
pub type IdentityHashSet<T> = HashSet<T, PassthroughBuilder>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::UriId;

    #[test]
    fn ids_hash_to_their_own_value() {
        let id = UriId::from("file:///foo.rb");
        let mut hasher = PassthroughBuilder.build_hasher();
        std::hash::Hash::hash(&id, &mut hasher);

        assert_eq!(hasher.finish(), *id);
    }

    #[test]
    fn maps_keyed_by_ids() {
        let mut map: IdentityHashMap<UriId, &str> = IdentityHashMap::default();
        map.insert(UriId::from("file:///a.rb"), "a");

        assert_eq!(map.get(&UriId::from("file:///a.rb")), Some(&"a"));
        assert!(!map.contains_key(&UriId::from("file:///b.rb")));
    }
}
