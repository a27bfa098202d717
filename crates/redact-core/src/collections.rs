//! Hash collections behind one switch. `std-hash` selects the standard
//! library maps; the default pairs `hashbrown` with `ahash`.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub type HashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
    pub type HashSet<K> = hashbrown::HashSet<K, ahash::RandomState>;
}
