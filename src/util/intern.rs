use std::{collections::HashMap, fmt, num::NonZeroU32, rc::Rc};

/// A handle to an interned string. To retrieve the `&str`, use
/// [`Interner::get`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interned(NonZeroU32);

impl fmt::Debug for Interned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interned({})", self.0)
    }
}

/// Deduplicating string storage for identifiers.
///
/// Every compilation owns its own interner; handles from one interner are
/// meaningless in another.
#[derive(Default)]
pub struct Interner {
    map: HashMap<Rc<str>, Interned>,
    vec: Vec<Rc<str>>,
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, name) in self.vec.iter().enumerate() {
            map.entry(&(i + 1), name);
        }
        map.finish()
    }
}

impl Interner {
    pub fn with_capacity(capacity: usize) -> Interner {
        Interner {
            map: HashMap::with_capacity(capacity),
            vec: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Interns the provided name, returning a handle which can be used to
    /// retrieve it later. Interning the same name twice yields equal handles.
    pub fn intern(&mut self, name: &str) -> Interned {
        if let Some(handle) = self.map.get(name) {
            return *handle;
        }
        let index = u32::try_from(self.vec.len()).unwrap_or(u32::MAX - 1);
        let handle = Interned(NonZeroU32::MIN.saturating_add(index));
        let key: Rc<str> = Rc::from(name);
        self.vec.push(Rc::clone(&key));
        self.map.insert(key, handle);
        handle
    }

    /// Returns the handle of an already interned name without interning it.
    pub fn lookup(&self, name: &str) -> Option<Interned> {
        self.map.get(name).copied()
    }

    /// Returns the name behind the provided handle.
    ///
    /// Panics if the handle was produced by another interner.
    pub fn get(&self, handle: impl Into<Interned>) -> &str {
        let Interned(index) = handle.into();
        &self.vec[index.get() as usize - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interner() {
        let mut i = Interner::with_capacity(3);

        let img1 = i.intern("img");
        let count1 = i.intern("count");
        let img2 = i.intern("img");

        assert_eq!(img1, img2);
        assert_ne!(img1, count1);
        assert_eq!(i.get(img1), "img");
        assert_eq!(i.get(count1), "count");
        assert_eq!(i.len(), 2);
        assert_eq!(i.lookup("count"), Some(count1));
        assert_eq!(i.lookup("missing"), None);
    }
}
