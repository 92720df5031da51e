//! Document slot (spec §4.10, §9, C11): a small generic container holding a
//! loader closure, a saver closure, a loaded/dirty pair, and the cached
//! value. Grounded on the teacher's document-caching style, generalized to
//! an explicit `save()` called from the orchestrator's per-chapter epilogue
//! (the GC'd-language variant spec §9 calls out).

use crate::error::Result;

type Loader<T> = Box<dyn FnMut() -> Result<Option<T>> + Send>;
type Saver<T> = Box<dyn FnMut(&T) -> Result<()> + Send>;

/// Lazy-load, dirty-tracked, write-through-capable document cache.
pub struct DocumentSlot<T> {
    loader: Loader<T>,
    saver: Saver<T>,
    loaded: bool,
    dirty: bool,
    value: Option<T>,
    write_through: bool,
}

impl<T: Clone> DocumentSlot<T> {
    pub fn new(loader: Loader<T>, saver: Saver<T>) -> Self {
        Self { loader, saver, loaded: false, dirty: false, value: None, write_through: false }
    }

    pub fn with_write_through(mut self, enabled: bool) -> Self {
        self.write_through = enabled;
        self
    }

    /// Lazily loads on first access.
    pub fn get_value(&mut self) -> Result<Option<&T>> {
        if !self.loaded {
            self.value = (self.loader)()?;
            self.loaded = true;
        }
        Ok(self.value.as_ref())
    }

    /// Caches and marks dirty; write-through slots persist immediately.
    pub fn set_value(&mut self, v: T) -> Result<()> {
        self.value = Some(v);
        self.loaded = true;
        self.dirty = true;
        if self.write_through {
            self.save()?;
        }
        Ok(())
    }

    /// Writes iff dirty and non-null.
    pub fn save(&mut self) -> Result<()> {
        if self.dirty {
            if let Some(v) = &self.value {
                (self.saver)(v)?;
                self.dirty = false;
            }
        }
        Ok(())
    }

    /// Clears the cache; the next `get_value()` calls the loader again.
    pub fn invalidate(&mut self) {
        self.loaded = false;
        self.value = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn lazy_loads_once() {
        let load_count = Arc::new(Mutex::new(0));
        let lc = load_count.clone();
        let loader: Loader<i32> = Box::new(move || {
            *lc.lock().unwrap() += 1;
            Ok(Some(7))
        });
        let saver: Saver<i32> = Box::new(|_| Ok(()));
        let mut slot = DocumentSlot::new(loader, saver);

        assert_eq!(*slot.get_value().unwrap().unwrap(), 7);
        assert_eq!(*slot.get_value().unwrap().unwrap(), 7);
        assert_eq!(*load_count.lock().unwrap(), 1);
    }

    #[test]
    fn set_then_save_round_trips() {
        let saved = Arc::new(Mutex::new(None));
        let sv = saved.clone();
        let loader: Loader<String> = Box::new(|| Ok(None));
        let saver: Saver<String> = Box::new(move |v| {
            *sv.lock().unwrap() = Some(v.clone());
            Ok(())
        });
        let mut slot = DocumentSlot::new(loader, saver);
        slot.set_value("hello".to_string()).unwrap();
        slot.save().unwrap();
        assert_eq!(saved.lock().unwrap().as_deref(), Some("hello"));
        assert!(!slot.is_dirty());
        assert_eq!(slot.get_value().unwrap().unwrap(), "hello");
    }

    #[test]
    fn invalidate_forces_reload() {
        let load_count = Arc::new(Mutex::new(0));
        let lc = load_count.clone();
        let loader: Loader<i32> = Box::new(move || {
            *lc.lock().unwrap() += 1;
            Ok(Some(1))
        });
        let saver: Saver<i32> = Box::new(|_| Ok(()));
        let mut slot = DocumentSlot::new(loader, saver);
        slot.get_value().unwrap();
        slot.invalidate();
        slot.get_value().unwrap();
        assert_eq!(*load_count.lock().unwrap(), 2);
    }

    #[test]
    fn write_through_saves_on_set() {
        let saved = Arc::new(Mutex::new(0));
        let sv = saved.clone();
        let loader: Loader<i32> = Box::new(|| Ok(None));
        let saver: Saver<i32> = Box::new(move |_| {
            *sv.lock().unwrap() += 1;
            Ok(())
        });
        let mut slot = DocumentSlot::new(loader, saver).with_write_through(true);
        slot.set_value(1).unwrap();
        assert_eq!(*saved.lock().unwrap(), 1);
        assert!(!slot.is_dirty());
    }
}
