//! Generational slab holding the queued requests in FIFO order.
//!
//! Every occupied slot carries `prev`/`next` links, so the queue is a doubly
//! linked list threaded through the slab: push to the tail, pop from the head
//! and unlink by key are all O(1). Keys carry the slot generation, so a stale
//! key (one whose request already left the queue) never matches a request that
//! later reuses the slot.

/// Stable reference to a queued entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SlotKey {
    index: usize,
    generation: u32,
}

struct Node<T> {
    value: T,
    generation: u32,
    prev: Option<usize>,
    next: Option<usize>,
}

enum Entry<T> {
    Occupied(Node<T>),
    Free { next: Option<usize>, generation: u32 },
}

pub(crate) struct LinkedSlab<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> LinkedSlab<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `value` at the tail.
    pub fn push_back(&mut self, value: T) -> SlotKey {
        let (index, generation) = match self.free_head {
            Some(index) => match self.entries[index] {
                Entry::Free { next, generation } => {
                    self.free_head = next;
                    (index, generation)
                }
                Entry::Occupied(_) => unreachable!("free list points at an occupied slot"),
            },
            None => {
                self.entries.push(Entry::Free {
                    next: None,
                    generation: 0,
                });
                (self.entries.len() - 1, 0)
            }
        };

        self.entries[index] = Entry::Occupied(Node {
            value,
            generation,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.node_mut(tail).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        SlotKey { index, generation }
    }

    /// Get the entry referenced by `key`, if it is still present.
    pub fn get(&self, key: SlotKey) -> Option<&T> {
        match self.entries.get(key.index) {
            Some(Entry::Occupied(node)) if node.generation == key.generation => Some(&node.value),
            _ => None,
        }
    }

    /// Unlink the entry referenced by `key`, if it is still present.
    pub fn remove(&mut self, key: SlotKey) -> Option<T> {
        self.get(key)?;
        Some(self.unlink(key.index))
    }

    /// Unlink and return the oldest entry accepted by `take`.
    ///
    /// Entries rejected by `take` stay where they are.
    pub fn pop_front_where(&mut self, mut take: impl FnMut(&T) -> bool) -> Option<T> {
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let node = self.node(index);
            if take(&node.value) {
                return Some(self.unlink(index));
            }
            cursor = node.next;
        }
        None
    }

    fn unlink(&mut self, index: usize) -> T {
        let free_head = self.free_head;
        let entry = std::mem::replace(
            &mut self.entries[index],
            Entry::Free {
                next: free_head,
                generation: 0,
            },
        );
        let Entry::Occupied(node) = entry else {
            unreachable!("unlinking a free slot");
        };

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }

        self.entries[index] = Entry::Free {
            next: free_head,
            generation: node.generation.wrapping_add(1),
        };
        self.free_head = Some(index);
        self.len -= 1;
        node.value
    }

    fn node(&self, index: usize) -> &Node<T> {
        match &self.entries[index] {
            Entry::Occupied(node) => node,
            Entry::Free { .. } => unreachable!("list link points at a free slot"),
        }
    }

    fn node_mut(&mut self, index: usize) -> &mut Node<T> {
        match &mut self.entries[index] {
            Entry::Occupied(node) => node,
            Entry::Free { .. } => unreachable!("list link points at a free slot"),
        }
    }
}
