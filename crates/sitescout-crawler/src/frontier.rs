use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Condvar, Mutex, MutexGuard};

use indexmap::IndexSet;

use crate::error::{Error, Result};

/// Pending and visited bookkeeping of a crawl.
///
/// An item is in at most one of the two sets, and once visited it is never
/// pending again. Pop order is unspecified, seeding and popping are O(1).
#[derive(Debug, Clone)]
pub struct Frontier<T> {
    pending: IndexSet<T>,
    visited: HashSet<T>,
}

impl<T> Default for Frontier<T> {
    fn default() -> Self {
        Self {
            pending: IndexSet::new(),
            visited: HashSet::new(),
        }
    }
}

impl<T> Frontier<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the item was newly added to pending.
    pub fn seed(&mut self, item: T) -> bool {
        if self.visited.contains(&item) {
            return false;
        }
        self.pending.insert(item)
    }

    pub fn pop(&mut self) -> Result<T> {
        self.pending.pop().ok_or(Error::EmptyFrontier)
    }

    pub fn mark_visited(&mut self, item: T) {
        self.pending.swap_remove(&item);
        self.visited.insert(item);
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_pending(&self, item: &T) -> bool {
        self.pending.contains(item)
    }

    pub fn is_visited(&self, item: &T) -> bool {
        self.visited.contains(item)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn into_visited(self) -> HashSet<T> {
        self.visited
    }
}

#[derive(Debug)]
struct SharedState<T> {
    frontier: Frontier<T>,
    in_flight: HashSet<T>,
    aborted: bool,
}

impl<T> SharedState<T>
where
    T: Eq + Hash + Clone,
{
    fn seed(&mut self, item: T) -> bool {
        !self.in_flight.contains(&item) && self.frontier.seed(item)
    }
}

/// A [`Frontier`] shared between workers.
///
/// Every operation happens under one mutex. Workers [`claim`](Self::claim)
/// items, which blocks while the frontier is empty but other claims are still
/// in flight (they may seed new items), and returns `None` once nothing is
/// pending nor in flight, or once [`abort`](Self::abort) was called. Seeding
/// an in-flight item is a no-op.
#[derive(Debug)]
pub struct SharedFrontier<T> {
    state: Mutex<SharedState<T>>,
    wake: Condvar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierStats {
    pub visited: usize,
    pub in_flight: usize,
    pub pending: usize,
}

impl<T> SharedFrontier<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new(frontier: Frontier<T>) -> Self {
        Self {
            state: Mutex::new(SharedState {
                frontier,
                in_flight: HashSet::new(),
                aborted: false,
            }),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn seed(&self, item: T) -> bool {
        let added = self.lock().seed(item);
        if added {
            self.wake.notify_one();
        }
        added
    }

    pub fn claim(&self) -> Option<Claim<'_, T>> {
        let mut state = self.lock();
        loop {
            if state.aborted {
                return None;
            }
            match state.frontier.pop() {
                Ok(item) if state.frontier.is_visited(&item) => continue,
                Ok(item) => {
                    state.in_flight.insert(item.clone());
                    return Some(Claim {
                        shared: self,
                        item: Some(item),
                    });
                }
                Err(_) if state.in_flight.is_empty() => {
                    self.wake.notify_all();
                    return None;
                }
                Err(_) => {
                    state = self.wake.wait(state).unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }

    /// Stops handing out claims, pending items stay pending.
    pub fn abort(&self) {
        self.lock().aborted = true;
        self.wake.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    pub fn stats(&self) -> FrontierStats {
        let state = self.lock();
        FrontierStats {
            visited: state.frontier.visited_len(),
            in_flight: state.in_flight.len(),
            pending: state.frontier.pending_len(),
        }
    }

    pub fn into_inner(self) -> Frontier<T> {
        self.state
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .frontier
    }

    fn release<I>(&self, item: T, discovered: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut state = self.lock();
        state.in_flight.remove(&item);
        state.frontier.mark_visited(item);
        for found in discovered {
            state.seed(found);
        }
        drop(state);
        self.wake.notify_all();
    }
}

/// An item taken out of a [`SharedFrontier`].
///
/// Dropping it without calling [`finish`](Self::finish) still marks the item
/// visited, so a failing worker never stalls the others.
#[derive(Debug)]
pub struct Claim<'a, T>
where
    T: Eq + Hash + Clone,
{
    shared: &'a SharedFrontier<T>,
    item: Option<T>,
}

impl<'a, T> Claim<'a, T>
where
    T: Eq + Hash + Clone,
{
    pub fn item(&self) -> &T {
        match &self.item {
            Some(item) => item,
            // Only taken by finish or drop, both consume the claim
            None => unreachable!("claim already released"),
        }
    }

    /// Marks the item visited and seeds what was discovered while handling it.
    pub fn finish<I>(mut self, discovered: I)
    where
        I: IntoIterator<Item = T>,
    {
        if let Some(item) = self.item.take() {
            self.shared.release(item, discovered);
        }
    }
}

impl<'a, T> Drop for Claim<'a, T>
where
    T: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.shared.release(item, None);
        }
    }
}
