//! Append-only deal registry.
//!
//! Deals are addressed by their 0-based index. The registry only ever
//! appends: an index is never reused, and settled or refunded deals stay in
//! place as the historical record.

use otcdesk_types::{Deal, DealId, DealStatus, OtcError, Result, constants};

/// Owned, index-addressed store of every deal the engine has seen.
pub struct DealRegistry {
    /// Deals in posting order; `deals[i].id == DealId(i)`.
    deals: Vec<Deal>,
    /// Maximum number of deals before `append` fails.
    capacity: usize,
}

impl DealRegistry {
    /// Create an empty registry with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(constants::DEFAULT_REGISTRY_CAPACITY)
    }

    /// Create an empty registry bounded at `capacity` deals.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            deals: Vec::new(),
            capacity,
        }
    }

    /// Append a deal and return its assigned index.
    ///
    /// The deal's `id` is overwritten with the index it lands at.
    ///
    /// # Errors
    /// `RegistryFull` if the registry is at capacity.
    pub fn append(&mut self, mut deal: Deal) -> Result<DealId> {
        if !self.has_room() {
            return Err(OtcError::RegistryFull {
                capacity: self.capacity,
            });
        }
        let id = self.next_id();
        deal.id = id;
        self.deals.push(deal);
        Ok(id)
    }

    /// Whether another `append` would succeed.
    #[must_use]
    pub fn has_room(&self) -> bool {
        self.deals.len() < self.capacity
    }

    /// The index the next appended deal will receive.
    #[must_use]
    pub fn next_id(&self) -> DealId {
        DealId(self.deals.len() as u64)
    }

    #[must_use]
    pub fn contains(&self, id: DealId) -> bool {
        self.slot(id).is_some()
    }

    /// Look up a deal.
    ///
    /// # Errors
    /// `IndexOutOfRange` if `id` is past the end.
    pub fn get(&self, id: DealId) -> Result<&Deal> {
        let slot = self.slot(id).ok_or_else(|| self.out_of_range(id))?;
        Ok(&self.deals[slot])
    }

    /// Mutable lookup.
    ///
    /// # Errors
    /// `IndexOutOfRange` if `id` is past the end.
    pub fn get_mut(&mut self, id: DealId) -> Result<&mut Deal> {
        let slot = self.slot(id).ok_or_else(|| self.out_of_range(id))?;
        Ok(&mut self.deals[slot])
    }

    /// Number of deals ever posted.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.deals.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All deals in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Deal> {
        self.deals.iter()
    }

    /// Deals currently in `status`, in index order.
    pub fn with_status(&self, status: DealStatus) -> impl Iterator<Item = &Deal> {
        self.deals.iter().filter(move |d| d.status == status)
    }

    fn slot(&self, id: DealId) -> Option<usize> {
        usize::try_from(id.0)
            .ok()
            .filter(|&slot| slot < self.deals.len())
    }

    fn out_of_range(&self, id: DealId) -> OtcError {
        OtcError::IndexOutOfRange {
            index: id.0,
            len: self.count(),
        }
    }
}

impl Default for DealRegistry {
    fn default() -> Self {
        Self::new()
    }
}
