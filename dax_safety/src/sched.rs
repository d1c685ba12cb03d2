//! Deterministic priority dispatcher.
//!
//! Hosted-build rendition of preemptive interrupts: pending sources are
//! dispatched in strict ascending numeric priority, and the scan restarts
//! from the most urgent source after every handler, so anything a handler
//! raises is observed in the same drain — exactly the ordering a
//! priority-ceiling NVIC would produce, minus the asynchrony. Dispatch is
//! deferred entirely while global interrupts are disabled (critical
//! section).

use crate::interrupt::{INTERRUPT_COUNT, InterruptId, InterruptTable};
use dax_common::error::HalResult;
use tracing::{trace, warn};

/// Dispatch-loop backstop against handlers that re-raise forever.
const MAX_DISPATCH_PER_DRAIN: usize = 64;

/// Set of interrupt sources raised by a handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSet(u16);

impl PendingSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Add a source to the set.
    pub fn raise(&mut self, id: InterruptId) {
        self.0 |= 1 << id.index();
    }

    /// Whether the set contains `id`.
    pub const fn contains(&self, id: InterruptId) -> bool {
        self.0 & (1 << id.index()) != 0
    }

    /// Whether the set is empty.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Handler sink invoked by the scheduler.
///
/// A handler returns the set of sources it wants raised; the scheduler
/// merges them and re-scans from the most urgent source.
pub trait InterruptHandlers {
    /// Handle one interrupt source.
    fn handle(&mut self, id: InterruptId) -> PendingSet;
}

/// Deterministic ascending-priority dispatcher.
pub struct PriorityScheduler {
    table: InterruptTable,
    pending: [bool; INTERRUPT_COUNT],
}

impl PriorityScheduler {
    /// Create a scheduler over a validated table.
    ///
    /// Fails if the table violates the priority invariants; the scheduler
    /// must never run on an unvalidated table.
    pub fn new(table: InterruptTable) -> HalResult<Self> {
        table.validate()?;
        Ok(Self {
            table,
            pending: [false; INTERRUPT_COUNT],
        })
    }

    /// The table this scheduler dispatches from.
    pub fn table(&self) -> &InterruptTable {
        &self.table
    }

    /// Mark a source pending. Disabled sources are dropped.
    pub fn raise(&mut self, id: InterruptId) {
        if self.table.entry(id).enabled {
            self.pending[id.index()] = true;
        } else {
            trace!("dropping raise of disabled source {id:?}");
        }
    }

    /// Whether a source is currently pending.
    pub fn is_pending(&self, id: InterruptId) -> bool {
        self.pending[id.index()]
    }

    /// Drain all pending sources in priority order.
    ///
    /// Returns the number of handlers dispatched. With interrupts
    /// disabled nothing runs and the pending set is preserved.
    pub fn dispatch(
        &mut self,
        handlers: &mut dyn InterruptHandlers,
        interrupts_enabled: bool,
    ) -> usize {
        if !interrupts_enabled {
            return 0;
        }

        let mut dispatched = 0;
        while let Some(id) = self.next_pending() {
            self.pending[id.index()] = false;
            trace!("dispatch {id:?}");
            let raised = handlers.handle(id);
            dispatched += 1;

            for other in InterruptId::ALL {
                if raised.contains(other) {
                    self.raise(other);
                }
            }

            if dispatched >= MAX_DISPATCH_PER_DRAIN {
                warn!("dispatch backstop hit; {} sources still pending", self.pending_count());
                break;
            }
        }
        dispatched
    }

    /// The most urgent pending enabled source.
    fn next_pending(&self) -> Option<InterruptId> {
        InterruptId::ALL
            .into_iter()
            .filter(|id| self.pending[id.index()] && self.table.entry(*id).enabled)
            .min_by_key(|id| {
                let entry = self.table.entry(*id);
                (entry.priority, entry.sub_priority)
            })
    }

    fn pending_count(&self) -> usize {
        self.pending.iter().filter(|p| **p).count()
    }
}
