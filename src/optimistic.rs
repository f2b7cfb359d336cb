//! Local value that changes ahead of the collaborator confirming it.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Optimistic<T> {
    Idle(T),
    Pending { prior: T, proposed: T },
    Committed(T),
    RolledBack(T),
}

impl<T: Clone> Optimistic<T> {
    pub fn new(value: T) -> Self {
        Optimistic::Idle(value)
    }

    /// What the user should see right now.
    pub fn current(&self) -> &T {
        match self {
            Optimistic::Idle(v) | Optimistic::Committed(v) | Optimistic::RolledBack(v) => v,
            Optimistic::Pending { proposed, .. } => proposed,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Optimistic::Pending { .. })
    }

    /// Shows `proposed` immediately. Returns `false` if another change is
    /// still in flight.
    pub fn begin(&mut self, proposed: T) -> bool {
        if self.is_pending() {
            return false;
        }
        let prior = self.current().clone();
        *self = Optimistic::Pending { prior, proposed };
        true
    }

    pub fn commit(&mut self) {
        if let Optimistic::Pending { proposed, .. } = self {
            *self = Optimistic::Committed(proposed.clone());
        }
    }

    /// Restores the value from before [`Optimistic::begin`].
    pub fn roll_back(&mut self) {
        if let Optimistic::Pending { prior, .. } = self {
            *self = Optimistic::RolledBack(prior.clone());
        }
    }

    /// A confirmed value arrived from elsewhere. Ignored while pending so the
    /// in-flight change is not clobbered.
    pub fn sync(&mut self, value: T) {
        if !self.is_pending() {
            *self = Optimistic::Idle(value);
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Optimistic::Idle(_) => "idle",
            Optimistic::Pending { .. } => "pending",
            Optimistic::Committed(_) => "committed",
            Optimistic::RolledBack(_) => "rolled_back",
        }
    }
}
