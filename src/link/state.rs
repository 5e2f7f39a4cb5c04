//! Wi-Fi association state machine with bounded retries.
//!
//! ```text
//!               Start                Associated
//! Disconnected ──────▶ Associating ──────────────▶ Connected
//!      ▲                 │    ▲                       │
//!      │   failure and   │    │ failure and           │ LinkLost
//!      │   retries left  └────┘ retries left ◀────────┘
//!      │                 │
//!      │ Reset           │ retries exhausted
//!      └──── Failed ◀────┘
//! ```
//!
//! Pure logic: the caller performs the returned [`LinkAction`].

/// Association state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Associating,
    Connected,
    /// Retries exhausted. Terminal until [`LinkEvent::Reset`].
    Failed,
}

/// Input to the state machine, produced by the Wi-Fi driver or the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Begin associating.
    Start,
    /// Association and addressing completed.
    Associated,
    /// The pending association attempt failed.
    AssociationFailed,
    /// An established (or pending) association dropped.
    LinkLost,
    /// Leave `Failed` and return to `Disconnected`.
    Reset,
}

/// What the caller must do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Nothing to do.
    None,
    /// Issue one association attempt.
    Associate,
    /// Link is up: open channels, wake waiters.
    Online,
    /// Retries exhausted.
    GiveUp,
}

/// Association state plus the consecutive failure counter.
#[derive(Debug, Clone)]
pub struct LinkStateMachine {
    state: LinkState,
    retry_count: u32,
    max_retries: u32,
}

impl LinkStateMachine {
    pub const fn new(max_retries: u32) -> Self {
        Self {
            state: LinkState::Disconnected,
            retry_count: 0,
            max_retries,
        }
    }

    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    #[inline]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Apply one event.
    pub fn handle(&mut self, event: LinkEvent) -> LinkAction {
        use LinkEvent as E;
        use LinkState as S;

        match (self.state, event) {
            (S::Disconnected, E::Start) => {
                self.state = S::Associating;
                LinkAction::Associate
            }
            (S::Associating, E::Associated) => {
                self.state = S::Connected;
                self.retry_count = 0;
                LinkAction::Online
            }
            (S::Associating, E::AssociationFailed)
            | (S::Associating, E::LinkLost)
            | (S::Connected, E::LinkLost) => self.fail(),
            (S::Failed, E::Reset) => {
                self.state = S::Disconnected;
                self.retry_count = 0;
                LinkAction::None
            }
            _ => LinkAction::None,
        }
    }

    /// Count a failure; retry while under the limit.
    fn fail(&mut self) -> LinkAction {
        self.state = LinkState::Disconnected;
        self.retry_count = self.retry_count.saturating_add(1);
        if self.retry_count < self.max_retries {
            self.state = LinkState::Associating;
            LinkAction::Associate
        } else {
            self.state = LinkState::Failed;
            LinkAction::GiveUp
        }
    }
}
