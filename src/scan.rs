use std::time::{Duration, Instant};

/// Proof that a poll was scheduled by the current scan generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// nothing pending, either never armed, cancelled, or a poll is in flight
    Idle,
    Scheduled { due: Instant, ticket: PollTicket },
    /// a code was found, nothing is scheduled until the loop is re-armed
    Stopped,
}

/// Self-rescheduling poll timer. At most one poll is pending at a time and
/// `cancel` invalidates every ticket handed out before it.
#[derive(Debug, Clone)]
pub struct ScanLoop {
    interval: Duration,
    generation: u64,
    state: ScanState,
    reschedules: u64,
}

impl ScanLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            generation: 0,
            state: ScanState::Idle,
            reschedules: 0,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ScanState {
        self.state
    }
    /// Re-polls scheduled after a miss since the loop was last armed.
    #[inline]
    pub fn reschedules(&self) -> u64 {
        self.reschedules
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            ScanState::Scheduled { due, .. } => Some(due),
            _ => None,
        }
    }

    /// Schedule the first poll of a fresh scan for `now`.
    pub fn arm(&mut self, now: Instant) {
        self.reschedules = 0;
        self.schedule(now);
    }

    /// Schedule the next poll one interval after `now`.
    pub fn reschedule(&mut self, now: Instant) {
        self.reschedules += 1;
        self.schedule(now + self.interval);
    }

    fn schedule(&mut self, due: Instant) {
        self.state = ScanState::Scheduled {
            due,
            ticket: PollTicket {
                generation: self.generation,
            },
        };
    }

    /// Hand out the pending poll if it is due. The loop is idle until the
    /// caller reschedules or stops it.
    pub fn take_due(&mut self, now: Instant) -> Option<PollTicket> {
        match self.state {
            ScanState::Scheduled { due, ticket } if due <= now => {
                self.state = ScanState::Idle;
                Some(ticket)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn is_current(&self, ticket: PollTicket) -> bool {
        ticket.generation == self.generation
    }

    pub fn stop(&mut self) {
        self.state = ScanState::Stopped;
    }

    pub fn cancel(&mut self) {
        self.generation += 1;
        self.state = ScanState::Idle;
    }
}
