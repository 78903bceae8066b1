//! Bounded waiting for interrupt-driven transfers
//!
//! The engines never time out: a blocked bus keeps an async transfer armed
//! forever. This layer sits above them and turns "wait for the handle to go
//! idle" into an operation that gives up, cancels the transfer and reports
//! [`TransferError::Timeout`] once a [`Deadline`] expires.
//!
//! The clock source is left to the caller. [`PollBudget`] counts polls and
//! is what host tests use; firmware binds a deadline to its timer.

/// Deadline layer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// The transfer did not finish before the deadline and was cancelled
    Timeout,
}

/// Something that eventually runs out
pub trait Deadline {
    /// Whether the deadline has passed
    ///
    /// Called once per poll, so implementations may count calls.
    fn expired(&mut self) -> bool;
}

impl<D: Deadline + ?Sized> Deadline for &mut D {
    fn expired(&mut self) -> bool {
        (**self).expired()
    }
}

/// Deadline that expires after a fixed number of polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollBudget {
    remaining: u32,
}

impl PollBudget {
    /// Allow `polls` checks before expiring
    pub const fn new(polls: u32) -> Self {
        Self { remaining: polls }
    }

    /// Polls left before expiry
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Deadline for PollBudget {
    fn expired(&mut self) -> bool {
        match self.remaining.checked_sub(1) {
            Some(left) => {
                self.remaining = left;
                false
            }
            None => true,
        }
    }
}

/// A transfer handle that can be observed and aborted
pub trait Cancellable {
    /// No transfer is armed in either direction
    fn is_idle(&self) -> bool;

    /// Abort every armed transfer without reporting completion
    fn cancel(&mut self);
}

/// Wait until `handle` is idle or `deadline` expires
///
/// The handle is checked before the deadline on every poll, so a transfer
/// that completes on the last allowed poll still succeeds. On expiry the
/// handle is cancelled before the error is returned.
pub fn wait_idle<C, D>(handle: &mut C, deadline: &mut D) -> Result<(), TransferError>
where
    C: Cancellable + ?Sized,
    D: Deadline + ?Sized,
{
    loop {
        if handle.is_idle() {
            return Ok(());
        }
        if deadline.expired() {
            handle.cancel();
            #[cfg(feature = "defmt")]
            defmt::debug!("transfer timed out, cancelled");
            return Err(TransferError::Timeout);
        }
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stuck {
        idle: bool,
        cancelled: bool,
    }

    impl Cancellable for Stuck {
        fn is_idle(&self) -> bool {
            self.idle || self.cancelled
        }

        fn cancel(&mut self) {
            self.cancelled = true;
        }
    }

    /// Each poll moves the shared busy counter towards idle
    struct Ticking<'a> {
        inner: PollBudget,
        target: &'a core::cell::Cell<u32>,
    }

    impl Deadline for Ticking<'_> {
        fn expired(&mut self) -> bool {
            self.target.set(self.target.get().saturating_sub(1));
            self.inner.expired()
        }
    }

    #[test]
    fn test_budget_counts_polls() {
        let mut budget = PollBudget::new(2);
        assert!(!budget.expired());
        assert!(!budget.expired());
        assert!(budget.expired());
        assert!(budget.expired());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_zero_budget_expires_immediately() {
        assert!(PollBudget::new(0).expired());
    }

    #[test]
    fn test_idle_handle_needs_no_budget() {
        let mut handle = Stuck {
            idle: true,
            cancelled: false,
        };
        let mut budget = PollBudget::new(0);
        assert_eq!(wait_idle(&mut handle, &mut budget), Ok(()));
        assert!(!handle.cancelled);
    }

    #[test]
    fn test_expiry_cancels() {
        let mut handle = Stuck {
            idle: false,
            cancelled: false,
        };
        let mut budget = PollBudget::new(5);
        assert_eq!(
            wait_idle(&mut handle, &mut budget),
            Err(TransferError::Timeout)
        );
        assert!(handle.cancelled);
        assert!(handle.is_idle());
    }

    #[test]
    fn test_completion_within_budget() {
        struct Shared<'a>(&'a core::cell::Cell<u32>);

        impl Cancellable for Shared<'_> {
            fn is_idle(&self) -> bool {
                self.0.get() == 0
            }

            fn cancel(&mut self) {
                panic!("should not be cancelled");
            }
        }

        let busy = core::cell::Cell::new(3);
        let mut handle = Shared(&busy);
        let mut deadline = Ticking {
            inner: PollBudget::new(3),
            target: &busy,
        };
        assert_eq!(wait_idle(&mut handle, &mut deadline), Ok(()));
        assert_eq!(deadline.inner.remaining(), 0);
    }
}
