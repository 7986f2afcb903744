//! Arbiter for the shared peripheral bus.
//!
//! The TFT and the SD controller sit on one physical SPI bus with different
//! pin assignments and clock setups. The invariant the whole system leans
//! on: at any instant the bus is configured for exactly one of the two, and
//! the other is held deselected. The arbiter is the only way to touch either
//! peripheral; callers get the bus through `with_sd`/`with_tft` and the
//! resting (TFT) configuration is restored on every exit path, early returns
//! and panics included, via a drop guard.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    /// The bus could not be reconfigured for the requested peripheral.
    #[error("peripheral bus switch failed")]
    Switch,
}

/// Which peripheral the bus is currently configured for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusOwner {
    Tft,
    Sd,
}

impl fmt::Display for BusOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusOwner::Tft => f.write_str("tft"),
            BusOwner::Sd => f.write_str("sd"),
        }
    }
}

/// Low-level pin/clock mux. Implemented over the real SPI peripheral on
/// hardware; the hosted build supplies [`LoopbackPort`].
pub trait BusPort {
    /// Reconfigure the bus for `owner`, deselecting the other chip.
    fn select(&mut self, owner: BusOwner) -> Result<(), BusError>;

    /// True iff an SD card is inserted and answers.
    fn card_present(&self) -> bool;
}

/// A no-op port for hosted builds and tests. Tracks the selection so tests
/// can assert the resting state, and counts switches.
#[derive(Default)]
pub struct LoopbackPort {
    pub owner: Option<BusOwner>,
    pub switches: u32,
    pub card_inserted: bool,
    /// When set, the next `select` fails (fault-injection hook).
    pub fail_next: bool,
}

impl LoopbackPort {
    pub fn with_card() -> Self {
        Self {
            card_inserted: true,
            ..Self::default()
        }
    }
}

impl BusPort for LoopbackPort {
    fn select(&mut self, owner: BusOwner) -> Result<(), BusError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(BusError::Switch);
        }
        self.owner = Some(owner);
        self.switches += 1;
        Ok(())
    }

    fn card_present(&self) -> bool {
        self.card_inserted
    }
}

/// The arbiter proper. Owns the port; nothing else in the workspace holds a
/// path to the peripherals.
pub struct BusArbiter {
    port: Box<dyn BusPort>,
    owner: BusOwner,
}

impl BusArbiter {
    /// Wrap a port. The bus starts (and rests) in TFT configuration.
    pub fn new(mut port: Box<dyn BusPort>) -> Result<Self, BusError> {
        port.select(BusOwner::Tft)?;
        Ok(Self {
            port,
            owner: BusOwner::Tft,
        })
    }

    pub fn owner(&self) -> BusOwner {
        self.owner
    }

    /// True iff a card is inserted and responds.
    pub fn available(&self) -> bool {
        self.port.card_present()
    }

    /// Run `f` with the bus configured for the SD controller. The bus is
    /// switched back to the TFT before this returns, no matter how `f`
    /// exits.
    pub fn with_sd<R>(&mut self, f: impl FnOnce(&mut dyn BusPort) -> R) -> Result<R, BusError> {
        self.scoped(BusOwner::Sd, f)
    }

    /// Symmetric to [`with_sd`](Self::with_sd). Rarely needed directly: the
    /// TFT owns the bus whenever nothing else does.
    pub fn with_tft<R>(&mut self, f: impl FnOnce(&mut dyn BusPort) -> R) -> Result<R, BusError> {
        self.scoped(BusOwner::Tft, f)
    }

    fn scoped<R>(
        &mut self,
        owner: BusOwner,
        f: impl FnOnce(&mut dyn BusPort) -> R,
    ) -> Result<R, BusError> {
        self.port.select(owner)?;
        self.owner = owner;
        tracing::trace!(target: "bus", %owner, "bus acquired");
        let mut guard = RestingGuard { arbiter: self };
        let out = f(guard.arbiter.port.as_mut());
        drop(guard);
        Ok(out)
    }
}

/// Restores the TFT configuration when dropped. A failed restore cannot be
/// reported from `drop`; it is logged and the next scoped acquisition will
/// retry the switch.
struct RestingGuard<'a> {
    arbiter: &'a mut BusArbiter,
}

impl Drop for RestingGuard<'_> {
    fn drop(&mut self) {
        if self.arbiter.owner != BusOwner::Tft {
            if self.arbiter.port.select(BusOwner::Tft).is_err() {
                tracing::error!(target: "bus", "failed to restore tft configuration");
            }
            self.arbiter.owner = BusOwner::Tft;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arbiter(card: bool) -> BusArbiter {
        let port = if card {
            LoopbackPort::with_card()
        } else {
            LoopbackPort::default()
        };
        BusArbiter::new(Box::new(port)).unwrap()
    }

    #[test]
    fn rests_on_tft_after_sd_scope() {
        let mut bus = arbiter(true);
        let seen = bus.with_sd(|_| "ok").unwrap();
        assert_eq!(seen, "ok");
        assert_eq!(bus.owner(), BusOwner::Tft);
    }

    #[test]
    fn restores_tft_even_when_closure_panics() {
        let bus = std::sync::Mutex::new(arbiter(true));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            bus.lock().unwrap().with_sd(|_| panic!("sd op exploded"))
        }));
        assert!(result.is_err());
        // Mutex is poisoned by the panic; the bus state itself must be sane.
        let bus = bus.into_inner().unwrap_or_else(|p| p.into_inner());
        assert_eq!(bus.owner(), BusOwner::Tft);
    }

    #[test]
    fn switch_failure_surfaces_as_error() {
        let mut port = LoopbackPort::with_card();
        port.fail_next = false;
        let mut bus = BusArbiter::new(Box::new(port)).unwrap();
        // Fault-inject through a fresh scope: make the *next* select fail.
        // LoopbackPort::fail_next is consumed by a single select call.
        // We rebuild with the fault armed instead, since the port is owned.
        let mut armed = LoopbackPort::with_card();
        armed.fail_next = true;
        // arming the very first select makes construction fail
        assert_eq!(
            BusArbiter::new(Box::new(armed)).err(),
            Some(BusError::Switch)
        );
        assert!(bus.with_sd(|_| ()).is_ok());
    }

    #[test]
    fn availability_tracks_card_presence() {
        assert!(arbiter(true).available());
        assert!(!arbiter(false).available());
    }
}
