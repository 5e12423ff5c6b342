//! Interface the host simulation implements for operator handlers.
//!
//! Handlers never reach into simulation internals; every query and every
//! side effect goes through a [`GameContext`].

/// Mission-visible lifecycle of a single ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShipStatus {
    /// Listed in the mission but not yet in the battlespace.
    NotArrived,
    Present,
    Destroyed,
    Departed,
}

impl ShipStatus {
    pub fn has_arrived(self) -> bool {
        !matches!(self, ShipStatus::NotArrived)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShipStatus::NotArrived => "not_arrived",
            ShipStatus::Present => "present",
            ShipStatus::Destroyed => "destroyed",
            ShipStatus::Departed => "departed",
        }
    }
}

pub trait GameContext {
    /// Mission clock in seconds.
    fn current_time(&self) -> f64;

    /// `None` when the host has never heard of the ship.
    fn ship_status(&self, name: &str) -> Option<ShipStatus>;

    fn ship_exists(&self, name: &str) -> bool {
        matches!(self.ship_status(name), Some(ShipStatus::Present))
    }

    /// Remaining hull strength as a percentage, when the ship is present.
    fn ship_hull(&self, name: &str) -> Option<f64>;

    /// `Some(true)` once any ship of the wing has arrived.
    fn wing_arrived(&self, name: &str) -> Option<bool>;

    /// Fraction in `0.0..=1.0` of the wing's ships that were destroyed.
    fn wing_destroyed_fraction(&self, name: &str) -> Option<f64>;

    fn send_message(&mut self, persona: &str, text: &str);

    /// Returns false when the wing is unknown or already in play.
    fn spawn_wing(&mut self, name: &str) -> bool;

    /// Returns false when the ship is not present.
    fn destroy_ship(&mut self, name: &str) -> bool;

    /// Uniform integer in `low..=high`.
    fn random_int(&mut self, low: i64, high: i64) -> i64;
}
