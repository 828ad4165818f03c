//! Power / duty-cycle modes (design spec §4.5 "Scanning & power").

/// Coarse power state the host application is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PowerMode {
    Foreground,
    Background,
    Idle,
}

/// The scan/connection policy a [`PowerMode`] maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DutyCycle {
    pub scan_window_ms: u32,
    pub scan_interval_ms: u32,
    pub max_connections: usize,
    pub duty_cycle_on: bool,
}

fn duty_cycle_for(mode: PowerMode) -> DutyCycle {
    match mode {
        PowerMode::Foreground => {
            DutyCycle { scan_window_ms: 300, scan_interval_ms: 300, max_connections: 20, duty_cycle_on: false }
        }
        PowerMode::Background => {
            DutyCycle { scan_window_ms: 300, scan_interval_ms: 2_000, max_connections: 8, duty_cycle_on: true }
        }
        PowerMode::Idle => {
            DutyCycle { scan_window_ms: 100, scan_interval_ms: 10_000, max_connections: 2, duty_cycle_on: true }
        }
    }
}

/// Tracks the current power mode and decides whether a requested
/// transition actually changes the duty-cycle policy.
pub struct PowerManager {
    mode: PowerMode,
}

impl PowerManager {
    pub fn new(initial: PowerMode) -> Self {
        Self { mode: initial }
    }

    pub fn mode(&self) -> PowerMode {
        self.mode
    }

    pub fn duty_cycle(&self) -> DutyCycle {
        duty_cycle_for(self.mode)
    }

    /// Transition to `mode`. Returns `true` if scanning should restart
    /// (the duty-cycle policy actually changed), `false` if this is a
    /// no-op transition that must not thrash the radio.
    pub fn transition(&mut self, mode: PowerMode) -> bool {
        let changed = duty_cycle_for(mode) != duty_cycle_for(self.mode);
        self.mode = mode;
        changed
    }
}

impl Default for PowerManager {
    fn default() -> Self {
        Self::new(PowerMode::Foreground)
    }
}
