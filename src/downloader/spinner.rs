// Loading indicator shown while a job runs. Purely cosmetic.

/// Text shown when no job is running
pub const IDLE_TEXT: &str = "Waiting...";

const FRAMES: [&str; 4] = ["Loading... -", "Loading... \\", "Loading... |", "Loading... /"];

/// Four-frame cyclic spinner
pub struct LoadingIndicator;

impl LoadingIndicator {
    pub fn initial_state() -> &'static str {
        FRAMES[0]
    }

    /// Frame after `state`; anything unknown restarts the cycle
    pub fn next(state: &str) -> &'static str {
        match FRAMES.iter().position(|f| *f == state) {
            Some(index) => FRAMES[(index + 1) % FRAMES.len()],
            None => FRAMES[0],
        }
    }
}
