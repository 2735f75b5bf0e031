// time.rs — monotonic wall-clock millisecond source shared by every timer
// in the transport (send_timer, accumulated_age, tick cadence).

use std::sync::OnceLock;
use std::time::Instant;

/// Milliseconds since process start. Never wraps within a realistic
/// process lifetime; callers comparing deadlines use plain subtraction.
pub fn now_millis() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_non_decreasing() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }
}
