// name.rs — default display name generator for the client's name prompt
// (§12 supplemental feature, grounded on `NameGenerator.cpp`'s 26-entry
// three-letter name table and time-seeded RNG).

use rand::seq::SliceRandom;

const NAMES: [&str; 26] = [
    "ACE", "BOB", "CHA", "DAN", "EVE", "FAN", "GUS", "HAL", "IAN", "JAY", "KEN", "LEO", "MAX",
    "NED", "OLL", "PAZ", "QUY", "RON", "SAM", "TOM", "UDO", "VIN", "WES", "XAV", "YEN", "ZED",
];

/// A readable default player name, picked when the user leaves the name
/// prompt blank. Uses the process RNG rather than the original's
/// time-seeded `default_random_engine` since `rand::thread_rng` is already
/// seeded per-thread from the OS and the original's seeding was only ever
/// a stand-in for that.
pub fn default_player_name() -> String {
    let mut rng = rand::thread_rng();
    NAMES.choose(&mut rng).copied().unwrap_or("ACE").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_name_is_from_the_table() {
        let name = default_player_name();
        assert!(NAMES.contains(&name.as_str()));
    }
}
