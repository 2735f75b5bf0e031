// leaderboard.rs — top-N score table with binary persistence (§4.8).
//
// Write-to-temp-then-rename on save, as the spec recommends even though
// its own reference implementation doesn't bother (§6 "Persisted state").
// All operations take the leaderboard mutex in the caller (ast-server's
// ServerContext); this type itself has no interior locking.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

pub const MAX_SCORES: usize = 20;
const NAME_LEN: usize = 8;
const TIMESTAMP_LEN: usize = 20;
const RECORD_LEN: usize = 2 + NAME_LEN + 4 + TIMESTAMP_LEN; // id,name,score,timestamp

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEntry {
    pub id: u16,
    pub name: String,
    pub score: u32,
    pub timestamp: String,
}

#[derive(Debug, Default)]
pub struct Leaderboard {
    entries: Vec<ScoreEntry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    /// Insert a score. If the table has fewer than `MAX_SCORES` entries it
    /// is appended unconditionally; otherwise it replaces the last entry
    /// only if it beats it. The table is re-sorted strictly descending by
    /// score either way. Returns whether the entry was accepted.
    pub fn add(&mut self, id: u16, name: String, score: u32, timestamp: String) -> bool {
        let accepted = if self.entries.len() < MAX_SCORES {
            self.entries.push(ScoreEntry {
                id,
                name,
                score,
                timestamp,
            });
            true
        } else {
            let last = self.entries.last().unwrap();
            if score > last.score {
                *self.entries.last_mut().unwrap() = ScoreEntry {
                    id,
                    name,
                    score,
                    timestamp,
                };
                true
            } else {
                false
            }
        };

        if accepted {
            self.entries.sort_by(|a, b| b.score.cmp(&a.score));
        }
        accepted
    }

    pub fn top(&self, n: usize) -> Vec<String> {
        self.entries
            .iter()
            .take(n)
            .enumerate()
            .map(|(i, e)| format!("{}. {} - {}", i + 1, e.name, e.score))
            .collect()
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut buf = Vec::with_capacity(RECORD_LEN * self.entries.len());
        for e in &self.entries {
            buf.extend_from_slice(&e.id.to_le_bytes());
            let mut name = [0u8; NAME_LEN];
            let bytes = e.name.as_bytes();
            let n = bytes.len().min(NAME_LEN);
            name[..n].copy_from_slice(&bytes[..n]);
            buf.extend_from_slice(&name);
            buf.extend_from_slice(&e.score.to_le_bytes());
            let mut ts = [0u8; TIMESTAMP_LEN];
            let tb = e.timestamp.as_bytes();
            let n = tb.len().min(TIMESTAMP_LEN);
            ts[..n].copy_from_slice(&tb[..n]);
            buf.extend_from_slice(&ts);
        }

        let tmp = path.with_extension("tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&buf)?;
        }
        fs::rename(&tmp, path)
    }

    /// Truncated or short files leave the leaderboard empty and are not
    /// treated as fatal (§4.8).
    pub fn load(&mut self, path: &Path) -> io::Result<()> {
        self.entries.clear();
        let mut f = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;

        for chunk in buf.chunks(RECORD_LEN) {
            if chunk.len() < RECORD_LEN {
                break;
            }
            let id = u16::from_le_bytes([chunk[0], chunk[1]]);
            let name_end = chunk[2..2 + NAME_LEN]
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(NAME_LEN);
            let name = String::from_utf8_lossy(&chunk[2..2 + name_end]).into_owned();
            let score_off = 2 + NAME_LEN;
            let score = u32::from_le_bytes(chunk[score_off..score_off + 4].try_into().unwrap());
            let ts_off = score_off + 4;
            let ts_end = chunk[ts_off..ts_off + TIMESTAMP_LEN]
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(TIMESTAMP_LEN);
            let timestamp = String::from_utf8_lossy(&chunk[ts_off..ts_off + ts_end]).into_owned();
            self.entries.push(ScoreEntry {
                id,
                name,
                score,
                timestamp,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_strictly_descending_and_bounded() {
        let mut lb = Leaderboard::new();
        for i in 0..(MAX_SCORES + 5) {
            lb.add(i as u16, format!("p{i}"), (i as u32) * 10, "t".into());
        }
        assert!(lb.entries().len() <= MAX_SCORES);
        let scores: Vec<u32> = lb.entries().iter().map(|e| e.score).collect();
        let mut sorted = scores.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(scores, sorted);
    }

    #[test]
    fn full_table_rejects_non_beating_score() {
        let mut lb = Leaderboard::new();
        for i in 0..MAX_SCORES {
            lb.add(i as u16, "p".into(), 1000 - i as u32, "t".into());
        }
        let accepted = lb.add(999, "low".into(), 1, "t".into());
        assert!(!accepted);
        assert_eq!(lb.entries().len(), MAX_SCORES);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let mut lb = Leaderboard::new();
        lb.add(1, "alice".into(), 500, "2026-01-01T00:00:00Z".into());
        lb.add(2, "bob".into(), 300, "2026-01-02T00:00:00Z".into());

        let dir = std::env::temp_dir().join(format!("ast-leaderboard-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("leaderboard.bin");

        lb.save(&path).unwrap();

        let mut loaded = Leaderboard::new();
        loaded.load(&path).unwrap();
        assert_eq!(loaded.entries().len(), 2);
        assert_eq!(loaded.entries()[0].name, "alice");
        assert_eq!(loaded.entries()[0].score, 500);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_loads_empty_not_fatal() {
        let mut lb = Leaderboard::new();
        let path = std::env::temp_dir().join("ast-leaderboard-does-not-exist.bin");
        let _ = std::fs::remove_file(&path);
        lb.load(&path).unwrap();
        assert!(lb.entries().is_empty());
    }
}
