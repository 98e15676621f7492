// src/state.rs
//! Run state handed over by the host between runs, and the fixed timestamp format it uses.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// `YYYY-MM-DDTHH:MM:SS`, UTC, no zone suffix. Used for `to_ts` and the query window.
pub const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn parse_ts(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TS_FORMAT)
        .with_context(|| format!("timestamp {s:?} is not in {TS_FORMAT} format"))
}

/// Drop sub-second precision.
pub fn truncate_to_secs(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// State mapping persisted by the host. Only `to_ts` carries meaning; the final
/// checkpoint of a run replaces it wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncState {
    /// End of the last successful run's window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_ts: Option<String>,
}

impl SyncState {
    pub fn at(to: &NaiveDateTime) -> Self {
        Self {
            to_ts: Some(format_ts(to)),
        }
    }

    /// Parsed `to_ts`; `Ok(None)` when absent, `Err` when present but malformed.
    pub fn to_ts(&self) -> Result<Option<NaiveDateTime>> {
        self.to_ts.as_deref().map(parse_ts).transpose()
    }
}

/// Read a state file; a missing file is the empty state.
pub fn load_state(path: &Path) -> Result<SyncState> {
    match fs::read_to_string(path) {
        Ok(s) if s.trim().is_empty() => Ok(SyncState::default()),
        Ok(s) => serde_json::from_str(&s)
            .with_context(|| format!("parsing state file {}", path.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SyncState::default()),
        Err(e) => Err(e).with_context(|| format!("reading state file {}", path.display())),
    }
}

/// Write the state through a temp file + rename so a crash never leaves half a file.
pub fn save_state(path: &Path, state: &SyncState) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(state)?;
    let mut f =
        fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(json.as_bytes())?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ts_roundtrip_in_fixed_format() {
        let ts = parse_ts("2024-01-10T12:00:00").unwrap();
        assert_eq!(format_ts(&ts), "2024-01-10T12:00:00");
        assert!(parse_ts("2024-01-10 12:00:00").is_err());
        assert!(parse_ts("2024-01-10T12:00:00Z").is_err());
    }

    #[test]
    fn empty_state_serializes_as_empty_object() {
        let s = SyncState::default();
        assert_eq!(serde_json::to_string(&s).unwrap(), "{}");
        let parsed: SyncState = serde_json::from_str(r#"{"to_ts":"2024-01-08T00:00:00","extra":1}"#).unwrap();
        assert_eq!(parsed.to_ts.as_deref(), Some("2024-01-08T00:00:00"));
    }

    #[test]
    fn malformed_to_ts_is_an_error() {
        let s = SyncState {
            to_ts: Some("yesterday".into()),
        };
        assert!(s.to_ts().is_err());
        assert_eq!(SyncState::default().to_ts().unwrap(), None);
    }

    #[test]
    fn state_file_missing_then_saved() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("state.json");
        assert_eq!(load_state(&p).unwrap(), SyncState::default());

        let ts = parse_ts("2024-01-10T12:00:00").unwrap();
        save_state(&p, &SyncState::at(&ts)).unwrap();
        let back = load_state(&p).unwrap();
        assert_eq!(back.to_ts.as_deref(), Some("2024-01-10T12:00:00"));
    }
}
