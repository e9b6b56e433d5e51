//! # Model Artifacts
//!
//! Immutable snapshots of fitted models, one per fit.
//!
//! [`FileArtifactStore`] keeps one JSON file per artifact, named
//! `{timestamp}_{ticker}.json`. The timestamp is fixed-width UTC without
//! colons (`2024-01-05T10-30-12.123456Z`), so lexicographic order of names
//! equals chronological order. Callers never see the directory layout: they
//! go through [`ArtifactStore::save`], [`ArtifactStore::load_latest`] and
//! [`ArtifactStore::list`].

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::clock::Clock;
use crate::model::FittedState;
use crate::{ForecastError, Ticker};

const FILE_TIMESTAMP: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]-[minute]-[second].[subsecond digits:6]Z"
);
const EXTENSION: &str = "json";
/// Same-microsecond saves shift forward instead of overwriting.
const MAX_NAME_COLLISIONS: u32 = 1_000;

/// A persisted fit of one ticker's volatility model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub ticker: Ticker,
    #[serde(with = "time::serde::rfc3339")]
    pub fit_timestamp: OffsetDateTime,
    pub state: FittedState,
}

impl ModelArtifact {
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            ticker: self.ticker.clone(),
            fit_timestamp: self.fit_timestamp,
        }
    }
}

/// Identity of a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ArtifactKey {
    pub ticker: Ticker,
    #[serde(with = "time::serde::rfc3339")]
    pub fit_timestamp: OffsetDateTime,
}

impl ArtifactKey {
    /// Calendar date (UTC) the fit happened on.
    pub fn fit_date(&self) -> Date {
        self.fit_timestamp.to_offset(UtcOffset::UTC).date()
    }

    /// `{timestamp}_{ticker}.json`
    pub fn file_name(&self) -> Result<String, ForecastError> {
        let stamp = self
            .fit_timestamp
            .to_offset(UtcOffset::UTC)
            .format(FILE_TIMESTAMP)
            .map_err(|error| ForecastError::storage(format!("artifact timestamp: {error}")))?;
        Ok(format!("{stamp}_{}.{EXTENSION}", self.ticker))
    }

    fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(EXTENSION)?.strip_suffix('.')?;
        let (stamp, ticker) = stem.split_once('_')?;
        let timestamp = PrimitiveDateTime::parse(stamp, FILE_TIMESTAMP).ok()?;
        Some(Self {
            ticker: Ticker::parse(ticker).ok()?,
            fit_timestamp: timestamp.assume_utc(),
        })
    }
}

/// Persistence of fitted models keyed by ticker and fit timestamp.
pub trait ArtifactStore: Send + Sync {
    /// Persist `state` as a new artifact stamped "now". Never overwrites.
    fn save(&self, ticker: &Ticker, state: &FittedState) -> Result<ModelArtifact, ForecastError>;

    /// The artifact with the greatest timestamp for exactly `ticker`, or
    /// [`ForecastError::NoArtifact`].
    fn load_latest(&self, ticker: &Ticker) -> Result<ModelArtifact, ForecastError>;

    /// Keys of every artifact for `ticker`, oldest first.
    fn list(&self, ticker: &Ticker) -> Result<Vec<ArtifactKey>, ForecastError>;
}

/// One JSON file per artifact in a single directory.
#[derive(Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `artifact` to a fresh file; `Ok(None)` when the name is taken.
    fn write_new(&self, artifact: &ModelArtifact) -> Result<Option<PathBuf>, ForecastError> {
        let path = self.dir.join(artifact.key().file_name()?);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == IoErrorKind::AlreadyExists => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let body = serde_json::to_vec_pretty(artifact)?;
        file.write_all(&body)?;
        file.sync_all()?;
        Ok(Some(path))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save(&self, ticker: &Ticker, state: &FittedState) -> Result<ModelArtifact, ForecastError> {
        fs::create_dir_all(&self.dir)?;

        let now = self.clock.now().to_offset(UtcOffset::UTC);
        // File names keep microseconds only.
        let now = now
            .replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
            .map_err(|error| ForecastError::storage(format!("artifact timestamp: {error}")))?;

        for attempt in 0..MAX_NAME_COLLISIONS {
            let artifact = ModelArtifact {
                ticker: ticker.clone(),
                fit_timestamp: now + Duration::microseconds(i64::from(attempt)),
                state: state.clone(),
            };
            if let Some(path) = self.write_new(&artifact)? {
                tracing::info!(%ticker, path = %path.display(), "saved model artifact");
                return Ok(artifact);
            }
        }

        Err(ForecastError::storage(format!(
            "could not find a free artifact name for '{ticker}'"
        )))
    }

    fn load_latest(&self, ticker: &Ticker) -> Result<ModelArtifact, ForecastError> {
        let latest = self
            .list(ticker)?
            .pop()
            .ok_or_else(|| ForecastError::NoArtifact {
                ticker: ticker.clone(),
            })?;

        let path = self.dir.join(latest.file_name()?);
        let body = fs::read(&path)?;
        let artifact: ModelArtifact = serde_json::from_slice(&body)?;
        if artifact.ticker != *ticker {
            return Err(ForecastError::storage(format!(
                "artifact {} belongs to '{}'",
                path.display(),
                artifact.ticker
            )));
        }

        tracing::debug!(%ticker, path = %path.display(), "loaded latest model artifact");
        Ok(artifact)
    }

    fn list(&self, ticker: &Ticker) -> Result<Vec<ArtifactKey>, ForecastError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Some(key) = ArtifactKey::from_file_name(&name) {
                if key.ticker == *ticker {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::test_support::sample_state;
    use crate::ErrorKind;
    use tempfile::tempdir;
    use time::macros::datetime;

    fn store_at(dir: &Path, now: OffsetDateTime) -> (FileArtifactStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        (FileArtifactStore::new(dir, clock.clone()), clock)
    }

    fn ticker(raw: &str) -> Ticker {
        Ticker::parse(raw).expect("ticker")
    }

    #[test]
    fn file_names_sort_chronologically_and_round_trip() {
        let key = ArtifactKey {
            ticker: ticker("BRK.B"),
            fit_timestamp: datetime!(2024-01-05 09:03:07.000042 UTC),
        };
        let name = key.file_name().expect("name");
        assert_eq!(name, "2024-01-05T09-03-07.000042Z_BRK.B.json");
        assert_eq!(ArtifactKey::from_file_name(&name), Some(key));
        assert!(ArtifactKey::from_file_name("notes.txt").is_none());
    }

    #[test]
    fn missing_directory_lists_nothing_and_load_fails_with_no_artifact() {
        let temp = tempdir().expect("tempdir");
        let (store, _) = store_at(&temp.path().join("models"), datetime!(2024-01-05 10:00 UTC));

        assert!(store.list(&ticker("IBM")).expect("list").is_empty());
        let error = store.load_latest(&ticker("IBM")).expect_err("nothing saved");
        assert_eq!(error.kind(), ErrorKind::NoArtifact);
    }

    #[test]
    fn latest_artifact_wins_after_same_day_fits() {
        let temp = tempdir().expect("tempdir");
        let (store, clock) = store_at(temp.path(), datetime!(2024-01-05 10:00 UTC));
        let ibm = ticker("IBM");

        let first = store.save(&ibm, &sample_state(0.10)).expect("first save");
        clock.advance(Duration::minutes(5));
        let second = store.save(&ibm, &sample_state(0.20)).expect("second save");

        let keys = store.list(&ibm).expect("list");
        assert_eq!(keys, vec![first.key(), second.key()]);
        assert!(keys.iter().all(|key| key.fit_date() == time::macros::date!(2024 - 01 - 05)));
        assert_eq!(store.load_latest(&ibm).expect("load"), second);
    }

    #[test]
    fn same_instant_saves_never_overwrite() {
        let temp = tempdir().expect("tempdir");
        let (store, _) = store_at(temp.path(), datetime!(2024-01-05 10:00 UTC));
        let ibm = ticker("IBM");

        let first = store.save(&ibm, &sample_state(0.10)).expect("first save");
        let second = store.save(&ibm, &sample_state(0.20)).expect("second save");

        assert!(second.fit_timestamp > first.fit_timestamp);
        assert_eq!(store.list(&ibm).expect("list").len(), 2);
        assert_eq!(store.load_latest(&ibm).expect("load").state, sample_state(0.20));
    }

    #[test]
    fn tickers_sharing_a_prefix_do_not_collide() {
        let temp = tempdir().expect("tempdir");
        let (store, clock) = store_at(temp.path(), datetime!(2024-01-05 10:00 UTC));

        store.save(&ticker("IBM"), &sample_state(0.10)).expect("IBM");
        clock.advance(Duration::seconds(1));
        store.save(&ticker("IBMX"), &sample_state(0.20)).expect("IBMX");
        clock.advance(Duration::seconds(1));
        store.save(&ticker("ibm"), &sample_state(0.30)).expect("ibm");

        assert_eq!(store.list(&ticker("IBM")).expect("list").len(), 1);
        assert_eq!(
            store.load_latest(&ticker("IBM")).expect("load").state,
            sample_state(0.10)
        );
    }
}
