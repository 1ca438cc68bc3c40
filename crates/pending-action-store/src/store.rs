//! File-backed pending-action store.

use crate::{StoreError, StoreResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use locker_protocol_types::{ActionKind, StudentId};
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One intent the authority has not acknowledged yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    #[serde(rename = "action")]
    pub kind: ActionKind,
    pub student_id: StudentId,
    #[serde(rename = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl PendingAction {
    /// Create an action stamped with the current time.
    pub fn new(kind: ActionKind, student_id: StudentId) -> Self {
        Self {
            kind,
            student_id,
            created_at: Utc::now(),
        }
    }

    fn matches(&self, kind: ActionKind, student_id: &StudentId) -> bool {
        self.kind == kind && &self.student_id == student_id
    }
}

/// Accepts RFC 3339 and offset-less ISO 8601 (treated as UTC), the latter
/// being what older bridge installs wrote.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Decoded store file.
#[derive(Debug, Clone, Default)]
pub struct PendingDocument {
    pub pending: Vec<PendingAction>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Entries that could not be decoded and were left out of `pending`.
    pub skipped: usize,
}

/// File shape before the entries are decoded one by one.
#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    pending: Vec<serde_json::Value>,
    #[serde(default)]
    last_updated: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct PendingDocumentRef<'a> {
    pending: &'a [PendingAction],
    last_updated: DateTime<Utc>,
}

/// Pending-action store.
///
/// All operations take the internal lock, and persistence happens while it
/// is held, so the file always reflects some serial order of mutations.
pub struct PendingActionStore {
    path: PathBuf,
    actions: Mutex<Vec<PendingAction>>,
}

impl PendingActionStore {
    /// Open the store at `path`, loading whatever is there.
    ///
    /// A missing file starts empty. Entries that cannot be decoded are
    /// skipped; the original file is copied aside first and then rewritten
    /// with the readable entries. A file that cannot be read at all is
    /// moved aside and the store starts empty. Either way nothing on disk
    /// is overwritten before a copy exists.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut rewrite = false;

        let actions = match Self::load(&path) {
            Ok(Some(doc)) => {
                info!(
                    path = %path.display(),
                    count = doc.pending.len(),
                    "Loaded pending actions"
                );
                if doc.skipped > 0 {
                    match set_aside(&path, SetAside::Copy) {
                        Ok(aside) => {
                            warn!(
                                path = %path.display(),
                                copy = %aside.display(),
                                skipped = doc.skipped,
                                "Skipped unreadable pending actions, original kept"
                            );
                            rewrite = true;
                        }
                        Err(e) => error!(
                            path = %path.display(),
                            error = %e,
                            skipped = doc.skipped,
                            "Skipped unreadable pending actions and could not copy the file"
                        ),
                    }
                }
                doc.pending
            }
            Ok(None) => {
                debug!(path = %path.display(), "No pending-action file, starting empty");
                Vec::new()
            }
            Err(e) => {
                match set_aside(&path, SetAside::Move) {
                    Ok(aside) => warn!(
                        path = %path.display(),
                        moved_to = %aside.display(),
                        error = %e,
                        "Could not load pending actions, file moved aside, starting empty"
                    ),
                    Err(move_err) => error!(
                        path = %path.display(),
                        error = %e,
                        move_error = %move_err,
                        "Could not load pending actions or move the file aside, starting empty"
                    ),
                }
                Vec::new()
            }
        };

        let store = Self {
            path,
            actions: Mutex::new(actions),
        };
        if rewrite {
            let actions = store.actions.lock();
            store.persist_logged(&actions);
        }
        store
    }

    /// Read the persisted document, `None` when the file does not exist.
    ///
    /// Fails only when the file is unreadable or not a store document at
    /// all; single bad entries are counted in `skipped`.
    pub fn load(path: &Path) -> StoreResult<Option<PendingDocument>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let raw: RawDocument = serde_json::from_str(&content)?;

        let mut doc = PendingDocument {
            last_updated: raw
                .last_updated
                .as_ref()
                .and_then(|v| v.as_str())
                .and_then(|ts| parse_timestamp(ts).ok()),
            ..Default::default()
        };
        for (index, entry) in raw.pending.into_iter().enumerate() {
            match serde_json::from_value::<PendingAction>(entry) {
                Ok(action) => doc.pending.push(action),
                Err(e) => {
                    warn!(path = %path.display(), index, error = %e, "Unreadable pending action");
                    doc.skipped += 1;
                }
            }
        }
        Ok(Some(doc))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue an action and write the store through to disk.
    ///
    /// Persistence failures are logged; the action stays queued in memory.
    pub fn add(&self, kind: ActionKind, student_id: StudentId) -> PendingAction {
        let action = PendingAction::new(kind, student_id);

        let mut actions = self.actions.lock();
        actions.push(action.clone());
        self.persist_logged(&actions);

        info!(
            action = %action.kind,
            student_id = %action.student_id,
            pending = actions.len(),
            "Added pending action"
        );
        action
    }

    /// Remove the first action matching `kind` and `student_id`.
    ///
    /// Returns false, without touching the file, when nothing matched.
    pub fn remove(&self, kind: ActionKind, student_id: &StudentId) -> bool {
        let mut actions = self.actions.lock();
        let Some(index) = actions.iter().position(|a| a.matches(kind, student_id)) else {
            return false;
        };

        actions.remove(index);
        self.persist_logged(&actions);

        debug!(
            action = %kind,
            student_id = %student_id,
            pending = actions.len(),
            "Removed pending action"
        );
        true
    }

    /// Snapshot of all pending actions in insertion order.
    pub fn list(&self) -> Vec<PendingAction> {
        self.actions.lock().clone()
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.actions.lock().is_empty()
    }

    fn persist_logged(&self, actions: &[PendingAction]) {
        if let Err(e) = write_document(&self.path, actions) {
            error!(
                path = %self.path.display(),
                error = %e,
                "Could not save pending actions, keeping them in memory"
            );
        }
    }
}

enum SetAside {
    Copy,
    Move,
}

/// Preserve the file at `path` as `<name>.corrupt.<utc time>` next to it.
fn set_aside(path: &Path, how: SetAside) -> StoreResult<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| StoreError::InvalidPath(path.display().to_string()))?;
    let aside = path.with_file_name(format!(
        "{}.corrupt.{}",
        file_name.to_string_lossy(),
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
    ));
    match how {
        SetAside::Copy => {
            fs::copy(path, &aside)?;
        }
        SetAside::Move => fs::rename(path, &aside)?,
    }
    Ok(aside)
}

/// Replace the document at `path` atomically (temp file, fsync, rename).
fn write_document(path: &Path, actions: &[PendingAction]) -> StoreResult<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| StoreError::InvalidPath(path.display().to_string()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let document = PendingDocumentRef {
        pending: actions,
        last_updated: Utc::now(),
    };
    let payload = serde_json::to_string_pretty(&document)?;

    let tmp_path = dir.join(format!(
        "{}.tmp.{}",
        file_name.to_string_lossy(),
        Uuid::new_v4()
    ));

    let result = (|| -> StoreResult<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(payload.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
