//! The reconciliation store: one owner's bookmark list, merged from local
//! optimistic mutations and the remote change feed.
//!
//! Every mutation is total and keyed on [`BookmarkId`]. Replaying the same
//! operation yields the same state, which is what makes at-least-once feed
//! delivery safe.

use crate::model::{Bookmark, BookmarkId, OwnerId};
use std::collections::HashMap;

/// What a store mutation did. Mutations never fail; they report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new record was added.
    Inserted,
    /// A record with this id already exists; the existing one was kept.
    Duplicate,
    /// The stored record was replaced by a newer version.
    Updated,
    /// The incoming version was not newer than the stored one.
    Stale,
    /// The record was removed.
    Removed,
    /// No record with this id; nothing changed.
    Missing,
    /// Replayed insert for a record whose delete is in flight.
    Suppressed,
    /// The record belongs to another owner and was ignored.
    ForeignOwner,
}

impl Applied {
    /// True if the visible list changed.
    pub fn changed(self) -> bool {
        matches!(self, Applied::Inserted | Applied::Updated | Applied::Removed)
    }
}

/// Which version of a record wins when two versions of the same id meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepCurrent,
    TakeIncoming,
}

/// Last-writer-by-timestamp: the incoming version wins only if its
/// `updated_at` is strictly newer. Arrival order is not consulted.
pub fn resolve(current: &Bookmark, incoming: &Bookmark) -> Resolution {
    if incoming.updated_at > current.updated_at {
        Resolution::TakeIncoming
    } else {
        Resolution::KeepCurrent
    }
}

/// A mutation applied while a full reload is in flight, replayed on top of
/// the reload's snapshot.
#[derive(Debug, Clone)]
enum Change {
    LocalInsert(Bookmark),
    RemoteInserted(Bookmark),
    RemoteUpdated(Bookmark),
    Deleted(BookmarkId),
}

/// Ordered, deduplicated view of one owner's bookmarks.
///
/// Order is `created_at` descending with ties broken by id. Records removed
/// by an in-flight local delete are kept aside so a failed request can be
/// rolled back.
#[derive(Debug)]
pub struct ReconciliationStore {
    owner: OwnerId,
    bookmarks: Vec<Bookmark>,
    pending_deletes: HashMap<BookmarkId, Bookmark>,
    /// Changes since the current reload was issued; `None` when no reload
    /// is in flight.
    journal: Option<Vec<Change>>,
}

impl ReconciliationStore {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            bookmarks: Vec::new(),
            pending_deletes: HashMap::new(),
            journal: None,
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    pub fn get(&self, id: &BookmarkId) -> Option<&Bookmark> {
        self.bookmarks.iter().find(|b| &b.id == id)
    }

    pub fn contains(&self, id: &BookmarkId) -> bool {
        self.position(id).is_some()
    }

    pub fn is_pending_delete(&self, id: &BookmarkId) -> bool {
        self.pending_deletes.contains_key(id)
    }

    /// Replace the contents with an authoritative list from the record store.
    ///
    /// Foreign-owner records are dropped, duplicate ids collapse to the newest
    /// version, and records with an in-flight delete stay hidden. Returns the
    /// resulting length.
    pub fn replace_all(&mut self, records: Vec<Bookmark>) -> usize {
        let mut by_id: HashMap<BookmarkId, Bookmark> = HashMap::with_capacity(records.len());
        let mut foreign = 0usize;

        for record in records {
            if record.owner_id != self.owner {
                foreign += 1;
                continue;
            }
            if self.pending_deletes.contains_key(&record.id) {
                continue;
            }
            match by_id.get(&record.id) {
                Some(existing) if resolve(existing, &record) == Resolution::KeepCurrent => {}
                _ => {
                    by_id.insert(record.id.clone(), record);
                }
            }
        }

        if foreign > 0 {
            tracing::warn!(owner = %self.owner, foreign, "Dropped foreign-owner records from reload");
        }

        self.bookmarks = by_id.into_values().collect();
        self.bookmarks.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        self.bookmarks.len()
    }

    /// Start recording changes for a reload whose request is about to be
    /// sent. A second call restarts the journal: the newer request's
    /// snapshot already covers everything applied before it.
    pub fn begin_reload(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// True while a reload is in flight.
    pub fn is_reloading(&self) -> bool {
        self.journal.is_some()
    }

    /// The reload failed; stop recording.
    pub fn abandon_reload(&mut self) {
        self.journal = None;
    }

    /// Apply a reload's snapshot, then replay every change applied since
    /// [`begin_reload`](Self::begin_reload). The snapshot was taken when the
    /// request was sent, so later inserts, updates and deletes survive it.
    ///
    /// Without a reload in flight this is [`replace_all`](Self::replace_all).
    pub fn finish_reload(&mut self, records: Vec<Bookmark>) -> usize {
        let journal = self.journal.take().unwrap_or_default();
        self.replace_all(records);
        let replayed = journal.len();
        for change in journal {
            match change {
                Change::LocalInsert(record) => {
                    self.local_insert(record);
                }
                Change::RemoteInserted(record) => {
                    self.remote_inserted(record);
                }
                Change::RemoteUpdated(record) => {
                    self.remote_updated(record);
                }
                Change::Deleted(id) => {
                    self.remove(&id);
                }
            }
        }
        if replayed > 0 {
            tracing::debug!(replayed, "Replayed changes over reload snapshot");
        }
        self.bookmarks.len()
    }

    fn record(&mut self, change: impl FnOnce() -> Change) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(change());
        }
    }

    /// Insert the record returned by a successful create request.
    ///
    /// If the change feed already delivered it, the existing record wins.
    pub fn local_insert(&mut self, record: Bookmark) -> Applied {
        if record.owner_id != self.owner {
            return self.foreign(&record, "local_insert");
        }
        self.record(|| Change::LocalInsert(record.clone()));
        self.insert_if_absent(record)
    }

    /// Remove a record outright, with no rollback marker. The UI deletes
    /// through [`begin_delete`](Self::begin_delete) instead so a failed
    /// request can be undone.
    pub fn local_delete(&mut self, id: &BookmarkId) -> Applied {
        self.record(|| Change::Deleted(id.clone()));
        match self.remove(id) {
            Some(_) => Applied::Removed,
            None => Applied::Missing,
        }
    }

    /// Optimistically remove a record while its delete request is in flight.
    ///
    /// The removed record is kept as a pending marker for
    /// [`rollback_delete`](Self::rollback_delete).
    pub fn begin_delete(&mut self, id: &BookmarkId) -> Applied {
        match self.remove(id) {
            Some(record) => {
                // A confirmed delete must not come back with the snapshot
                self.record(|| Change::Deleted(id.clone()));
                self.pending_deletes.insert(id.clone(), record);
                Applied::Removed
            }
            None => Applied::Missing,
        }
    }

    /// The backend confirmed the delete; forget the pending marker.
    pub fn confirm_delete(&mut self, id: &BookmarkId) {
        self.pending_deletes.remove(id);
    }

    /// The delete request failed; put the record back.
    ///
    /// Does nothing if a remote delete for the same id arrived meanwhile.
    pub fn rollback_delete(&mut self, id: &BookmarkId) -> Applied {
        match self.pending_deletes.remove(id) {
            Some(record) => {
                self.record(|| Change::LocalInsert(record.clone()));
                self.insert_if_absent(record)
            }
            None => Applied::Missing,
        }
    }

    /// Apply a remote insert. Idempotent under replay.
    pub fn remote_inserted(&mut self, record: Bookmark) -> Applied {
        if record.owner_id != self.owner {
            return self.foreign(&record, "remote_inserted");
        }
        if self.pending_deletes.contains_key(&record.id) {
            tracing::debug!(id = %record.id, "Suppressed replayed insert for record being deleted");
            return Applied::Suppressed;
        }
        self.record(|| Change::RemoteInserted(record.clone()));
        self.insert_if_absent(record)
    }

    /// Apply a remote update: replace-if-present and newer.
    ///
    /// An update for an unknown id is dropped, so it can neither resurrect a
    /// deleted record nor create a phantom one.
    pub fn remote_updated(&mut self, record: Bookmark) -> Applied {
        if record.owner_id != self.owner {
            return self.foreign(&record, "remote_updated");
        }
        // Recorded even when unknown here: the snapshot may hold the record
        self.record(|| Change::RemoteUpdated(record.clone()));
        let Some(idx) = self.position(&record.id) else {
            tracing::debug!(id = %record.id, "Dropped update for unknown record");
            return Applied::Missing;
        };

        if resolve(&self.bookmarks[idx], &record) == Resolution::KeepCurrent {
            tracing::debug!(id = %record.id, "Ignored stale update");
            return Applied::Stale;
        }

        if self.bookmarks[idx].created_at == record.created_at {
            self.bookmarks[idx] = record;
        } else {
            self.bookmarks.remove(idx);
            self.insert_sorted(record);
        }
        Applied::Updated
    }

    /// Apply a remote delete. Idempotent.
    ///
    /// Also clears any pending local delete marker, so a later rollback cannot
    /// bring the record back.
    pub fn remote_deleted(&mut self, id: &BookmarkId) -> Applied {
        self.record(|| Change::Deleted(id.clone()));
        self.pending_deletes.remove(id);
        match self.remove(id) {
            Some(_) => Applied::Removed,
            None => Applied::Missing,
        }
    }

    fn insert_if_absent(&mut self, record: Bookmark) -> Applied {
        if self.contains(&record.id) {
            return Applied::Duplicate;
        }
        self.insert_sorted(record);
        Applied::Inserted
    }

    fn insert_sorted(&mut self, record: Bookmark) {
        let pos = match self
            .bookmarks
            .binary_search_by(|b| b.sort_key().cmp(&record.sort_key()))
        {
            Ok(pos) | Err(pos) => pos,
        };
        self.bookmarks.insert(pos, record);
    }

    fn remove(&mut self, id: &BookmarkId) -> Option<Bookmark> {
        self.position(id).map(|idx| self.bookmarks.remove(idx))
    }

    fn position(&self, id: &BookmarkId) -> Option<usize> {
        self.bookmarks.iter().position(|b| &b.id == id)
    }

    fn foreign(&self, record: &Bookmark, op: &'static str) -> Applied {
        tracing::warn!(
            op,
            id = %record.id,
            owner = %self.owner,
            record_owner = %record.owner_id,
            "Ignored record for another owner"
        );
        Applied::ForeignOwner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn bookmark(id: &str, created: i64) -> Bookmark {
        Bookmark {
            id: BookmarkId::new(id),
            owner_id: OwnerId::new("owner"),
            title: format!("Title {}", id),
            url: format!("https://example.com/{}", id),
            favicon_ref: None,
            created_at: ts(created),
            updated_at: ts(created),
        }
    }

    fn ids(store: &ReconciliationStore) -> Vec<&str> {
        store.bookmarks().iter().map(|b| b.id.as_str()).collect()
    }

    fn store() -> ReconciliationStore {
        ReconciliationStore::new(OwnerId::new("owner"))
    }

    #[test]
    fn test_orders_newest_first_with_id_tiebreak() {
        let mut s = store();
        s.remote_inserted(bookmark("b", 10));
        s.remote_inserted(bookmark("c", 20));
        s.remote_inserted(bookmark("a", 10));
        assert_eq!(ids(&s), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_local_insert_then_remote_insert_is_single() {
        let mut s = store();
        assert_eq!(s.local_insert(bookmark("1", 1)), Applied::Inserted);
        assert_eq!(s.remote_inserted(bookmark("1", 1)), Applied::Duplicate);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_remote_insert_then_local_insert_keeps_existing() {
        let mut s = store();
        let mut remote = bookmark("1", 1);
        remote.title = "from feed".to_string();
        s.remote_inserted(remote);

        let mut local = bookmark("1", 1);
        local.title = "from response".to_string();
        assert_eq!(s.local_insert(local), Applied::Duplicate);
        assert_eq!(s.bookmarks()[0].title, "from feed");
    }

    #[test]
    fn test_delete_race_second_delete_is_noop() {
        let mut s = store();
        s.remote_inserted(bookmark("1", 1));
        assert_eq!(s.remote_deleted(&"1".into()), Applied::Removed);
        assert_eq!(s.local_delete(&"1".into()), Applied::Missing);
        assert!(s.is_empty());
    }

    #[test]
    fn test_local_delete_cannot_be_rolled_back() {
        let mut s = store();
        s.local_insert(bookmark("1", 1));
        assert_eq!(s.local_delete(&"1".into()), Applied::Removed);
        assert!(!s.is_pending_delete(&"1".into()));
        assert_eq!(s.rollback_delete(&"1".into()), Applied::Missing);
        assert!(s.is_empty());
    }

    #[test]
    fn test_update_replaces_only_when_newer() {
        let mut s = store();
        s.remote_inserted(bookmark("1", 1));

        let mut newer = bookmark("1", 1);
        newer.title = "renamed".to_string();
        newer.updated_at = ts(5);
        assert_eq!(s.remote_updated(newer), Applied::Updated);

        let mut older = bookmark("1", 1);
        older.title = "stale".to_string();
        older.updated_at = ts(3);
        assert_eq!(s.remote_updated(older), Applied::Stale);

        let mut equal = bookmark("1", 1);
        equal.title = "same stamp".to_string();
        equal.updated_at = ts(5);
        assert_eq!(s.remote_updated(equal), Applied::Stale);

        assert_eq!(s.bookmarks()[0].title, "renamed");
    }

    #[test]
    fn test_update_for_unknown_id_is_dropped() {
        let mut s = store();
        assert_eq!(s.remote_updated(bookmark("ghost", 1)), Applied::Missing);
        assert!(s.is_empty());
    }

    #[test]
    fn test_update_after_delete_does_not_resurrect() {
        let mut s = store();
        s.remote_inserted(bookmark("1", 1));
        s.local_delete(&"1".into());

        let mut update = bookmark("1", 1);
        update.updated_at = ts(100);
        assert_eq!(s.remote_updated(update), Applied::Missing);
        assert_eq!(s.remote_deleted(&"1".into()), Applied::Missing);
        assert!(s.is_empty());

        assert_eq!(s.remote_inserted(bookmark("1", 1)), Applied::Inserted);
    }

    #[test]
    fn test_update_with_new_created_at_repositions() {
        let mut s = store();
        s.remote_inserted(bookmark("a", 10));
        s.remote_inserted(bookmark("b", 20));

        let mut moved = bookmark("a", 30);
        moved.updated_at = ts(31);
        s.remote_updated(moved);
        assert_eq!(ids(&s), vec!["a", "b"]);
    }

    #[test]
    fn test_foreign_owner_ignored_everywhere() {
        let mut s = store();
        let mut foreign = bookmark("x", 1);
        foreign.owner_id = OwnerId::new("intruder");

        assert_eq!(s.remote_inserted(foreign.clone()), Applied::ForeignOwner);
        assert_eq!(s.local_insert(foreign.clone()), Applied::ForeignOwner);
        assert_eq!(s.remote_updated(foreign.clone()), Applied::ForeignOwner);
        assert_eq!(s.replace_all(vec![foreign, bookmark("y", 2)]), 1);
        assert_eq!(ids(&s), vec!["y"]);
    }

    #[test]
    fn test_rollback_restores_record() {
        let mut s = store();
        s.remote_inserted(bookmark("1", 1));
        s.remote_inserted(bookmark("2", 2));

        assert_eq!(s.begin_delete(&"1".into()), Applied::Removed);
        assert!(s.is_pending_delete(&"1".into()));
        assert_eq!(ids(&s), vec!["2"]);

        assert_eq!(s.rollback_delete(&"1".into()), Applied::Inserted);
        assert!(!s.is_pending_delete(&"1".into()));
        assert_eq!(ids(&s), vec!["2", "1"]);
    }

    #[test]
    fn test_rollback_after_remote_delete_stays_deleted() {
        let mut s = store();
        s.remote_inserted(bookmark("1", 1));
        s.begin_delete(&"1".into());
        s.remote_deleted(&"1".into());

        assert_eq!(s.rollback_delete(&"1".into()), Applied::Missing);
        assert!(s.is_empty());
    }

    #[test]
    fn test_replayed_insert_suppressed_while_delete_pending() {
        let mut s = store();
        s.remote_inserted(bookmark("1", 1));
        s.begin_delete(&"1".into());
        assert_eq!(s.remote_inserted(bookmark("1", 1)), Applied::Suppressed);
        assert!(s.is_empty());

        s.confirm_delete(&"1".into());
        assert!(!s.is_pending_delete(&"1".into()));
    }

    #[test]
    fn test_replace_all_dedups_and_hides_pending() {
        let mut s = store();
        s.remote_inserted(bookmark("gone", 5));
        s.begin_delete(&"gone".into());

        let mut newer = bookmark("1", 1);
        newer.title = "newer".to_string();
        newer.updated_at = ts(9);

        let len = s.replace_all(vec![bookmark("1", 1), newer, bookmark("gone", 5), bookmark("2", 2)]);
        assert_eq!(len, 2);
        assert_eq!(ids(&s), vec!["2", "1"]);
        assert_eq!(s.get(&"1".into()).map(|b| b.title.as_str()), Some("newer"));
    }

    #[test]
    fn test_finish_reload_replays_in_flight_changes() {
        let mut s = store();
        s.begin_reload();
        s.remote_inserted(bookmark("feed", 50));
        s.local_insert(bookmark("saved", 60));
        s.remote_deleted(&"dropped".into());

        let len = s.finish_reload(vec![bookmark("old", 1), bookmark("dropped", 2)]);
        assert_eq!(len, 3);
        assert_eq!(ids(&s), vec!["saved", "feed", "old"]);
        assert!(!s.is_reloading());
    }

    #[test]
    fn test_finish_reload_without_begin_is_replace() {
        let mut s = store();
        s.remote_inserted(bookmark("stale", 5));
        assert_eq!(s.finish_reload(vec![bookmark("old", 1)]), 1);
        assert_eq!(ids(&s), vec!["old"]);
    }

    #[test]
    fn test_abandoned_reload_stops_recording() {
        let mut s = store();
        s.begin_reload();
        s.remote_inserted(bookmark("a", 1));
        s.abandon_reload();
        assert!(!s.is_reloading());

        // A later snapshot is taken as-is
        s.finish_reload(vec![bookmark("b", 2)]);
        assert_eq!(ids(&s), vec!["b"]);
    }

    #[test]
    fn test_changed_flag() {
        assert!(Applied::Inserted.changed());
        assert!(Applied::Removed.changed());
        assert!(!Applied::Duplicate.changed());
        assert!(!Applied::Stale.changed());
    }
}
