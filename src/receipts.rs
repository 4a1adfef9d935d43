//! Client-side reconciliation of borrow/reservation records.
//!
//! The backend returns every request in the system; nothing is filtered by
//! caller. Records from the two collections identify their borrower through
//! different field subsets depending on how they were created, so matching is
//! done by intersecting two string sets: everything we know about the local
//! identity against every borrower-identifying field on the record.

use itertools::Itertools;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::model::storage::Profile;

/// Borrower-identifying keys on a record, tried in fixed order. Item and
/// room requests populate different subsets.
const BORROWER_KEYS: [&str; 4] = ["borrower_id", "user_id", "email", "name"];

/// Coerce a JSON scalar to its string form, so a numeric id 42 and the
/// string "42" compare equal.
fn coerce(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First non-null value among `keys`, in order.
fn first_present<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .find(|v| !v.is_null())
}

/// Everything the stored identity could look like on a record: the cached
/// user's id, email and name, the cached email, and the cached borrower id.
/// The display placeholder email never enters this set.
pub fn identity_candidates(
    user: Option<&Profile>,
    email: Option<&str>,
    borrower_id: Option<&str>,
) -> HashSet<String> {
    let mut candidates = HashSet::new();
    if let Some(user) = user {
        if let Some(id) = user.id.as_ref().and_then(coerce) {
            candidates.insert(id);
        }
        if let Some(email) = user.email.as_deref() {
            candidates.insert(email.to_owned());
        }
        if let Some(name) = user.name.as_deref() {
            candidates.insert(name.to_owned());
        }
    }
    if let Some(email) = email {
        candidates.insert(email.to_owned());
    }
    if let Some(id) = borrower_id {
        candidates.insert(id.to_owned());
    }
    candidates.retain(|c| !c.is_empty());
    candidates
}

/// A record belongs to the identity when any of its borrower fields, after
/// coercion, is in the candidate set.
pub fn matches_identity(record: &Value, candidates: &HashSet<String>) -> bool {
    BORROWER_KEYS
        .iter()
        .filter_map(|k| record.get(*k))
        .filter_map(coerce)
        .any(|field| candidates.contains(&field))
}

/// Keep the records that belong to the identity. An empty candidate set
/// means identity could not be established at all; the whole collection is
/// returned untouched rather than nothing.
pub fn filter_mine(records: Vec<Value>, candidates: &HashSet<String>) -> Vec<Value> {
    if candidates.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| matches_identity(r, candidates))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiptKind {
    Item,
    Room,
}

impl fmt::Display for ReceiptKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReceiptKind::Item => write!(f, "item"),
            ReceiptKind::Room => write!(f, "room"),
        }
    }
}

impl FromStr for ReceiptKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "item" => Ok(ReceiptKind::Item),
            "room" => Ok(ReceiptKind::Room),
            other => Err(format!("expected 'item' or 'room', got '{}'", other)),
        }
    }
}

/// One reconciled request, tagged with the collection it came from.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub kind: ReceiptKind,
    pub record: Value,
}

impl Receipt {
    pub fn new(kind: ReceiptKind, record: Value) -> Self {
        Receipt { kind, record }
    }

    pub fn id(&self) -> Option<String> {
        self.record.get("id").and_then(coerce)
    }

    pub fn borrower_name(&self) -> Option<String> {
        self.record.get("name").and_then(coerce)
    }

    pub fn date(&self) -> String {
        format_date_only(first_present(&self.record, &["date", "created_at"]))
    }

    pub fn time_in(&self) -> String {
        format_display_time(first_present(&self.record, &["time_in", "start_time"]))
    }

    pub fn time_out(&self) -> String {
        format_display_time(first_present(&self.record, &["time_out", "end_time"]))
    }
}

/// Filter both collections against the candidate set and concatenate them,
/// items first, each in backend order.
pub fn reconcile(
    item_records: Vec<Value>,
    room_records: Vec<Value>,
    candidates: &HashSet<String>,
) -> Vec<Receipt> {
    filter_mine(item_records, candidates)
        .into_iter()
        .map(|r| Receipt::new(ReceiptKind::Item, r))
        .chain(
            filter_mine(room_records, candidates)
                .into_iter()
                .map(|r| Receipt::new(ReceiptKind::Room, r)),
        )
        .collect_vec()
}

/// Date portion of a raw temporal field: everything before the `T` of an
/// ISO date-time, or before the space of a `date time` pair. Missing input
/// renders as "-"; non-string scalars pass through in string form.
pub fn format_date_only(raw: Option<&Value>) -> String {
    let raw = match raw {
        None | Some(Value::Null) => return "-".to_owned(),
        Some(Value::String(s)) => s,
        Some(other) => return other.to_string(),
    };
    if let Some(i) = raw.find('T') {
        raw[..i].to_owned()
    } else if let Some(i) = raw.find(' ') {
        raw[..i].to_owned()
    } else {
        raw.clone()
    }
}

/// Time portion of a raw temporal field, rendered 12-hour with an AM/PM
/// suffix. Accepts an ISO date-time, a `date time` pair, or a bare
/// `HH:mm[:ss]` string. Anything that does not split into an hour and a
/// minute is returned unchanged.
pub fn format_display_time(raw: Option<&Value>) -> String {
    let raw = match raw {
        None | Some(Value::Null) => return "-".to_owned(),
        Some(Value::String(s)) => s,
        Some(other) => return other.to_string(),
    };
    let time_part = if let Some(i) = raw.find('T') {
        let t = &raw[i + 1..];
        t.find('.').map(|dot| &t[..dot]).unwrap_or(t)
    } else if let Some(i) = raw.find(' ') {
        &raw[i + 1..]
    } else {
        raw.as_str()
    };

    let mut parts = time_part.split(':');
    let hour = parts.next().and_then(|h| h.parse::<u32>().ok());
    let minute = parts.next();
    match (hour, minute) {
        (Some(hour), Some(minute)) if !minute.is_empty() && minute.bytes().all(|b| b.is_ascii_digit()) => {
            let suffix = if hour < 12 { "AM" } else { "PM" };
            let display_hour = match hour % 12 {
                0 => 12,
                h => h,
            };
            format!("{}:{} {}", display_hour, minute, suffix)
        }
        _ => raw.clone(),
    }
}

/// Ids with a cancellation in flight. Updates replace the whole set instead
/// of mutating it, so every holder of a snapshot sees a consistent view.
#[derive(Debug, Clone, Default)]
pub struct PendingCancellations(HashSet<(ReceiptKind, String)>);

impl PendingCancellations {
    pub fn with(&self, kind: ReceiptKind, id: &str) -> Self {
        let mut set = self.0.clone();
        set.insert((kind, id.to_owned()));
        PendingCancellations(set)
    }

    pub fn without(&self, kind: ReceiptKind, id: &str) -> Self {
        let mut set = self.0.clone();
        set.remove(&(kind, id.to_owned()));
        PendingCancellations(set)
    }

    pub fn contains(&self, kind: ReceiptKind, id: &str) -> bool {
        self.0.contains(&(kind, id.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The working set of reconciled receipts plus cancellation bookkeeping.
///
/// Cancelling is a two-step sequence: `begin_cancel` marks the id in flight;
/// `cancel_succeeded` drops the record and clears the mark, `cancel_failed`
/// only clears the mark. Removal on success is optimistic and does not wait
/// for the server's view to settle. Cancelling the same id twice before the
/// first resolves is not deduplicated.
#[derive(Debug, Default)]
pub struct ReceiptBoard {
    receipts: Vec<Receipt>,
    pending: PendingCancellations,
}

impl ReceiptBoard {
    pub fn new(receipts: Vec<Receipt>) -> Self {
        ReceiptBoard {
            receipts,
            pending: PendingCancellations::default(),
        }
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn is_pending(&self, kind: ReceiptKind, id: &str) -> bool {
        self.pending.contains(kind, id)
    }

    pub fn begin_cancel(&mut self, kind: ReceiptKind, id: &str) {
        self.pending = self.pending.with(kind, id);
    }

    pub fn cancel_succeeded(&mut self, kind: ReceiptKind, id: &str) {
        self.receipts
            .retain(|r| !(r.kind == kind && r.id().as_deref() == Some(id)));
        self.pending = self.pending.without(kind, id);
    }

    pub fn cancel_failed(&mut self, kind: ReceiptKind, id: &str) {
        self.pending = self.pending.without(kind, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(v: Value) -> Profile {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn numeric_and_string_ids_compare_equal() {
        let user = profile(json!({"id": 42}));
        let candidates = identity_candidates(Some(&user), None, None);
        assert!(candidates.contains("42"));

        let record = json!({"borrower_id": "42"});
        assert!(matches_identity(&record, &candidates));

        let record = json!({"user_id": 42});
        assert!(matches_identity(&record, &candidates));
    }

    #[test]
    fn any_field_match_is_enough() {
        let candidates = identity_candidates(None, Some("me@ssct.edu.ph"), Some("2021-0042"));

        // borrower_id is somebody else's, but the email matches
        let record = json!({"borrower_id": "9999", "email": "me@ssct.edu.ph"});
        assert!(matches_identity(&record, &candidates));

        let record = json!({"borrower_id": "9999", "email": "other@ssct.edu.ph"});
        assert!(!matches_identity(&record, &candidates));
    }

    #[test]
    fn empty_candidate_set_returns_everything_unfiltered() {
        // Deliberate permissive fallback: with no identity at all, showing
        // possibly-foreign records beats showing nothing.
        let records = vec![
            json!({"id": 1, "borrower_id": "a"}),
            json!({"id": 2, "borrower_id": "b"}),
            json!({"id": 3}),
        ];
        let filtered = filter_mine(records.clone(), &HashSet::new());
        assert_eq!(filtered, records);
    }

    #[test]
    fn candidates_skip_nulls_and_empty_strings() {
        let user = profile(json!({"id": null, "email": "", "name": "Alice"}));
        let candidates = identity_candidates(Some(&user), None, None);
        assert_eq!(candidates.len(), 1);
        assert!(candidates.contains("Alice"));
    }

    #[test]
    fn reconcile_tags_and_preserves_backend_order() {
        let candidates = identity_candidates(None, None, Some("7"));
        let items = vec![
            json!({"id": 10, "borrower_id": 7}),
            json!({"id": 11, "borrower_id": 8}),
            json!({"id": 12, "borrower_id": "7"}),
        ];
        let rooms = vec![json!({"id": 20, "user_id": 7})];

        let receipts = reconcile(items, rooms, &candidates);
        let tags: Vec<_> = receipts
            .iter()
            .map(|r| (r.kind, r.id().unwrap()))
            .collect();
        assert_eq!(
            tags,
            vec![
                (ReceiptKind::Item, "10".to_owned()),
                (ReceiptKind::Item, "12".to_owned()),
                (ReceiptKind::Room, "20".to_owned()),
            ]
        );
    }

    #[test]
    fn date_only_formatting() {
        assert_eq!(
            format_date_only(Some(&json!("2024-05-01T10:30:00"))),
            "2024-05-01"
        );
        assert_eq!(
            format_date_only(Some(&json!("2024-05-01 10:30:00"))),
            "2024-05-01"
        );
        assert_eq!(format_date_only(Some(&json!("2024-05-01"))), "2024-05-01");
        assert_eq!(format_date_only(Some(&Value::Null)), "-");
        assert_eq!(format_date_only(None), "-");
        assert_eq!(format_date_only(Some(&json!(20240501))), "20240501");
    }

    #[test]
    fn display_time_formatting() {
        assert_eq!(format_display_time(Some(&json!("14:05:00"))), "2:05 PM");
        assert_eq!(format_display_time(Some(&json!("00:15"))), "12:15 AM");
        assert_eq!(format_display_time(Some(&json!("12:30"))), "12:30 PM");
        assert_eq!(
            format_display_time(Some(&json!("2024-05-01T14:05:00.000000Z"))),
            "2:05 PM"
        );
        assert_eq!(
            format_display_time(Some(&json!("2024-05-01T09:05:00"))),
            "9:05 AM"
        );
        assert_eq!(
            format_display_time(Some(&json!("2024-05-01 18:45:00"))),
            "6:45 PM"
        );
        assert_eq!(format_display_time(None), "-");
        assert_eq!(format_display_time(Some(&Value::Null)), "-");
        assert_eq!(format_display_time(Some(&json!("not-a-time"))), "not-a-time");
    }

    #[test]
    fn record_accessors_fall_back_across_source_keys() {
        let receipt = Receipt::new(
            ReceiptKind::Room,
            json!({
                "id": 5,
                "created_at": "2024-06-02T08:00:00",
                "start_time": "08:00:00",
                "end_time": "10:30:00"
            }),
        );
        assert_eq!(receipt.date(), "2024-06-02");
        assert_eq!(receipt.time_in(), "8:00 AM");
        assert_eq!(receipt.time_out(), "10:30 AM");
    }

    #[test]
    fn cancel_lifecycle_success() {
        let mut board = ReceiptBoard::new(vec![
            Receipt::new(ReceiptKind::Item, json!({"id": 1})),
            Receipt::new(ReceiptKind::Item, json!({"id": 2})),
        ]);

        board.begin_cancel(ReceiptKind::Item, "1");
        assert!(board.is_pending(ReceiptKind::Item, "1"));

        board.cancel_succeeded(ReceiptKind::Item, "1");
        assert!(!board.is_pending(ReceiptKind::Item, "1"));
        let remaining: Vec<_> = board.receipts().iter().filter_map(Receipt::id).collect();
        assert_eq!(remaining, vec!["2".to_owned()]);
    }

    #[test]
    fn cancel_lifecycle_failure_keeps_record() {
        let mut board = ReceiptBoard::new(vec![Receipt::new(ReceiptKind::Room, json!({"id": 9}))]);

        board.begin_cancel(ReceiptKind::Room, "9");
        board.cancel_failed(ReceiptKind::Room, "9");

        assert!(!board.is_pending(ReceiptKind::Room, "9"));
        assert_eq!(board.receipts().len(), 1);
    }

    #[test]
    fn cancels_for_different_ids_are_independent() {
        let mut board = ReceiptBoard::new(vec![
            Receipt::new(ReceiptKind::Item, json!({"id": 1})),
            Receipt::new(ReceiptKind::Room, json!({"id": 1})),
        ]);

        board.begin_cancel(ReceiptKind::Item, "1");
        board.begin_cancel(ReceiptKind::Room, "1");
        assert!(board.is_pending(ReceiptKind::Room, "1"));

        // resolving the room cancel leaves the item cancel in flight
        board.cancel_succeeded(ReceiptKind::Room, "1");
        assert!(board.is_pending(ReceiptKind::Item, "1"));
        assert_eq!(board.receipts().len(), 1);
        assert_eq!(board.receipts()[0].kind, ReceiptKind::Item);
    }

    #[test]
    fn pending_updates_do_not_disturb_snapshots() {
        let pending = PendingCancellations::default();
        let with_one = pending.with(ReceiptKind::Item, "1");
        let with_two = with_one.with(ReceiptKind::Item, "2");

        assert!(pending.is_empty());
        assert_eq!(with_one.len(), 1);
        assert_eq!(with_two.len(), 2);
        assert!(with_two.without(ReceiptKind::Item, "1").contains(ReceiptKind::Item, "2"));
    }
}
