// Two-way latest-wins merge of progress maps

use super::models::ProgressMap;

/// Merge `remote` into a copy of `local`, keeping per book the record with the larger
/// `updated_at`. Ties keep the local record.
pub fn merge(local: &ProgressMap, remote: &ProgressMap) -> ProgressMap {
    let mut merged = local.clone();
    for (book_id, remote_rec) in remote.iter() {
        let remote_wins = match local.get(book_id) {
            None => true,
            Some(local_rec) => local_rec.updated_at < remote_rec.updated_at,
        };
        if remote_wins {
            merged.insert(book_id.clone(), remote_rec.clone());
        }
    }
    merged
}
