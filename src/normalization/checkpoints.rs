/// Parse a legacy comma-delimited checkpoint string into millisecond values.
///
/// A blank string means the run recorded no checkpoints and parses to an
/// empty list. Returns `None` when any fragment fails to parse as an
/// integer; the caller drops such rows rather than inserting garbage.
pub fn parse_checkpoints(raw: &str) -> Option<Vec<i32>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    trimmed
        .split(',')
        .map(|part| part.trim().parse::<i32>().ok())
        .collect()
}

/// Drop the trailing finish entry from a checkpoint list.
///
/// Legacy rows append the total time as a final pseudo-checkpoint; the
/// target schema stores the total separately. The entry is removed only
/// when it equals the record's total, so already-trimmed lists pass
/// through unchanged.
pub fn trim_finish(checkpoints: &mut Vec<i32>, total_time: i32) {
    if checkpoints.last() == Some(&total_time) {
        checkpoints.pop();
    }
}
