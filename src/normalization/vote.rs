/// Map a raw karma magnitude onto the target scale.
///
/// The legacy store recorded one vote category at double weight: a ±6 there
/// means ±3 here. Every other magnitude passes through unchanged.
pub fn normalize_vote(score: i64) -> i64 {
    if score.abs() == 6 {
        score / 2
    } else {
        score
    }
}
