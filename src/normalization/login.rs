/// Canonical form of a legacy login: everything before the first `/`.
///
/// Several source tables suffix logins with a `/`-delimited qualifier; the
/// identity table stores the bare login only, so every lookup and every
/// registration must go through this.
pub fn canonical_login(raw: &str) -> &str {
    match raw.split_once('/') {
        Some((head, _)) => head,
        None => raw,
    }
}
