use std::collections::HashSet;

/// Interleave per-user track lists round-robin: the first track of every
/// user, then the second of every user, and so on, in the given user order.
/// Users whose list is exhausted simply stop contributing. A track already
/// taken from another user is skipped without a replacement from the same
/// user, so when lists overlap the blend is shorter than the plain
/// round-robin count (and can fall short of `target`). Stops at `target`
/// tracks.
pub fn blend(per_user: &[(String, Vec<String>)], target: Option<usize>) -> Vec<String> {
    let limit = target.unwrap_or(usize::MAX);
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    let mut index = 0;
    'rounds: while out.len() < limit {
        let mut any_left = false;
        for (_, tracks) in per_user {
            let track = match tracks.get(index) {
                Some(t) => t,
                None => continue,
            };
            any_left = true;
            if !seen.insert(track.as_str()) {
                continue;
            }
            out.push(track.clone());
            if out.len() >= limit {
                break 'rounds;
            }
        }
        if !any_left {
            break;
        }
        index += 1;
    }
    out
}
