//! Greedy line-of-sight shortcutting of state paths.

/// From each kept state jump to the furthest later state it can reach
/// directly. Endpoints are always kept. Consecutive input states are
/// assumed connectable; if one is not, it is kept as-is.
pub fn shortcut<T, F>(path: &[T], mut visible: F) -> Vec<T>
where
    T: Clone,
    F: FnMut(&T, &T) -> bool,
{
    if path.len() <= 2 {
        return path.to_vec();
    }

    let last = path.len() - 1;
    let mut out = Vec::with_capacity(path.len());
    out.push(path[0].clone());

    let mut i = 0;
    while i < last {
        let mut j = last;
        while j > i + 1 && !visible(&path[i], &path[j]) {
            j -= 1;
        }
        out.push(path[j].clone());
        i = j;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_collapses_to_endpoints() {
        let path = [0, 1, 2, 3, 4];
        assert_eq!(shortcut(&path, |_, _| true), vec![0, 4]);
    }

    #[test]
    fn blocked_jumps_keep_waypoints() {
        // 0 cannot see past 2; 2 sees everything
        let path = [0, 1, 2, 3, 4];
        let out = shortcut(&path, |a, b| !(*a == 0 && *b > 2));
        assert_eq!(out, vec![0, 2, 4]);
    }

    #[test]
    fn nothing_visible_keeps_input() {
        let path = [0, 1, 2, 3];
        assert_eq!(shortcut(&path, |_, _| false), vec![0, 1, 2, 3]);
    }

    #[test]
    fn short_paths_pass_through() {
        assert_eq!(shortcut(&[7, 8], |_, _| false), vec![7, 8]);
        assert!(shortcut::<i32, _>(&[], |_, _| true).is_empty());
    }
}
