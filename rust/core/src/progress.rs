// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Advisory progress reporting.

/// Receives `(percent, message)` updates. Percent is clamped to `0..=100`.
/// Reporting carries no cancellation.
pub type ProgressCallback<'a> = &'a dyn Fn(u32, &str);

/// Callback that ignores every update.
pub fn no_progress(_percent: u32, _message: &str) {}

/// Percentage of `done` out of `total`, rounded down. An empty job is done.
pub fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent(0, 4), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(9, 3), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn callback_receives_updates() {
        let seen = RefCell::new(Vec::new());
        let record = |p: u32, m: &str| seen.borrow_mut().push((p, m.to_string()));
        let callback: ProgressCallback = &record;
        callback(50, "half");
        no_progress(10, "ignored");
        assert_eq!(seen.into_inner(), vec![(50, "half".to_string())]);
    }
}
