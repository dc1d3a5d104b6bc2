//! A set of points in time, represented as a minimal union of non-overlapping, non-adjacent
//! closed millisecond-granularity intervals (§3 "TimeSet").
//!
//! Used by the routing/index optimizer (C5) to turn rollover-timestamp filters into the set of
//! concrete per-period index names that need to be searched.

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// A closed interval `[start, end]`, where either bound may be unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    start: Option<Millis>,
    end: Option<Millis>,
}

impl Interval {
    fn all() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    fn is_empty(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }

    /// Two intervals overlap or touch (are adjacent at millisecond granularity) and so should be
    /// merged into one.
    fn overlaps_or_touches(&self, other: &Interval) -> bool {
        let self_end_touches_other_start = match (self.end, other.start) {
            (Some(e), Some(s)) => e.saturating_add(1) >= s,
            _ => true,
        };
        let other_end_touches_self_start = match (other.end, self.start) {
            (Some(e), Some(s)) => e.saturating_add(1) >= s,
            _ => true,
        };
        self_end_touches_other_start && other_end_touches_self_start
    }

    fn merge(&self, other: &Interval) -> Interval {
        let start = match (self.start, other.start) {
            (None, _) | (_, None) => None,
            (Some(a), Some(b)) => Some(a.min(b)),
        };
        let end = match (self.end, other.end) {
            (None, _) | (_, None) => None,
            (Some(a), Some(b)) => Some(a.max(b)),
        };
        Interval { start, end }
    }

    fn intersect(&self, other: &Interval) -> Option<Interval> {
        let start = match (self.start, other.start) {
            (None, b) => b,
            (a, None) => a,
            (Some(a), Some(b)) => Some(a.max(b)),
        };
        let end = match (self.end, other.end) {
            (None, b) => b,
            (a, None) => a,
            (Some(a), Some(b)) => Some(a.min(b)),
        };
        let candidate = Interval { start, end };
        if candidate.is_empty() {
            None
        } else {
            Some(candidate)
        }
    }

    fn start_key(&self) -> Millis {
        self.start.unwrap_or(Millis::MIN)
    }
}

/// A minimal union of non-overlapping, non-adjacent closed intervals. `ALL` and `EMPTY` are
/// canonical singletons (an empty `Vec` always means `EMPTY`; a single all-unbounded interval
/// always means `ALL`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSet {
    intervals: Vec<Interval>,
}

impl TimeSet {
    pub fn empty() -> Self {
        Self { intervals: vec![] }
    }

    pub fn all() -> Self {
        Self {
            intervals: vec![Interval::all()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_all(&self) -> bool {
        matches!(self.intervals.as_slice(), [Interval { start: None, end: None }])
    }

    /// A single closed interval `[start, end]`; either bound may be omitted for unbounded.
    pub fn interval(start: Option<Millis>, end: Option<Millis>) -> Self {
        let interval = Interval { start, end };
        if interval.is_empty() {
            Self::empty()
        } else {
            Self {
                intervals: vec![interval],
            }
        }
    }

    fn from_sorted_merged(mut intervals: Vec<Interval>) -> Self {
        intervals.retain(|i| !i.is_empty());
        intervals.sort_by(|a, b| a.start_key().cmp(&b.start_key()));
        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) if last.overlaps_or_touches(&interval) => {
                    *last = last.merge(&interval);
                }
                _ => merged.push(interval),
            }
        }
        Self { intervals: merged }
    }

    pub fn union(&self, other: &TimeSet) -> TimeSet {
        let mut all = self.intervals.clone();
        all.extend(other.intervals.iter().cloned());
        Self::from_sorted_merged(all)
    }

    pub fn intersection(&self, other: &TimeSet) -> TimeSet {
        let mut result = vec![];
        for a in &self.intervals {
            for b in &other.intervals {
                if let Some(i) = a.intersect(b) {
                    result.push(i);
                }
            }
        }
        Self::from_sorted_merged(result)
    }

    pub fn negate(&self) -> TimeSet {
        if self.intervals.is_empty() {
            return TimeSet::all();
        }
        let mut result = vec![];
        let mut cursor: Option<Millis> = None; // exclusive lower bound of the next gap, None = unbounded
        let mut cursor_is_start = true;
        for interval in &self.intervals {
            match interval.start {
                None => {
                    cursor_is_start = false;
                }
                Some(start) => {
                    if cursor_is_start {
                        result.push(Interval {
                            start: None,
                            end: Some(start - 1),
                        });
                    } else if let Some(c) = cursor {
                        result.push(Interval {
                            start: Some(c + 1),
                            end: Some(start - 1),
                        });
                    }
                    cursor_is_start = false;
                }
            }
            cursor = interval.end;
            if interval.end.is_none() {
                // unbounded above: nothing more can follow a gap
                return Self::from_sorted_merged(result);
            }
        }
        if let Some(c) = cursor {
            result.push(Interval {
                start: Some(c + 1),
                end: None,
            });
        }
        Self::from_sorted_merged(result)
    }

    pub fn difference(&self, other: &TimeSet) -> TimeSet {
        self.intersection(&other.negate())
    }

    pub fn contains(&self, time: Millis) -> bool {
        self.intervals.iter().any(|i| {
            i.start.map_or(true, |s| s <= time) && i.end.map_or(true, |e| time <= e)
        })
    }

    /// The intervals as `(start, end)` pairs, for callers that need to expand a `TimeSet` into
    /// concrete per-period index names (§4.4).
    pub fn as_bounds(&self) -> Vec<(Option<Millis>, Option<Millis>)> {
        self.intervals.iter().map(|i| (i.start, i.end)).collect()
    }
}
