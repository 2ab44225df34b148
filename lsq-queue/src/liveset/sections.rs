//! Track section index
//!
//! Resolves which sub-track of a continuously streamed item is playing at a
//! given position.
//!
//! **Design:**
//! - Sections form a doubly linked chain, ascending by start time
//! - Chain is stored in an arena; links are `SectionId` indices
//! - Index 0 is a sentinel head at -1 ms ("before the first labelled track")
//! - Resolution walks from the last resolved section towards the position,
//!   so cost grows with the distance moved, not with the chain length

use lsq_common::SubTrack;

/// Start offset of the sentinel head
pub const SENTINEL_START_MS: i64 = -1;

/// Arena index of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(usize);

impl SectionId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One timestamp-bounded section of a liveset
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSection {
    /// Offset from the start of the item (milliseconds)
    pub start_at_ms: i64,

    /// Sub-track playing from here on; None for the sentinel
    pub label: Option<SubTrack>,

    pub prev: Option<SectionId>,
    pub next: Option<SectionId>,
}

impl TrackSection {
    /// `start ≤ p < next.start`, or `start ≤ p` for the last section
    fn contains(&self, position_ms: i64, next_start: Option<i64>) -> bool {
        position_ms >= self.start_at_ms && next_start.map_or(true, |n| position_ms < n)
    }
}

/// Immutable section chain for one loaded item
#[derive(Debug, Clone)]
pub struct TrackSectionIndex {
    sections: Vec<TrackSection>,
}

impl TrackSectionIndex {
    /// Build the chain from an item's tracklist
    ///
    /// Entries without a timestamp are dropped; the rest are sorted by
    /// timestamp (stable, so equal timestamps keep tracklist order).
    pub fn build(tracks: &[SubTrack]) -> Self {
        let mut timed: Vec<(i64, &SubTrack)> = tracks
            .iter()
            .filter_map(|t| t.timestamp_ms().map(|ms| (ms, t)))
            .collect();
        timed.sort_by_key(|(ms, _)| *ms);

        let mut sections = Vec::with_capacity(timed.len() + 1);
        sections.push(TrackSection {
            start_at_ms: SENTINEL_START_MS,
            label: None,
            prev: None,
            next: None,
        });

        for (i, (start_at_ms, track)) in timed.into_iter().enumerate() {
            let id = i + 1;
            sections[id - 1].next = Some(SectionId(id));
            sections.push(TrackSection {
                start_at_ms,
                label: Some(track.clone()),
                prev: Some(SectionId(id - 1)),
                next: None,
            });
        }

        Self { sections }
    }

    /// Sentinel head of the chain
    pub fn head(&self) -> SectionId {
        SectionId(0)
    }

    pub fn get(&self, id: SectionId) -> &TrackSection {
        &self.sections[id.0]
    }

    /// Number of labelled sections (sentinel excluded)
    pub fn len(&self) -> usize {
        self.sections.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Section playing at `position_ms`, walking from `from`
    ///
    /// Positions below the sentinel are clamped to it.
    pub fn find_playing_section(&self, from: SectionId, position_ms: i64) -> SectionId {
        self.walk(from, position_ms, |_| {})
    }

    fn walk(&self, from: SectionId, position_ms: i64, mut visit: impl FnMut(SectionId)) -> SectionId {
        let position_ms = position_ms.max(SENTINEL_START_MS);
        let mut current = from;

        loop {
            visit(current);
            let section = self.get(current);
            let next_start = section.next.map(|n| self.get(n).start_at_ms);

            if section.contains(position_ms, next_start) {
                return current;
            }

            let step = if position_ms < section.start_at_ms {
                section.prev
            } else {
                section.next
            };
            match step {
                Some(id) => current = id,
                None => return current,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(secs: Option<f64>, title: &str) -> SubTrack {
        SubTrack {
            id: None,
            timestamp_secs: secs,
            title: title.to_string(),
            artist: None,
        }
    }

    fn scenario() -> TrackSectionIndex {
        TrackSectionIndex::build(&[
            track(Some(215.0), "Closer"),
            track(Some(0.0), "Opener"),
            track(None, "Untimed ID"),
            track(Some(90.0), "Peak"),
        ])
    }

    fn start_of(index: &TrackSectionIndex, id: SectionId) -> i64 {
        index.get(id).start_at_ms
    }

    #[test]
    fn test_build_sorts_and_links() {
        let index = scenario();
        assert_eq!(index.len(), 3);

        let mut starts = Vec::new();
        let mut cursor = Some(index.head());
        while let Some(id) = cursor {
            starts.push(start_of(&index, id));
            cursor = index.get(id).next;
        }
        assert_eq!(starts, vec![-1, 0, 90_000, 215_000]);

        let last = SectionId(3);
        assert_eq!(index.get(last).prev, Some(SectionId(2)));
        assert_eq!(index.get(index.head()).prev, None);
    }

    #[test]
    fn test_scenario_positions() {
        let index = scenario();
        let head = index.head();

        let at_150 = index.find_playing_section(head, 150_000);
        assert_eq!(start_of(&index, at_150), 90_000);
        assert_eq!(index.get(at_150).label.as_ref().unwrap().title, "Peak");

        let at_250 = index.find_playing_section(at_150, 250_000);
        assert_eq!(start_of(&index, at_250), 215_000);

        let clamped = index.find_playing_section(at_250, -5);
        assert_eq!(clamped, head);
        assert!(index.get(clamped).label.is_none());
    }

    #[test]
    fn test_boundaries_are_half_open() {
        let index = scenario();
        let head = index.head();

        assert_eq!(start_of(&index, index.find_playing_section(head, 89_999)), 0);
        assert_eq!(start_of(&index, index.find_playing_section(head, 90_000)), 90_000);
        assert_eq!(start_of(&index, index.find_playing_section(head, 0)), 0);
    }

    #[test]
    fn test_backward_seek_walks_prev() {
        let index = scenario();
        let last = index.find_playing_section(index.head(), 300_000);

        let mut visited = Vec::new();
        let found = index.walk(last, 10_000, |id| visited.push(id.index()));
        assert_eq!(start_of(&index, found), 0);
        assert_eq!(visited, vec![3, 2, 1]);
    }

    #[test]
    fn test_increasing_positions_walk_forward_only() {
        let tracks: Vec<SubTrack> = (0..20)
            .map(|i| track(Some(i as f64 * 30.0), &format!("Track {}", i)))
            .collect();
        let index = TrackSectionIndex::build(&tracks);

        let mut current = index.head();
        let mut highest = 0;
        for position in (0..700_000).step_by(7_000) {
            let from = current.index();
            current = index.walk(current, position, |id| {
                assert!(id.index() >= from, "walk moved backwards");
            });
            assert!(current.index() >= highest);
            highest = current.index();

            // Unique section satisfying start <= p < next.start
            let section = index.get(current);
            assert!(section.start_at_ms <= position);
            if let Some(next) = section.next {
                assert!(position < index.get(next).start_at_ms);
            }
        }
    }

    #[test]
    fn test_empty_tracklist_is_sentinel_only() {
        let index = TrackSectionIndex::build(&[track(None, "No time")]);
        assert!(index.is_empty());
        assert_eq!(index.find_playing_section(index.head(), 1_000_000), index.head());
    }
}
