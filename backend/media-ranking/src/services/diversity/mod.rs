use crate::models::ScoredCandidate;

/// Diversity Layer - 講者多樣性重排
///
/// Greedy pass over an already-ordered list: at each position take the
/// best remaining item that would not extend a run of the same speaker
/// past `max_consecutive_from_speaker`. When every remaining item would,
/// the best one is taken anyway so nothing is dropped.
///
/// Selection at position `i` never depends on `top_k`, so a shorter page
/// is always a prefix of a longer one.
pub struct DiversityLayer {
    max_consecutive_from_speaker: usize,
}

impl DiversityLayer {
    pub fn new(max_consecutive_from_speaker: usize) -> Self {
        Self {
            max_consecutive_from_speaker,
        }
    }

    pub fn rerank(&self, ranked: Vec<ScoredCandidate>, top_k: usize) -> Vec<ScoredCandidate> {
        if ranked.is_empty() || top_k == 0 {
            return Vec::new();
        }
        if self.max_consecutive_from_speaker == 0 {
            let mut ranked = ranked;
            ranked.truncate(top_k);
            return ranked;
        }

        let mut selected: Vec<ScoredCandidate> = Vec::with_capacity(top_k.min(ranked.len()));
        let mut remaining = ranked;

        while selected.len() < top_k && !remaining.is_empty() {
            let recent_speakers = self.get_recent_speakers(&selected);
            let idx = remaining
                .iter()
                .position(|c| !self.violates_speaker_diversity(&recent_speakers, c))
                .unwrap_or(0);
            selected.push(remaining.remove(idx));
        }

        selected
    }

    /// Speakers of the last N selected items, most recent first
    fn get_recent_speakers<'a>(&self, selected: &'a [ScoredCandidate]) -> Vec<Option<&'a str>> {
        selected
            .iter()
            .rev()
            .take(self.max_consecutive_from_speaker)
            .map(|c| c.item.speaker.as_deref())
            .collect()
    }

    fn violates_speaker_diversity(
        &self,
        recent_speakers: &[Option<&str>],
        candidate: &ScoredCandidate,
    ) -> bool {
        if recent_speakers.len() < self.max_consecutive_from_speaker {
            return false;
        }

        // Unknown speakers never form a run
        match candidate.item.speaker.as_deref() {
            Some(speaker) => recent_speakers.iter().all(|&s| s == Some(speaker)),
            None => false,
        }
    }
}
