//! # Canonical Moods
//!
//! Free-text tags ("feel good", "melancholic", "late night chillout") are
//! collapsed into a closed set of ten canonical moods by keyword matching.
//! Each matching tag votes for a mood with a weight that shrinks as the tag
//! becomes more common across the corpus, so ubiquitous tags like "rock"
//! or "favorites" cannot drown out the specific ones.
//!
//! Ties are broken by a fixed priority order rather than map iteration
//! order, which keeps canonicalization reproducible across runs.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of canonical moods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    Happy,
    Sad,
    Angry,
    Chill,
    Energetic,
    Romantic,
    Epic,
    Dreamy,
    Groovy,
    Nostalgic,
}

/// All moods, in keyword-table order.
pub const ALL_MOODS: [Mood; 10] = [
    Mood::Happy,
    Mood::Sad,
    Mood::Angry,
    Mood::Chill,
    Mood::Energetic,
    Mood::Romantic,
    Mood::Epic,
    Mood::Dreamy,
    Mood::Groovy,
    Mood::Nostalgic,
];

/// Tie-break priority. Earlier wins. Angry is deliberately absent: it only
/// wins a canonicalization outright, never a tie.
const PRIORITY: [Mood; 9] = [
    Mood::Happy,
    Mood::Sad,
    Mood::Chill,
    Mood::Energetic,
    Mood::Romantic,
    Mood::Epic,
    Mood::Dreamy,
    Mood::Groovy,
    Mood::Nostalgic,
];

lazy_static::lazy_static! {
    /// Keyword substrings recognized for each mood.
    static ref MOOD_KEYWORDS: Vec<(Mood, &'static [&'static str])> = vec![
        (Mood::Happy, &["happy", "feel good", "cheerful", "uplifting", "good mood"][..]),
        (Mood::Sad, &["sad", "melancholy", "melancholic", "heartbreak", "somber"][..]),
        (Mood::Angry, &["angry", "aggressive", "fierce", "rage"][..]),
        (Mood::Chill, &["chill", "chillout", "mellow", "laid back", "relax", "soothing", "calm"][..]),
        (Mood::Energetic, &["energetic", "high energy", "party", "dance", "upbeat", "fast"][..]),
        (Mood::Romantic, &["romantic", "love song", "ballad"][..]),
        (Mood::Epic, &["epic", "anthemic", "dramatic", "orchestral"][..]),
        (Mood::Dreamy, &["dreamy", "ethereal", "ambient", "spacey"][..]),
        (Mood::Groovy, &["groovy", "funky", "swing"][..]),
        (Mood::Nostalgic, &["nostalgia", "retro", "oldies", "classic"][..]),
    ];
}

impl Mood {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Sad => "Sad",
            Mood::Angry => "Angry",
            Mood::Chill => "Chill",
            Mood::Energetic => "Energetic",
            Mood::Romantic => "Romantic",
            Mood::Epic => "Epic",
            Mood::Dreamy => "Dreamy",
            Mood::Groovy => "Groovy",
            Mood::Nostalgic => "Nostalgic",
        }
    }

    /// Playlist-label adjective for this mood ("Sad" reads poorly in a
    /// playlist name, "Melancholic" does not).
    #[must_use]
    pub fn adjective(self) -> &'static str {
        match self {
            Mood::Happy => "Joyful",
            Mood::Sad => "Melancholic",
            Mood::Angry => "Fiery",
            other => other.as_str(),
        }
    }

    /// Tie-break rank. Lower wins; moods outside the priority list rank
    /// last and therefore lose every tie.
    fn priority_rank(self) -> usize {
        PRIORITY.iter().position(|&m| m == self).unwrap_or(PRIORITY.len())
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_MOODS.iter().copied().find(|m| m.as_str().eq_ignore_ascii_case(s)).ok_or(())
    }
}

/// Running corpus-wide tag frequency counter.
///
/// Keys are lowercased raw tags. The counter grows while a batch run
/// canonicalizes, so a tag's weight depends on how often it has been seen
/// so far; this online behavior is a deliberate heuristic (a frozen
/// two-pass count would be reproducible for a fixed corpus but cannot
/// stream).
#[derive(Debug, Clone, Default)]
pub struct TagCorpus {
    counts: HashMap<String, u32>,
}

impl TagCorpus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sighting of each tag.
    pub fn observe_all<S: AsRef<str>>(&mut self, tags: &[S]) {
        for tag in tags {
            *self.counts.entry(tag.as_ref().to_lowercase()).or_insert(0) += 1;
        }
    }

    /// Voting weight of a tag: 1.0 while the tag is rare, then
    /// `1 / log10(count)` as it becomes generic.
    #[must_use]
    pub fn weight(&self, tag: &str) -> f64 {
        match self.counts.get(&tag.to_lowercase()) {
            Some(&count) if count > 1 => 1.0 / f64::from(count).log10(),
            _ => 1.0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Strip punctuation and lowercase a raw tag before keyword matching.
fn clean_tag(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Collapse a list of free-text tags into one canonical mood.
///
/// Each tag that contains a keyword of a mood adds that tag's corpus weight
/// to the mood's score (once per mood, however many of its keywords match).
/// The highest-scoring mood wins; exact ties fall back to the fixed
/// priority order. Returns `None` when no keyword matched anything.
#[must_use]
pub fn canonical_mood<S: AsRef<str>>(tags: &[S], corpus: &TagCorpus) -> Option<Mood> {
    let mut scores: HashMap<Mood, f64> = HashMap::new();

    for raw in tags {
        let clean = clean_tag(raw.as_ref());
        if clean.is_empty() {
            continue;
        }
        let weight = corpus.weight(raw.as_ref());
        for (mood, keywords) in MOOD_KEYWORDS.iter() {
            if keywords.iter().any(|k| clean.contains(k)) {
                *scores.entry(*mood).or_insert(0.0) += weight;
            }
        }
    }

    scores
        .into_iter()
        .max_by(|(a_mood, a_score), (b_mood, b_score)| {
            a_score
                .partial_cmp(b_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b_mood.priority_rank().cmp(&a_mood.priority_rank()))
        })
        .map(|(mood, _)| mood)
}
