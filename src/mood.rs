use serde::Serialize;

const MAX_SEEDS: usize = 5;

const ENERGETIC_WORDS: &[&str] = &[
    "happy", "energetic", "upbeat", "excited", "party", "pump", "workout", "hype",
];
const CALM_WORDS: &[&str] = &[
    "calm", "relax", "chill", "peaceful", "study", "focus", "sleep", "mellow",
];
const SAD_WORDS: &[&str] = &[
    "sad", "melancholy", "melancholic", "heartbreak", "lonely", "cry", "gloomy",
];
const GENRE_WORDS: &[&str] = &[
    "rock", "jazz", "hip-hop", "classical", "electronic", "metal", "country", "indie", "blues",
    "folk", "reggae", "soul", "punk", "r-n-b", "latin",
];

/// Genre seeds plus the label shown back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoodMapping {
    pub description: String,
    pub seeds: Vec<String>,
}

impl MoodMapping {
    fn new(description: &str, seeds: &[&str]) -> Self {
        Self {
            description: description.to_string(),
            seeds: seeds.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn general() -> Self {
        Self::new("general", &["pop"])
    }

    pub fn seed_genres(&self) -> String {
        self.seeds.join(",")
    }
}

fn contains_any(prompt: &str, words: &[&str]) -> bool {
    words.iter().any(|w| prompt.contains(w))
}

/// Maps a free-text prompt onto genre seeds. Categories are tested in a fixed
/// order and the first hit wins. Matching is plain substring containment, so
/// "unhappy" still counts as "happy" and "crystal" as "cry".
pub fn map_prompt_to_seeds(prompt: Option<&str>) -> MoodMapping {
    let prompt = match prompt.map(str::trim) {
        Some(p) if !p.is_empty() => p.to_lowercase(),
        _ => return MoodMapping::general(),
    };

    if contains_any(&prompt, ENERGETIC_WORDS) {
        return MoodMapping::new("energetic", &["dance", "pop"]);
    }
    if contains_any(&prompt, CALM_WORDS) {
        return MoodMapping::new("calm", &["chill", "ambient"]);
    }
    if contains_any(&prompt, SAD_WORDS) {
        return MoodMapping::new("melancholic", &["sad", "acoustic"]);
    }

    let genres: Vec<&str> = GENRE_WORDS
        .iter()
        .copied()
        .filter(|g| prompt.contains(g))
        .take(MAX_SEEDS)
        .collect();
    if !genres.is_empty() {
        return MoodMapping::new("genre", &genres);
    }

    MoodMapping::general()
}
