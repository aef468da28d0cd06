// Synthetic duplicate generation for recall evaluation.
//
// Each sampled source key spawns exactly three variants. Fuzzy-detectable
// variants apply lexical noise to the key; non-fuzzy-detectable variants
// reformat it so that edit-distance scoring cannot link it back.

use crate::config::{ConfigError, GeneratorConfig};
use crate::core::record::{Record, RecordTable};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Redraws of a colliding variant key before falling back to a numbered suffix.
const MAX_KEY_ATTEMPTS: usize = 16;
const MAX_INSERT_RESULT_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("No actor other than {actor:?} is available to reassign {source_key}")]
    NoAlternativeActor {
        source_key: String,
        actor: Option<String>,
    },

    #[error("Source key {source_key} is not in the record table")]
    UnknownSource { source_key: String },

    #[error("Invalid generator configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyClass {
    FuzzyDetectable,
    NonFuzzyDetectable,
}

impl DifficultyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyClass::FuzzyDetectable => "fuzzy_detectable",
            DifficultyClass::NonFuzzyDetectable => "non_fuzzy_detectable",
        }
    }
}

impl fmt::Display for DifficultyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActorPolicy {
    Keep,
    Reassign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationKind {
    Typo,
    InsertDelete,
    Transposition,
    SemanticReformat,
    SystemReformat,
    ChannelReformat,
}

impl VariationKind {
    /// Strategies applied, in order, to every fuzzy-detectable source.
    pub const FUZZY: [VariationKind; 3] = [
        VariationKind::Typo,
        VariationKind::InsertDelete,
        VariationKind::Transposition,
    ];

    /// Strategies applied, in order, to every non-fuzzy-detectable source.
    pub const NON_FUZZY: [VariationKind; 3] = [
        VariationKind::SemanticReformat,
        VariationKind::SystemReformat,
        VariationKind::ChannelReformat,
    ];

    pub fn difficulty_class(&self) -> DifficultyClass {
        match self {
            VariationKind::Typo | VariationKind::InsertDelete | VariationKind::Transposition => {
                DifficultyClass::FuzzyDetectable
            }
            _ => DifficultyClass::NonFuzzyDetectable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VariationKind::Typo => "typo",
            VariationKind::InsertDelete => "insert_delete",
            VariationKind::Transposition => "transposition",
            VariationKind::SemanticReformat => "semantic_reformat",
            VariationKind::SystemReformat => "system_reformat",
            VariationKind::ChannelReformat => "channel_reformat",
        }
    }

    fn actor_policy(&self) -> ActorPolicy {
        match self {
            VariationKind::InsertDelete
            | VariationKind::SemanticReformat
            | VariationKind::ChannelReformat => ActorPolicy::Reassign,
            _ => ActorPolicy::Keep,
        }
    }

    fn draw_offset<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match self {
            VariationKind::Typo => Duration::minutes(rng.gen_range(5..=30)),
            VariationKind::InsertDelete => Duration::minutes(rng.gen_range(10..=60)),
            VariationKind::Transposition => Duration::hours(rng.gen_range(1..=3)),
            VariationKind::SemanticReformat => Duration::hours(rng.gen_range(2..=8)),
            VariationKind::SystemReformat => Duration::days(rng.gen_range(1..=3)),
            VariationKind::ChannelReformat => Duration::hours(rng.gen_range(1..=6)),
        }
    }

    pub fn apply<R: Rng + ?Sized>(&self, key: &str, rng: &mut R) -> String {
        match self {
            VariationKind::Typo => typo_variant(key, rng),
            VariationKind::InsertDelete => insert_delete_variant(key, rng),
            VariationKind::Transposition => transposition_variant(key, rng),
            VariationKind::SemanticReformat => SEMANTIC.apply(key, rng),
            VariationKind::SystemReformat => SYSTEM.apply(key, rng),
            VariationKind::ChannelReformat => CHANNEL.apply(key, rng),
        }
    }
}

impl fmt::Display for VariationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cloned trace under a freshly assigned key, with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDuplicate {
    pub record_key: String,
    pub source_key: String,
    pub difficulty_class: DifficultyClass,
    pub variation_kind: VariationKind,
    pub records: Vec<Record>,
}

/// One row of the labeled synthetic-duplicate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRow {
    pub record_key: String,
    pub source_key: String,
    pub difficulty_class: DifficultyClass,
    pub variation_kind: VariationKind,
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub activity: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedDataset {
    pub duplicates: Vec<GeneratedDuplicate>,
}

impl GeneratedDataset {
    pub fn len(&self) -> usize {
        self.duplicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.duplicates.is_empty()
    }

    pub fn rows(&self) -> Vec<GeneratedRow> {
        self.duplicates
            .iter()
            .flat_map(|dup| {
                dup.records.iter().map(move |r| GeneratedRow {
                    record_key: dup.record_key.clone(),
                    source_key: dup.source_key.clone(),
                    difficulty_class: dup.difficulty_class,
                    variation_kind: dup.variation_kind,
                    actor: r.actor.clone(),
                    timestamp: r.timestamp,
                    activity: r.activity.clone(),
                })
            })
            .collect()
    }

    /// Generated records, ready to be combined with the originals.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.duplicates.iter().flat_map(|dup| dup.records.iter())
    }

    pub fn of_class(&self, class: DifficultyClass) -> impl Iterator<Item = &GeneratedDuplicate> {
        self.duplicates
            .iter()
            .filter(move |dup| dup.difficulty_class == class)
    }
}

pub struct DuplicateGenerator {
    config: GeneratorConfig,
}

impl DuplicateGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate with the configured seed, or an entropy-seeded source when unset.
    pub fn generate(&self, table: &RecordTable) -> Result<GeneratedDataset, GenerateError> {
        self.config.validate()?;
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        generate(table, self.config.count, self.config.fuzzy_ratio, &mut rng)
    }
}

/// Sample up to `count` distinct source keys and spawn three labeled variants
/// for each. The first `floor(count * fuzzy_ratio)` sources receive fuzzy
/// variants, the rest non-fuzzy ones.
pub fn generate<R: Rng + ?Sized>(
    table: &RecordTable,
    count: usize,
    fuzzy_ratio: f64,
    rng: &mut R,
) -> Result<GeneratedDataset, GenerateError> {
    if !(0.0..=1.0).contains(&fuzzy_ratio) {
        return Err(ConfigError::InvalidFuzzyRatio(fuzzy_ratio).into());
    }

    let fuzzy_count = (count as f64 * fuzzy_ratio).floor() as usize;
    let mut keys: Vec<&str> = table.keys().collect();
    let sample_size = count.min(keys.len());
    let (sampled, _) = keys.partial_shuffle(rng, sample_size);
    let split = fuzzy_count.min(sampled.len());
    let (fuzzy_sources, non_fuzzy_sources) = sampled.split_at(split);

    log::info!(
        "Generating duplicates for {} fuzzy-detectable and {} non-fuzzy-detectable sources",
        fuzzy_sources.len(),
        non_fuzzy_sources.len()
    );

    let mut taken: HashSet<String> = table.keys().map(str::to_string).collect();
    let mut duplicates = Vec::with_capacity(sampled.len() * 3);

    let plan = fuzzy_sources
        .iter()
        .map(|key| (*key, VariationKind::FUZZY))
        .chain(
            non_fuzzy_sources
                .iter()
                .map(|key| (*key, VariationKind::NON_FUZZY)),
        );

    for (source_key, kinds) in plan {
        for kind in kinds {
            let dup = spawn_variant(table, source_key, kind, &mut taken, rng)?;
            duplicates.push(dup);
        }
    }

    Ok(GeneratedDataset { duplicates })
}

fn spawn_variant<R: Rng + ?Sized>(
    table: &RecordTable,
    source_key: &str,
    kind: VariationKind,
    taken: &mut HashSet<String>,
    rng: &mut R,
) -> Result<GeneratedDuplicate, GenerateError> {
    let trace = table
        .trace(source_key)
        .ok_or_else(|| GenerateError::UnknownSource {
            source_key: source_key.to_string(),
        })?;

    let record_key = fresh_key(source_key, kind, taken, rng);
    let offset = kind.draw_offset(rng);
    let actor = match kind.actor_policy() {
        ActorPolicy::Keep => None,
        ActorPolicy::Reassign => Some(other_actor(table, source_key, trace.first_actor(), rng)?),
    };

    let records = trace
        .events
        .iter()
        .map(|event| Record {
            record_key: record_key.clone(),
            actor: actor.clone().or_else(|| event.actor.clone()),
            activity: event.activity.clone(),
            timestamp: event.timestamp + offset,
            amount: event.amount,
        })
        .collect();

    taken.insert(record_key.clone());
    Ok(GeneratedDuplicate {
        record_key,
        source_key: source_key.to_string(),
        difficulty_class: kind.difficulty_class(),
        variation_kind: kind,
        records,
    })
}

fn fresh_key<R: Rng + ?Sized>(
    source_key: &str,
    kind: VariationKind,
    taken: &HashSet<String>,
    rng: &mut R,
) -> String {
    let mut candidate = kind.apply(source_key, rng);
    for _ in 1..MAX_KEY_ATTEMPTS {
        if !taken.contains(&candidate) {
            return candidate;
        }
        candidate = kind.apply(source_key, rng);
    }
    if !taken.contains(&candidate) {
        return candidate;
    }

    log::debug!("Variant {} of {} keeps colliding; suffixing {}", kind, source_key, candidate);
    let mut n = 1;
    loop {
        let key = format!("{candidate}-{n}");
        if !taken.contains(&key) {
            return key;
        }
        n += 1;
    }
}

fn other_actor<R: Rng + ?Sized>(
    table: &RecordTable,
    source_key: &str,
    current: Option<&str>,
    rng: &mut R,
) -> Result<String, GenerateError> {
    let pool: Vec<&String> = table
        .actors()
        .iter()
        .filter(|actor| Some(actor.as_str()) != current)
        .collect();

    pool.choose(rng)
        .map(|actor| actor.to_string())
        .ok_or_else(|| GenerateError::NoAlternativeActor {
            source_key: source_key.to_string(),
            actor: current.map(str::to_string),
        })
}

fn confusable(c: char) -> Option<char> {
    let replacement = match c.to_ascii_lowercase() {
        'a' => 'e',
        'e' => 'a',
        'i' => 'o',
        'o' => 'i',
        'u' => 'o',
        'b' => 'd',
        'd' => 'b',
        'p' => 'q',
        'q' => 'p',
        'n' => 'm',
        'm' => 'n',
        'w' => 'v',
        'v' => 'w',
        _ => return None,
    };
    if c.is_ascii_uppercase() {
        Some(replacement.to_ascii_uppercase())
    } else {
        Some(replacement)
    }
}

/// Substitute one character: digits are shifted, letters swapped for a visually
/// confusable one. Keys shorter than 3 characters are returned unchanged, as is
/// a drawn character with no confusable counterpart.
pub fn typo_variant<R: Rng + ?Sized>(key: &str, rng: &mut R) -> String {
    let mut chars: Vec<char> = key.chars().collect();
    if chars.len() < 3 {
        return key.to_string();
    }

    let pos = rng.gen_range(0..chars.len());
    let c = chars[pos];
    if let Some(digit) = c.to_digit(10).filter(|_| c.is_ascii_digit()) {
        let shifted = (digit + rng.gen_range(1..=9)) % 10;
        chars[pos] = char::from_digit(shifted, 10).unwrap_or(c);
    } else if let Some(replacement) = confusable(c) {
        chars[pos] = replacement;
    }
    chars.into_iter().collect()
}

/// Insert a random alphanumeric character (only while the result stays under
/// 10 characters) or delete one. Keys shorter than 2 characters are unchanged.
pub fn insert_delete_variant<R: Rng + ?Sized>(key: &str, rng: &mut R) -> String {
    let mut chars: Vec<char> = key.chars().collect();
    if chars.len() < 2 {
        return key.to_string();
    }

    let insert = rng.gen_bool(0.5);
    if insert && chars.len() + 1 < MAX_INSERT_RESULT_LEN {
        let pos = rng.gen_range(0..=chars.len());
        let c = rng.sample(Alphanumeric) as char;
        chars.insert(pos, c);
    } else {
        let pos = rng.gen_range(0..chars.len());
        chars.remove(pos);
    }
    chars.into_iter().collect()
}

/// Swap two adjacent characters. Keys shorter than 2 characters are unchanged.
pub fn transposition_variant<R: Rng + ?Sized>(key: &str, rng: &mut R) -> String {
    let mut chars: Vec<char> = key.chars().collect();
    if chars.len() < 2 {
        return key.to_string();
    }

    let pos = rng.gen_range(0..chars.len() - 1);
    chars.swap(pos, pos + 1);
    chars.into_iter().collect()
}

/// Prefix-and-pad reformatting that defeats lexical similarity.
struct ReformatScheme {
    numeric_prefix: &'static str,
    numeric_width: usize,
    fallback_prefix: &'static str,
    fallback_digits: u32,
}

const SEMANTIC: ReformatScheme = ReformatScheme {
    numeric_prefix: "APP",
    numeric_width: 6,
    fallback_prefix: "REQ",
    fallback_digits: 5,
};

const SYSTEM: ReformatScheme = ReformatScheme {
    numeric_prefix: "SYS",
    numeric_width: 8,
    fallback_prefix: "REF",
    fallback_digits: 4,
};

const CHANNEL: ReformatScheme = ReformatScheme {
    numeric_prefix: "WEB",
    numeric_width: 7,
    fallback_prefix: "MOB",
    fallback_digits: 3,
};

impl ReformatScheme {
    fn apply<R: Rng + ?Sized>(&self, key: &str, rng: &mut R) -> String {
        match numeric_value(key) {
            Some(num) => format!(
                "{}{:0width$}",
                self.numeric_prefix,
                num,
                width = self.numeric_width
            ),
            None => {
                let modulus = 10u32.pow(self.fallback_digits);
                format!(
                    "{}{:0width$}",
                    self.fallback_prefix,
                    rng.gen_range(0..modulus),
                    width = self.fallback_digits as usize
                )
            }
        }
    }
}

fn numeric_value(key: &str) -> Option<u128> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Numeric keys become `APP` + 6-digit zero-padded; others `REQ` + 5 random digits.
pub fn semantic_reformat<R: Rng + ?Sized>(key: &str, rng: &mut R) -> String {
    SEMANTIC.apply(key, rng)
}

/// Numeric keys become `SYS` + 8-digit zero-padded; others `REF` + 4 random digits.
pub fn system_reformat<R: Rng + ?Sized>(key: &str, rng: &mut R) -> String {
    SYSTEM.apply(key, rng)
}

/// Numeric keys become `WEB` + 7-digit zero-padded; others `MOB` + 3 random digits.
pub fn channel_reformat<R: Rng + ?Sized>(key: &str, rng: &mut R) -> String {
    CHANNEL.apply(key, rng)
}
