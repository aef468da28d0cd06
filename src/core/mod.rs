// Duplicate detection engine:
// - record table and traces
// - similarity primitives
// - synthetic duplicate generation
// - blocking and bounded candidate search
// - pair features, root-cause rules and impact scoring
// - recall evaluation against generated ground truth

pub mod blocking;
pub mod classifier;
pub mod evaluator;
pub mod features;
pub mod generator;
pub mod impact;
pub mod record;
pub mod similarity;
