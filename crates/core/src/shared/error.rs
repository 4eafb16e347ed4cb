/// Error type returned across capability boundaries (detectors, classifiers,
/// frame sources, annotators).
///
/// `Send + Sync` so failures can travel from the processing thread back to
/// whoever joins it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
