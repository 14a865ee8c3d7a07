/// Which backend is producing identities for the camera session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerMode {
    /// Normalizing the output of an external multi-object tracker
    #[default]
    External,
    /// Greedy IoU fallback; once entered, kept for the rest of the session
    Fallback,
}
