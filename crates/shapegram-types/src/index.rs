//! Hierarchical indices.
//!
//! An index is the sequence of branch positions a value took through
//! `parallel` fan-outs and multi-result operations. It is the only stable
//! correlation key between values; arrival order carries no meaning.

/// Position of a value in the fan-out tree.
pub type Index = Vec<usize>;

/// Render an index as the comma-joined key used for random draws and
/// concretized `switch` cases: `[0, 2, 1]` becomes `"0,2,1"`.
pub fn index_key(index: &[usize]) -> String {
    index
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
