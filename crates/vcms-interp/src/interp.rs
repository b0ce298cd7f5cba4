//! Interpolation method selection.

/// Interpolation method for 3-input grids.
///
/// Only 3-input grids honor the choice; other arities have a single
/// kernel each. Grids with more than three inputs reduce to a tetrahedral
/// 3-D base case regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Tetrahedral interpolation.
    ///
    /// Default method: blends the four corners of the tetrahedron holding
    /// the input, exact on cube vertices, edges and faces.
    #[default]
    Tetrahedral,

    /// Trilinear interpolation.
    ///
    /// Blends all eight corners of the cell.
    Trilinear,
}
