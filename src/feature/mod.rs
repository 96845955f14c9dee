pub mod point;

pub use point::PointFeature;

use std::ops::BitOr;

use nalgebra as na;

use crate::error::FeatureError;

/// Bitmask choosing which components of a feature take part in the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection(u32);

/// Selects every component of a feature.
pub const FEATURE_ALL: Selection = Selection(0xffff);

impl Selection {
    /// Selection of the `index`-th component only.
    pub const fn line(index: u32) -> Selection {
        Selection(1 << index)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, index: usize) -> bool {
        index < 32 && self.0 & (1 << index) != 0
    }

    /// Indices of the selected components of a feature of size `dim`.
    pub fn indices(self, dim: usize) -> impl Iterator<Item = usize> {
        (0..dim).filter(move |&i| self.contains(i))
    }

    pub fn count(self, dim: usize) -> usize {
        self.indices(dim).count()
    }
}

impl Default for Selection {
    fn default() -> Self {
        FEATURE_ALL
    }
}

impl BitOr for Selection {
    type Output = Selection;

    fn bitor(self, rhs: Selection) -> Selection {
        Selection(self.0 | rhs.0)
    }
}

/// A visual feature usable in a visual servo control law.
pub trait BasicFeature {
    /// Number of components of the feature vector.
    fn dimension(&self) -> usize;

    /// Current value of the feature vector `s`.
    fn values(&self) -> na::DVector<f64>;

    /// Interaction matrix of the selected components, one row per component
    /// and one column per degree of freedom of the camera velocity.
    fn interaction(&self, select: Selection) -> Result<na::DMatrix<f64>, FeatureError>;

    /// `s - s*` restricted to the selected components.
    fn error(&self, desired: &Self, select: Selection) -> Result<na::DVector<f64>, FeatureError>
    where
        Self: Sized,
    {
        selected_components(&(self.values() - desired.values()), select)
    }
}

/// Keeps the selected entries of `v`, in order.
pub fn selected_components(
    v: &na::DVector<f64>,
    select: Selection,
) -> Result<na::DVector<f64>, FeatureError> {
    let picked: Vec<f64> = select.indices(v.len()).map(|i| v[i]).collect();
    if picked.is_empty() {
        return Err(FeatureError::EmptySelection(select.bits()));
    }
    Ok(na::DVector::from_vec(picked))
}

/// Stacks the interaction matrices of several features row-wise.
pub fn stack_interaction(
    features: &[(&dyn BasicFeature, Selection)],
) -> Result<na::DMatrix<f64>, FeatureError> {
    let blocks = features
        .iter()
        .map(|(f, select)| f.interaction(*select))
        .collect::<Result<Vec<_>, _>>()?;
    let rows: usize = blocks.iter().map(|b| b.nrows()).sum();
    let mut stacked = na::DMatrix::zeros(rows, 6);
    let mut offset = 0;
    for b in &blocks {
        stacked.rows_mut(offset, b.nrows()).copy_from(b);
        offset += b.nrows();
    }
    Ok(stacked)
}

/// Stacks `s - s*` of several (current, desired) feature pairs.
pub fn stack_error(
    pairs: &[(&dyn BasicFeature, &dyn BasicFeature, Selection)],
) -> Result<na::DVector<f64>, FeatureError> {
    let mut stacked = Vec::new();
    for (current, desired, select) in pairs {
        let e = selected_components(&(current.values() - desired.values()), *select)?;
        stacked.extend(e.iter().copied());
    }
    Ok(na::DVector::from_vec(stacked))
}

/// Camera velocity screw `v = -gain * L⁺ e` of the classical control law.
///
/// Returns `None` when the pseudo-inverse of `l` cannot be computed.
pub fn servo_velocity(
    l: &na::DMatrix<f64>,
    e: &na::DVector<f64>,
    gain: f64,
) -> Option<na::DVector<f64>> {
    let l_pinv = l.clone().pseudo_inverse(1e-9).ok()?;
    Some(-gain * l_pinv * e)
}
