use crate::shape::PlanarShape;

/// Compactness index `k = C² / A`.
///
/// A circle minimises it (4π); elongated or ragged shapes grow without bound.
/// Returns `None` for zero-area shapes and for any non-finite result.
pub fn compactness_index<S: PlanarShape + ?Sized>(shape: &S) -> Option<f64> {
    let area = shape.area();
    if area == 0.0 {
        return None;
    }
    let perimeter = shape.perimeter();
    let k = perimeter * perimeter / area;
    k.is_finite().then_some(k)
}
