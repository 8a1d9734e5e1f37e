//! BBOX spatial filtering against feature-of-interest geometries.

use serde::{Deserialize, Serialize};

use crate::models::{Envelope, FeatureOfInterest};

/// BBOX operand as it arrives in a request.
///
/// Corners are kept raw so that a box with missing coordinates can be reported
/// as a missing parameter instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BBoxFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_reference: Option<String>,
    #[serde(default)]
    pub lower_corner: Vec<f64>,
    #[serde(default)]
    pub upper_corner: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs_name: Option<String>,
}

impl BBoxFilter {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            value_reference: None,
            lower_corner: vec![min_x, min_y],
            upper_corner: vec![max_x, max_y],
            srs_name: None,
        }
    }

    /// The box, or `None` when a corner lacks coordinates.
    pub fn envelope(&self) -> Option<Envelope> {
        match (self.lower_corner.as_slice(), self.upper_corner.as_slice()) {
            ([lx, ly, ..], [ux, uy, ..]) => Some(Envelope::new(*lx, *ly, *ux, *uy)),
            _ => None,
        }
    }

    /// Whether the feature geometry intersects the box.
    ///
    /// Malformed boxes and features without geometry never match.
    pub fn matches(&self, feature: &FeatureOfInterest) -> bool {
        match (self.envelope(), feature.envelope()) {
            (Some(bbox), Some(env)) => bbox.intersects(&env),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_corner_yields_no_envelope() {
        let mut f = BBoxFilter::new(0.0, 0.0, 1.0, 1.0);
        f.upper_corner.clear();
        assert!(f.envelope().is_none());
        assert!(!f.matches(&FeatureOfInterest::point("a", 0.5, 0.5)));
    }

    #[test]
    fn test_point_inside_and_outside() {
        let f = BBoxFilter::new(64000.0, 1730000.0, 66000.0, 1740000.0);
        assert!(f.matches(&FeatureOfInterest::point("in", 65400.0, 1731368.0)));
        assert!(!f.matches(&FeatureOfInterest::point("out", 10.0, 10.0)));
    }

    #[test]
    fn test_curve_crossing_box_matches() {
        let f = BBoxFilter::new(0.0, 0.0, 1.0, 1.0);
        let curve = FeatureOfInterest::curve("c", vec![[-1.0, 0.5], [2.0, 0.5]]);
        assert!(f.matches(&curve));
    }
}
