//! Features of interest and their envelopes.

use serde::{Deserialize, Serialize};

use super::FeatureId;

/// Axis-aligned bounding box in the feature's coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// Envelope of a set of positions, `None` when there are none.
    pub fn from_positions(positions: &[[f64; 2]]) -> Option<Self> {
        let first = positions.first()?;
        let mut env = Envelope::new(first[0], first[1], first[0], first[1]);
        for p in &positions[1..] {
            env.min_x = env.min_x.min(p[0]);
            env.min_y = env.min_y.min(p[1]);
            env.max_x = env.max_x.max(p[0]);
            env.max_y = env.max_y.max(p[1]);
        }
        Some(env)
    }

    /// Boundary-inclusive intersection test.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Sampling geometry: a station point or a sampling curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Point {
        x: f64,
        y: f64,
    },
    Curve {
        positions: Vec<[f64; 2]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        length: Option<f64>,
    },
}

/// A sampling point or sampling curve observations are made about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureOfInterest {
    pub id: FeatureId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_srs")]
    pub srs_name: String,
    pub geometry: Geometry,
}

fn default_srs() -> String {
    "EPSG:27582".to_string()
}

impl FeatureOfInterest {
    pub fn point(id: impl Into<FeatureId>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            srs_name: default_srs(),
            geometry: Geometry::Point { x, y },
        }
    }

    /// Sampling curve; the length defaults to the polyline length.
    pub fn curve(id: impl Into<FeatureId>, positions: Vec<[f64; 2]>) -> Self {
        let length = positions
            .windows(2)
            .map(|w| ((w[1][0] - w[0][0]).powi(2) + (w[1][1] - w[0][1]).powi(2)).sqrt())
            .sum();
        Self {
            id: id.into(),
            name: None,
            srs_name: default_srs(),
            geometry: Geometry::Curve {
                positions,
                length: Some(length),
            },
        }
    }

    pub fn envelope(&self) -> Option<Envelope> {
        match &self.geometry {
            Geometry::Point { x, y } => Some(Envelope::new(*x, *y, *x, *y)),
            Geometry::Curve { positions, .. } => Envelope::from_positions(positions),
        }
    }
}
