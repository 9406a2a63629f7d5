//! Gesture templates.
//!
//! A template names a gesture, the finger posture the target hand must hold,
//! and either a static hold or a dominant motion direction. The built-in
//! library carries the ten reference gestures.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier::FingerState;
use crate::error::{Error, Result};

/// Motion axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Left/right motion.
    Horizontal,
    /// Up/down motion.
    Vertical,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Horizontal => write!(f, "horizontal"),
            Self::Vertical => write!(f, "vertical"),
        }
    }
}

/// Motion direction as the operator perceives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards the operator's left.
    Left,
    /// Towards the operator's right.
    Right,
    /// Upwards.
    Up,
    /// Downwards.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// What the target hand has to do.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateMotion {
    /// Hold the posture still.
    Static,
    /// Move along `axis`. The deltas are reference displacements in the
    /// operator's frame: positive `delta_x` is to the operator's right,
    /// positive `delta_y` is downwards.
    Dynamic {
        /// Dominant axis.
        axis: Axis,
        /// Reference horizontal displacement.
        delta_x: f64,
        /// Reference vertical displacement.
        delta_y: f64,
    },
}

/// A gesture the matcher can evaluate against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureTemplate {
    /// Canonical lowercase label, e.g. `zoom_in`.
    pub pose_label: String,
    /// Human readable description.
    pub description: String,
    /// Expected target hand fingers.
    pub fingers: FingerState,
    /// Expected motion.
    pub motion: TemplateMotion,
}

impl GestureTemplate {
    /// Whether the gesture is a static hold.
    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(self.motion, TemplateMotion::Static)
    }

    /// Display name: the label with its first letter capitalized.
    #[must_use]
    pub fn display_name(&self) -> String {
        display_name(&self.pose_label)
    }

    /// Expected direction along the template's axis, `None` for static gestures.
    #[must_use]
    pub fn expected_direction(&self) -> Option<Direction> {
        match self.motion {
            TemplateMotion::Static => None,
            TemplateMotion::Dynamic {
                axis: Axis::Horizontal,
                delta_x,
                ..
            } => Some(if delta_x > 0.0 {
                Direction::Right
            } else {
                Direction::Left
            }),
            TemplateMotion::Dynamic {
                axis: Axis::Vertical,
                delta_y,
                ..
            } => Some(if delta_y > 0.0 {
                Direction::Down
            } else {
                Direction::Up
            }),
        }
    }
}

/// Normalize a gesture name (`"Zoom_in"`, `" zoom in "`) to its label.
#[must_use]
pub fn normalize_label(name: &str) -> String {
    name.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Capitalize the first letter of a label.
#[must_use]
pub fn display_name(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// An ordered collection of templates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplateLibrary {
    templates: Vec<GestureTemplate>,
}

fn dynamic(
    label: &str,
    description: &str,
    fingers: [u8; 5],
    axis: Axis,
    delta_x: f64,
    delta_y: f64,
) -> GestureTemplate {
    GestureTemplate {
        pose_label: label.to_string(),
        description: description.to_string(),
        fingers: FingerState::from_bits(fingers),
        motion: TemplateMotion::Dynamic {
            axis,
            delta_x,
            delta_y,
        },
    }
}

fn held(label: &str, description: &str, fingers: [u8; 5]) -> GestureTemplate {
    GestureTemplate {
        pose_label: label.to_string(),
        description: description.to_string(),
        fingers: FingerState::from_bits(fingers),
        motion: TemplateMotion::Static,
    }
}

impl TemplateLibrary {
    /// Build a library from templates. Later duplicates of a label are dropped.
    #[must_use]
    pub fn new(templates: Vec<GestureTemplate>) -> Self {
        let mut library = Self::default();
        for template in templates {
            if library.get(&template.pose_label).is_none() {
                library.templates.push(template);
            }
        }
        library
    }

    /// The ten reference gestures.
    #[must_use]
    pub fn builtin() -> Self {
        use Axis::{Horizontal, Vertical};

        Self::new(vec![
            dynamic(
                "rotate_down",
                "Thumb and index out, move down",
                [1, 1, 0, 0, 0],
                Vertical,
                -0.002_614,
                0.185_558,
            ),
            dynamic(
                "rotate_left",
                "Thumb and index out, move left",
                [1, 1, 0, 0, 0],
                Horizontal,
                -0.130_413,
                -0.005_325,
            ),
            dynamic(
                "rotate_right",
                "Thumb and index out, move right",
                [1, 1, 0, 0, 0],
                Horizontal,
                0.117_388,
                0.044_24,
            ),
            dynamic(
                "rotate_up",
                "Thumb and index out, move up",
                [1, 1, 0, 0, 0],
                Vertical,
                0.028_591,
                -0.185_792,
            ),
            dynamic(
                "zoom_in",
                "Thumb, index and middle out, move up",
                [1, 1, 1, 0, 0],
                Vertical,
                0.0,
                -0.168_766,
            ),
            dynamic(
                "zoom_out",
                "Thumb, index and middle out, move down",
                [1, 1, 1, 0, 0],
                Vertical,
                0.0,
                0.168_766,
            ),
            dynamic(
                "previous_slide",
                "Index and middle out, move left",
                [0, 1, 1, 0, 0],
                Horizontal,
                -0.152_16,
                -0.016_298,
            ),
            dynamic(
                "next_slide",
                "Index and middle out, move right",
                [0, 1, 1, 0, 0],
                Horizontal,
                0.116_381,
                0.006_73,
            ),
            held("end", "Open palm, hold still", [1, 1, 1, 1, 1]),
            held("home", "Thumb up, hold still", [1, 0, 0, 0, 0]),
        ])
    }

    /// Parse a library from a JSON array of templates.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the array is empty.
    pub fn from_json(json: &str) -> Result<Self> {
        let templates: Vec<GestureTemplate> = serde_json::from_str(json)?;
        if templates.is_empty() {
            return Err(Error::invalid_input("template library is empty"));
        }
        Ok(Self::new(
            templates
                .into_iter()
                .map(|mut t| {
                    t.pose_label = normalize_label(&t.pose_label);
                    t
                })
                .collect(),
        ))
    }

    /// Look a template up by label or display name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GestureTemplate> {
        let label = normalize_label(name);
        self.templates.iter().find(|t| t.pose_label == label)
    }

    /// Look a template up, failing with [`Error::UnknownTemplate`].
    ///
    /// # Errors
    ///
    /// Returns an error if no template has that name.
    pub fn require(&self, name: &str) -> Result<&GestureTemplate> {
        self.get(name)
            .ok_or_else(|| Error::UnknownTemplate(name.to_string()))
    }

    /// Iterate templates in library order.
    pub fn iter(&self) -> impl Iterator<Item = &GestureTemplate> {
        self.templates.iter()
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the library is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_library() {
        let library = TemplateLibrary::builtin();
        assert_eq!(library.len(), 10);
        assert_eq!(library.iter().filter(|t| t.is_static()).count(), 2);

        let home = library.get("home").unwrap();
        assert_eq!(home.fingers, FingerState::from_bits([1, 0, 0, 0, 0]));
        assert!(home.is_static());
    }

    #[test]
    fn test_builtin_dynamic_directions() {
        let library = TemplateLibrary::builtin();
        let direction = |name: &str| library.get(name).unwrap().expected_direction();

        assert_eq!(direction("rotate_down"), Some(Direction::Down));
        assert_eq!(direction("rotate_left"), Some(Direction::Left));
        assert_eq!(direction("rotate_right"), Some(Direction::Right));
        assert_eq!(direction("rotate_up"), Some(Direction::Up));
        assert_eq!(direction("zoom_in"), Some(Direction::Up));
        assert_eq!(direction("zoom_out"), Some(Direction::Down));
        assert_eq!(direction("previous_slide"), Some(Direction::Left));
        assert_eq!(direction("next_slide"), Some(Direction::Right));
        assert_eq!(direction("end"), None);
    }

    #[test]
    fn test_lookup_by_display_name() {
        let library = TemplateLibrary::builtin();
        assert_eq!(library.get("Zoom_in").unwrap().pose_label, "zoom_in");
        assert_eq!(library.get(" Next slide ").unwrap().pose_label, "next_slide");
        assert!(library.get("wave").is_none());
    }

    #[test]
    fn test_require_unknown() {
        let err = TemplateLibrary::builtin().require("wave").unwrap_err();
        assert!(matches!(err, Error::UnknownTemplate(ref n) if n == "wave"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_expected_direction() {
        let library = TemplateLibrary::builtin();
        let dir = |name: &str| library.get(name).unwrap().expected_direction();

        assert_eq!(dir("rotate_left"), Some(Direction::Left));
        assert_eq!(dir("rotate_right"), Some(Direction::Right));
        assert_eq!(dir("zoom_in"), Some(Direction::Up));
        assert_eq!(dir("zoom_out"), Some(Direction::Down));
        assert_eq!(dir("end"), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("zoom_in"), "Zoom_in");
        assert_eq!(display_name(""), "");
        let t = TemplateLibrary::builtin();
        assert_eq!(t.get("previous_slide").unwrap().display_name(), "Previous_slide");
    }

    #[test]
    fn test_new_drops_duplicates() {
        let library = TemplateLibrary::new(vec![
            held("home", "first", [1, 0, 0, 0, 0]),
            held("home", "second", [0, 0, 0, 0, 0]),
        ]);
        assert_eq!(library.len(), 1);
        assert_eq!(library.get("home").unwrap().description, "first");
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"pose_label": "Wave", "description": "wave", "fingers": [1,1,1,1,1],
             "motion": {"kind": "dynamic", "axis": "horizontal", "delta_x": 0.1, "delta_y": 0.0}},
            {"pose_label": "fist", "description": "hold", "fingers": [0,0,0,0,0],
             "motion": {"kind": "static"}}
        ]"#;
        let library = TemplateLibrary::from_json(json).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(
            library.get("wave").unwrap().expected_direction(),
            Some(Direction::Right)
        );
        assert!(library.get("fist").unwrap().is_static());
    }

    #[test]
    fn test_from_json_rejects_empty_and_bad_fingers() {
        assert!(TemplateLibrary::from_json("[]").is_err());
        let bad = r#"[{"pose_label": "x", "description": "", "fingers": [2,0,0,0,0], "motion": {"kind": "static"}}]"#;
        assert!(TemplateLibrary::from_json(bad).is_err());
    }
}
