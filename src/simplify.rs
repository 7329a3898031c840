use kurbo::Point;

use crate::{
    error::{MotionvizError, MotionvizResult},
    scenario::{MapFeature, ObjectTrack, ScenarioSnapshot},
};

/// Lightweight geometric view of one scenario, ready for rendering.
///
/// Every dynamic track has the same length; that length is the frame count
/// of the rendered animation.
#[derive(Clone, Debug, Default)]
pub struct SimplifiedScenario {
    pub centerlines: Vec<Vec<Point>>,
    pub static_points: Vec<Point>,
    pub dynamic_tracks: Vec<Vec<Point>>,
}

impl SimplifiedScenario {
    /// Shared dynamic-track length, or 0 when nothing moves.
    pub fn frame_count(&self) -> usize {
        self.dynamic_tracks.first().map_or(0, Vec::len)
    }
}

/// Reduce a decoded scenario to centerlines plus static/dynamic tracks.
///
/// Output order preserves the input order of map features and tracks.
pub fn simplify_scenario(snapshot: &ScenarioSnapshot) -> MotionvizResult<SimplifiedScenario> {
    let mut out = SimplifiedScenario::default();

    for feature in &snapshot.map_features {
        // Only lane centerlines contribute geometry; other kinds are not
        // an error, they just carry nothing we draw.
        if let MapFeature::LaneCenter(polyline) = feature {
            out.centerlines.push(polyline.clone());
        }
    }

    for track in &snapshot.tracks {
        let Some(positions) = fill_track_positions(track) else {
            continue;
        };

        let first = positions[0];
        let is_static = positions.iter().all(|p| *p == first);
        if is_static {
            out.static_points.push(first);
        } else {
            out.dynamic_tracks.push(positions);
        }
    }

    let expected = out.dynamic_tracks.first().map_or(0, Vec::len);
    for (idx, track) in out.dynamic_tracks.iter().enumerate() {
        if track.len() != expected {
            return Err(MotionvizError::validation(format!(
                "dynamic track {idx} has {} positions, expected {expected}",
                track.len()
            )));
        }
    }

    Ok(out)
}

/// Walk a track's states into a gap-free position sequence.
///
/// Valid states contribute their position. An invalid state carries the last
/// valid position forward; gaps before the first valid observation are
/// back-filled with that first valid position once it is seen. Returns
/// `None` for tracks with no usable positions at all.
fn fill_track_positions(track: &ObjectTrack) -> Option<Vec<Point>> {
    let mut positions: Vec<Option<Point>> = Vec::with_capacity(track.states.len());
    let mut last_valid: Option<Point> = None;

    for state in &track.states {
        if state.valid {
            let p = Point::new(state.x, state.y);
            if last_valid.is_none() {
                // Retroactively resolve the leading gap.
                for slot in &mut positions {
                    *slot = Some(p);
                }
            }
            last_valid = Some(p);
            positions.push(Some(p));
        } else {
            positions.push(last_valid);
        }
    }

    if positions.is_empty() {
        return None;
    }

    // A track with no valid state at all never resolved its placeholders.
    positions.into_iter().collect()
}
