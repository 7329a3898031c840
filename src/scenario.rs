use std::path::Path;

use kurbo::Point;

use crate::{
    error::{MotionvizError, MotionvizResult},
    tfrecord::TfRecordReader,
};

/// One observed state of a tracked object at a single timestep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackState {
    pub x: f64,
    pub y: f64,
    pub valid: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectType {
    Unset,
    Vehicle,
    Pedestrian,
    Cyclist,
    Other,
}

impl ObjectType {
    fn from_proto(v: u64) -> Self {
        match v {
            1 => Self::Vehicle,
            2 => Self::Pedestrian,
            3 => Self::Cyclist,
            4 => Self::Other,
            _ => Self::Unset,
        }
    }
}

/// Time-ordered record of one object's states across the scenario.
#[derive(Clone, Debug)]
pub struct ObjectTrack {
    pub id: i64,
    pub object_type: ObjectType,
    pub states: Vec<TrackState>,
}

/// Map feature, discriminated by kind. Only lane centerlines carry geometry
/// we use; every other kind collapses to `Other`.
#[derive(Clone, Debug)]
pub enum MapFeature {
    LaneCenter(Vec<Point>),
    Other,
}

/// Decoded representation of exactly one scenario record.
#[derive(Clone, Debug, Default)]
pub struct ScenarioSnapshot {
    pub scenario_id: String,
    pub map_features: Vec<MapFeature>,
    pub tracks: Vec<ObjectTrack>,
}

/// Boundary to the scenario file decoder. Downstream only consumes the
/// first snapshot of a multi-record file.
pub trait ScenarioDecoder {
    fn decode(&self, path: &Path) -> MotionvizResult<Vec<ScenarioSnapshot>>;
}

/// Decoder for TFRecord files of serialized Waymo `Scenario` messages.
#[derive(Clone, Copy, Debug, Default)]
pub struct TfRecordScenarioDecoder;

impl ScenarioDecoder for TfRecordScenarioDecoder {
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    fn decode(&self, path: &Path) -> MotionvizResult<Vec<ScenarioSnapshot>> {
        let mut reader = TfRecordReader::open(path)?;
        let mut out = Vec::new();
        while let Some(payload) = reader.next_record()? {
            out.push(parse_scenario(&payload)?);
        }
        tracing::info!(scenarios = out.len(), "decoded scenario records");
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Protobuf wire walk. This is a fixed-schema extractor for the handful of
// Waymo scenario fields the simplifier needs; unknown fields are skipped.
//
// Field numbers (scenario.proto / map.proto, dataset v1.1.0):
//   Scenario:    tracks=2, scenario_id=5, map_features=8
//   Track:       id=1, object_type=2, states=3
//   ObjectState: center_x=2, center_y=3, valid=11
//   MapFeature:  lane=3 (oneof feature_data; every other arm is ignored)
//   LaneCenter:  polyline=8
//   MapPoint:    x=1, y=2
// ---------------------------------------------------------------------------

mod wire {
    use crate::error::{MotionvizError, MotionvizResult};

    #[derive(Debug)]
    pub(super) enum WireValue<'a> {
        Varint(u64),
        Fixed64(u64),
        Bytes(&'a [u8]),
        Fixed32(u32),
    }

    pub(super) struct WireReader<'a> {
        buf: &'a [u8],
        pos: usize,
    }

    impl<'a> WireReader<'a> {
        pub(super) fn new(buf: &'a [u8]) -> Self {
            Self { buf, pos: 0 }
        }

        pub(super) fn next_field(&mut self) -> MotionvizResult<Option<(u32, WireValue<'a>)>> {
            if self.pos == self.buf.len() {
                return Ok(None);
            }
            let tag = self.varint()?;
            let field = (tag >> 3) as u32;
            if field == 0 {
                return Err(MotionvizError::decode("field number 0 is invalid"));
            }
            let value = match tag & 0x7 {
                0 => WireValue::Varint(self.varint()?),
                1 => WireValue::Fixed64(u64::from_le_bytes(self.take(8)?.try_into().map_err(
                    |_| MotionvizError::decode("fixed64 slice length mismatch (internal)"),
                )?)),
                2 => {
                    let len = self.varint()? as usize;
                    WireValue::Bytes(self.take(len)?)
                }
                5 => WireValue::Fixed32(u32::from_le_bytes(self.take(4)?.try_into().map_err(
                    |_| MotionvizError::decode("fixed32 slice length mismatch (internal)"),
                )?)),
                other => {
                    return Err(MotionvizError::decode(format!(
                        "unsupported wire type {other} for field {field}"
                    )));
                }
            };
            Ok(Some((field, value)))
        }

        fn varint(&mut self) -> MotionvizResult<u64> {
            let mut out: u64 = 0;
            for shift in (0..64).step_by(7) {
                let Some(&byte) = self.buf.get(self.pos) else {
                    return Err(MotionvizError::decode("varint ran past end of buffer"));
                };
                self.pos += 1;
                out |= u64::from(byte & 0x7f) << shift;
                if byte & 0x80 == 0 {
                    return Ok(out);
                }
            }
            Err(MotionvizError::decode("varint longer than 10 bytes"))
        }

        fn take(&mut self, len: usize) -> MotionvizResult<&'a [u8]> {
            let end = self
                .pos
                .checked_add(len)
                .filter(|&end| end <= self.buf.len())
                .ok_or_else(|| {
                    MotionvizError::decode("length-delimited field ran past end of buffer")
                })?;
            let slice = &self.buf[self.pos..end];
            self.pos = end;
            Ok(slice)
        }
    }

    impl WireValue<'_> {
        pub(super) fn as_double(&self, what: &str) -> MotionvizResult<f64> {
            match self {
                WireValue::Fixed64(bits) => Ok(f64::from_bits(*bits)),
                _ => Err(MotionvizError::decode(format!("{what} is not a double"))),
            }
        }

        pub(super) fn as_varint(&self, what: &str) -> MotionvizResult<u64> {
            match self {
                WireValue::Varint(v) => Ok(*v),
                _ => Err(MotionvizError::decode(format!("{what} is not a varint"))),
            }
        }

        pub(super) fn as_bytes(&self, what: &str) -> MotionvizResult<&[u8]> {
            match self {
                WireValue::Bytes(b) => Ok(b),
                _ => Err(MotionvizError::decode(format!(
                    "{what} is not length-delimited"
                ))),
            }
        }
    }
}

use wire::WireReader;

pub fn parse_scenario(buf: &[u8]) -> MotionvizResult<ScenarioSnapshot> {
    let mut reader = WireReader::new(buf);
    let mut snapshot = ScenarioSnapshot::default();

    while let Some((field, value)) = reader.next_field()? {
        match field {
            2 => snapshot
                .tracks
                .push(parse_track(value.as_bytes("Scenario.tracks")?)?),
            5 => {
                snapshot.scenario_id =
                    String::from_utf8_lossy(value.as_bytes("Scenario.scenario_id")?).into_owned();
            }
            8 => snapshot
                .map_features
                .push(parse_map_feature(value.as_bytes("Scenario.map_features")?)?),
            _ => {}
        }
    }

    Ok(snapshot)
}

fn parse_track(buf: &[u8]) -> MotionvizResult<ObjectTrack> {
    let mut reader = WireReader::new(buf);
    let mut track = ObjectTrack {
        id: 0,
        object_type: ObjectType::Unset,
        states: Vec::new(),
    };

    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => track.id = value.as_varint("Track.id")? as i64,
            2 => track.object_type = ObjectType::from_proto(value.as_varint("Track.object_type")?),
            3 => track
                .states
                .push(parse_object_state(value.as_bytes("Track.states")?)?),
            _ => {}
        }
    }

    Ok(track)
}

fn parse_object_state(buf: &[u8]) -> MotionvizResult<TrackState> {
    let mut reader = WireReader::new(buf);
    let mut state = TrackState {
        x: 0.0,
        y: 0.0,
        valid: false,
    };

    while let Some((field, value)) = reader.next_field()? {
        match field {
            2 => state.x = value.as_double("ObjectState.center_x")?,
            3 => state.y = value.as_double("ObjectState.center_y")?,
            11 => state.valid = value.as_varint("ObjectState.valid")? != 0,
            _ => {}
        }
    }

    Ok(state)
}

fn parse_map_feature(buf: &[u8]) -> MotionvizResult<MapFeature> {
    let mut reader = WireReader::new(buf);
    let mut feature = MapFeature::Other;

    while let Some((field, value)) = reader.next_field()? {
        if field == 3 {
            feature =
                MapFeature::LaneCenter(parse_lane_center(value.as_bytes("MapFeature.lane")?)?);
        }
    }

    Ok(feature)
}

fn parse_lane_center(buf: &[u8]) -> MotionvizResult<Vec<Point>> {
    let mut reader = WireReader::new(buf);
    let mut polyline = Vec::new();

    while let Some((field, value)) = reader.next_field()? {
        if field == 8 {
            polyline.push(parse_map_point(value.as_bytes("LaneCenter.polyline")?)?);
        }
    }

    Ok(polyline)
}

fn parse_map_point(buf: &[u8]) -> MotionvizResult<Point> {
    let mut reader = WireReader::new(buf);
    let mut point = Point::ZERO;

    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => point.x = value.as_double("MapPoint.x")?,
            2 => point.y = value.as_double("MapPoint.y")?,
            _ => {}
        }
    }

    Ok(point)
}
