//! Translation of the internal session model into the narrower protocol vocabularies
//!
//! The PM5 and ANT+ FE profiles describe a session with small fixed enumerations. The
//! functions here are pure decision tables over a `MetricsSnapshot`.

use crate::metrics::{MetricsSnapshot, SegmentKind, SegmentMetrics, SessionState, StrokeState};

// ----------------------------------------------------------------------------
// PM5 Enumerations
// ----------------------------------------------------------------------------

/// PM5 workout type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkoutType {
    JustRowNoSplits = 0,
    JustRowSplits = 1,
    FixedDistNoSplits = 2,
    FixedDistSplits = 3,
    FixedTimeNoSplits = 4,
    FixedTimeSplits = 5,
    FixedTimeInterval = 6,
    FixedDistInterval = 7,
    VariableInterval = 8,
    VariableUndefinedRestInterval = 9,
    FixedCalorie = 10,
    FixedWattMinutes = 11,
    FixedCalsInterval = 12,
}

/// PM5 interval type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IntervalType {
    Time = 0,
    Distance = 1,
    Rest = 2,
    TimeRestUndefined = 3,
    DistanceRestUndefined = 4,
    RestUndefined = 5,
    Calorie = 6,
    CalorieRestUndefined = 7,
    WattMinute = 8,
    WattMinuteRestUndefined = 9,
    None = 255,
}

/// PM5 workout state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkoutState {
    WaitToBegin = 0,
    WorkoutRow = 1,
    CountdownPause = 2,
    IntervalRest = 3,
    IntervalWorkTime = 4,
    IntervalWorkDistance = 5,
    IntervalRestEndToWorkTime = 6,
    IntervalRestEndToWorkDistance = 7,
    IntervalWorkTimeToRest = 8,
    IntervalWorkDistanceToRest = 9,
    WorkoutEnd = 10,
    Terminate = 11,
    WorkoutLogged = 12,
    Rearm = 13,
}

/// PM5 rowing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RowingState {
    Inactive = 0,
    Active = 1,
}

/// PM5 stroke state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Pm5StrokeState {
    WaitingForWheelToReachMinSpeed = 0,
    WaitingForWheelToAccelerate = 1,
    Driving = 2,
    DwellingAfterDrive = 3,
    Recovery = 4,
}

/// PM5 workout duration type, stored in the upper bits of the duration byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DurationType {
    Time = 0x00,
    Calories = 0x40,
    Distance = 0x80,
    Watts = 0xC0,
}

/// ANT+ fitness equipment state, already shifted into the upper nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FitnessEquipmentState {
    Asleep = 0x10,
    Ready = 0x20,
    InUse = 0x30,
    Finished = 0x40,
}

macro_rules! wire_value {
    ($($ty:ty),*) => {
        $(impl $ty {
            /// Value as sent on the wire
            pub fn as_u8(self) -> u8 {
                self as u8
            }
        })*
    };
}

wire_value!(
    WorkoutType,
    IntervalType,
    WorkoutState,
    RowingState,
    Pm5StrokeState,
    DurationType,
    FitnessEquipmentState
);

// ----------------------------------------------------------------------------
// Decision Tables
// ----------------------------------------------------------------------------

/// Workout type from the interval count and the workout/interval/split kinds
pub fn workout_type(snapshot: &MetricsSnapshot) -> WorkoutType {
    let workout = &snapshot.workout;
    let split = &snapshot.split;

    if workout.number_of_intervals > 1 {
        if workout.kind != snapshot.interval.kind {
            return WorkoutType::VariableInterval;
        }
        return match workout.kind {
            SegmentKind::Time => WorkoutType::FixedTimeInterval,
            SegmentKind::Distance => WorkoutType::FixedDistInterval,
            SegmentKind::Calories => WorkoutType::FixedCalsInterval,
            SegmentKind::JustRow | SegmentKind::Rest => WorkoutType::VariableInterval,
        };
    }

    match workout.kind {
        SegmentKind::JustRow | SegmentKind::Rest => {
            if split.kind == SegmentKind::JustRow || split.target_size().is_none() {
                WorkoutType::JustRowNoSplits
            } else {
                WorkoutType::JustRowSplits
            }
        }
        SegmentKind::Distance => {
            if split.kind == SegmentKind::Distance && split.distance.target == workout.distance.target {
                WorkoutType::FixedDistNoSplits
            } else {
                WorkoutType::FixedDistSplits
            }
        }
        SegmentKind::Time => {
            if split.kind == SegmentKind::Time && split.time_spent.target == workout.time_spent.target {
                WorkoutType::FixedTimeNoSplits
            } else {
                WorkoutType::FixedTimeSplits
            }
        }
        SegmentKind::Calories => WorkoutType::FixedCalorie,
    }
}

/// Interval type of a single segment, independent of the session state
pub fn segment_interval_type(segment: &SegmentMetrics) -> IntervalType {
    match segment.kind {
        SegmentKind::Time => IntervalType::Time,
        SegmentKind::Distance => IntervalType::Distance,
        SegmentKind::Calories => IntervalType::Calorie,
        SegmentKind::Rest => IntervalType::Rest,
        SegmentKind::JustRow => IntervalType::None,
    }
}

/// Interval type of the running interval; a planned pause is reported as rest
pub fn interval_type(snapshot: &MetricsSnapshot) -> IntervalType {
    if snapshot.session_state == SessionState::Paused && !snapshot.is_unplanned_pause {
        return IntervalType::Rest;
    }
    match snapshot.interval.kind {
        SegmentKind::JustRow => match snapshot.split.kind {
            SegmentKind::Time => IntervalType::Time,
            SegmentKind::Distance => IntervalType::Distance,
            SegmentKind::Calories => IntervalType::Calorie,
            _ => IntervalType::None,
        },
        _ => segment_interval_type(&snapshot.interval),
    }
}

/// Workout state from the session state and interval structure
pub fn workout_state(snapshot: &MetricsSnapshot) -> WorkoutState {
    match snapshot.session_state {
        SessionState::WaitingForStart => WorkoutState::WaitToBegin,
        SessionState::Stopped => WorkoutState::WorkoutEnd,
        // The PM5 has no notion of an unplanned pause, it simply keeps rowing
        SessionState::Paused if snapshot.is_unplanned_pause => WorkoutState::WorkoutRow,
        SessionState::Paused => WorkoutState::IntervalRest,
        SessionState::Rowing if snapshot.workout.number_of_intervals > 1 => {
            match snapshot.interval.kind {
                SegmentKind::Time | SegmentKind::Calories => WorkoutState::IntervalWorkTime,
                SegmentKind::Distance => WorkoutState::IntervalWorkDistance,
                SegmentKind::Rest => WorkoutState::IntervalRest,
                SegmentKind::JustRow => WorkoutState::WorkoutRow,
            }
        }
        SessionState::Rowing => WorkoutState::WorkoutRow,
    }
}

pub fn rowing_state(snapshot: &MetricsSnapshot) -> RowingState {
    if snapshot.session_state == SessionState::Rowing {
        RowingState::Active
    } else {
        RowingState::Inactive
    }
}

pub fn pm5_stroke_state(state: StrokeState) -> Pm5StrokeState {
    match state {
        StrokeState::WaitingForDrive => Pm5StrokeState::WaitingForWheelToAccelerate,
        StrokeState::Drive => Pm5StrokeState::Driving,
        StrokeState::Recovery => Pm5StrokeState::Recovery,
        StrokeState::Stopped => Pm5StrokeState::WaitingForWheelToReachMinSpeed,
    }
}

pub fn duration_type(segment: &SegmentMetrics) -> DurationType {
    match segment.kind {
        SegmentKind::Distance => DurationType::Distance,
        SegmentKind::Calories => DurationType::Calories,
        SegmentKind::Time | SegmentKind::JustRow | SegmentKind::Rest => DurationType::Time,
    }
}

pub fn fitness_equipment_state(state: SessionState) -> FitnessEquipmentState {
    match state {
        SessionState::WaitingForStart => FitnessEquipmentState::Ready,
        SessionState::Rowing | SessionState::Paused => FitnessEquipmentState::InUse,
        SessionState::Stopped => FitnessEquipmentState::Finished,
    }
}
