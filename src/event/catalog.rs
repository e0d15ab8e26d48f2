//! The LSL event catalog: every event name the engine dispatches and the
//! parameter list its handler must declare.

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::ast::LslType::{self, *};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum LslEvent {
    StateEntry,
    StateExit,
    TouchStart,
    Touch,
    TouchEnd,
    CollisionStart,
    Collision,
    CollisionEnd,
    LandCollisionStart,
    LandCollision,
    LandCollisionEnd,
    Timer,
    Listen,
    Sensor,
    NoSensor,
    Control,
    AtTarget,
    NotAtTarget,
    AtRotTarget,
    NotAtRotTarget,
    Money,
    Email,
    RunTimePermissions,
    Changed,
    Attach,
    Dataserver,
    MovingStart,
    MovingEnd,
    ObjectRez,
    OnRez,
    RemoteData,
    HttpResponse,
    HttpRequest,
    LinkMessage,
    TransactionResult,
}

impl LslEvent {
    /// Declared parameter types, positional.
    pub fn params(&self) -> &'static [LslType] {
        match self {
            LslEvent::StateEntry
            | LslEvent::StateExit
            | LslEvent::Timer
            | LslEvent::NoSensor
            | LslEvent::NotAtTarget
            | LslEvent::NotAtRotTarget
            | LslEvent::MovingStart
            | LslEvent::MovingEnd => &[],
            LslEvent::TouchStart
            | LslEvent::Touch
            | LslEvent::TouchEnd
            | LslEvent::CollisionStart
            | LslEvent::Collision
            | LslEvent::CollisionEnd
            | LslEvent::Sensor => &[Integer],
            LslEvent::LandCollisionStart | LslEvent::LandCollision | LslEvent::LandCollisionEnd => {
                &[Vector]
            }
            LslEvent::Listen => &[Integer, String, Key, String],
            LslEvent::Control => &[Key, Integer, Integer],
            LslEvent::AtTarget => &[Integer, Vector, Vector],
            LslEvent::AtRotTarget => &[Integer, Rotation, Rotation],
            LslEvent::Money => &[Key, Integer],
            LslEvent::Email => &[String, String, String, String, Integer],
            LslEvent::RunTimePermissions | LslEvent::Changed | LslEvent::OnRez => &[Integer],
            LslEvent::Attach | LslEvent::ObjectRez => &[Key],
            LslEvent::Dataserver => &[Key, String],
            LslEvent::RemoteData => &[Integer, Key, Key, String, Integer, String],
            LslEvent::HttpResponse => &[Key, Integer, List, String],
            LslEvent::HttpRequest => &[Key, String, String],
            LslEvent::LinkMessage => &[Integer, Integer, String, Key],
            LslEvent::TransactionResult => &[Key, Integer, String],
        }
    }

    /// Events that carry a detected-object table for `llDetected*`.
    pub fn has_detected(&self) -> bool {
        matches!(
            self,
            LslEvent::TouchStart
                | LslEvent::Touch
                | LslEvent::TouchEnd
                | LslEvent::CollisionStart
                | LslEvent::Collision
                | LslEvent::CollisionEnd
                | LslEvent::Sensor
        )
    }

    pub fn lookup(name: &str) -> Option<LslEvent> {
        name.parse().ok()
    }
}
