//! Built-in LSL constants, seeded into the global frame as read-only slots.

use std::collections::HashMap;

use lazy_static::lazy_static;

use super::value::{Rotation, Value, Vector, NULL_KEY};

pub const DEBUG_CHANNEL: i32 = 0x7FFF_FFFF;
pub const PUBLIC_CHANNEL: i32 = 0;

pub const AGENT: i32 = 0x1;
pub const ACTIVE: i32 = 0x2;
pub const PASSIVE: i32 = 0x4;
pub const SCRIPTED: i32 = 0x8;

pub const LINK_ROOT: i32 = 1;
pub const LINK_SET: i32 = -1;
pub const LINK_ALL_OTHERS: i32 = -2;
pub const LINK_ALL_CHILDREN: i32 = -3;
pub const LINK_THIS: i32 = -4;

pub const EOF: &str = "\n\n\n";

lazy_static! {
    pub static ref CONSTANTS: HashMap<&'static str, Value> = {
        let mut m = HashMap::new();
        let mut int = |name: &'static str, v: i32| {
            m.insert(name, Value::Integer(v));
        };

        int("TRUE", 1);
        int("FALSE", 0);
        int("PUBLIC_CHANNEL", PUBLIC_CHANNEL);
        int("DEBUG_CHANNEL", DEBUG_CHANNEL);

        // sensor / detected types
        int("AGENT", AGENT);
        int("AGENT_BY_LEGACY_NAME", AGENT);
        int("AGENT_BY_USERNAME", 0x10);
        int("ACTIVE", ACTIVE);
        int("PASSIVE", PASSIVE);
        int("SCRIPTED", SCRIPTED);

        // list entry types
        int("TYPE_INVALID", 0);
        int("TYPE_INTEGER", 1);
        int("TYPE_FLOAT", 2);
        int("TYPE_STRING", 3);
        int("TYPE_KEY", 4);
        int("TYPE_VECTOR", 5);
        int("TYPE_ROTATION", 6);

        int("STRING_TRIM_HEAD", 1);
        int("STRING_TRIM_TAIL", 2);
        int("STRING_TRIM", 3);

        int("LINK_ROOT", LINK_ROOT);
        int("LINK_SET", LINK_SET);
        int("LINK_ALL_OTHERS", LINK_ALL_OTHERS);
        int("LINK_ALL_CHILDREN", LINK_ALL_CHILDREN);
        int("LINK_THIS", LINK_THIS);

        int("PERMISSION_DEBIT", 0x2);
        int("PERMISSION_TAKE_CONTROLS", 0x4);
        int("PERMISSION_TRIGGER_ANIMATION", 0x10);
        int("PERMISSION_ATTACH", 0x20);
        int("PERMISSION_CHANGE_LINKS", 0x80);
        int("PERMISSION_TRACK_CAMERA", 0x400);
        int("PERMISSION_CONTROL_CAMERA", 0x800);

        int("CHANGED_INVENTORY", 0x1);
        int("CHANGED_COLOR", 0x2);
        int("CHANGED_SHAPE", 0x4);
        int("CHANGED_SCALE", 0x8);
        int("CHANGED_TEXTURE", 0x10);
        int("CHANGED_LINK", 0x20);
        int("CHANGED_ALLOWED_DROP", 0x40);
        int("CHANGED_OWNER", 0x80);
        int("CHANGED_REGION", 0x100);
        int("CHANGED_TELEPORT", 0x200);
        int("CHANGED_REGION_START", 0x400);

        int("DATA_ONLINE", 1);
        int("DATA_NAME", 2);
        int("DATA_BORN", 3);
        int("DATA_RATING", 4);
        int("DATA_PAYINFO", 8);

        int("HTTP_METHOD", 0);
        int("HTTP_MIMETYPE", 1);
        int("HTTP_BODY_MAXLENGTH", 2);
        int("HTTP_VERIFY_CERT", 3);
        int("HTTP_VERBOSE_THROTTLE", 4);
        int("HTTP_CUSTOM_HEADER", 5);
        int("HTTP_PRAGMA_NO_CACHE", 6);

        int("ALL_SIDES", -1);

        m.insert("PI", Value::Float(std::f64::consts::PI));
        m.insert("TWO_PI", Value::Float(std::f64::consts::TAU));
        m.insert("PI_BY_TWO", Value::Float(std::f64::consts::FRAC_PI_2));
        m.insert("DEG_TO_RAD", Value::Float(std::f64::consts::PI / 180.0));
        m.insert("RAD_TO_DEG", Value::Float(180.0 / std::f64::consts::PI));
        m.insert("SQRT2", Value::Float(std::f64::consts::SQRT_2));
        m.insert("NULL_KEY", Value::Key(NULL_KEY.to_string()));
        m.insert("EOF", Value::String(EOF.to_string()));
        m.insert("ZERO_VECTOR", Value::Vector(Vector::ZERO));
        m.insert("ZERO_ROTATION", Value::Rotation(Rotation::IDENTITY));
        m
    };
}

pub fn lookup(name: &str) -> Option<&'static Value> {
    CONSTANTS.get(name)
}
