//! Sensor sweeps and the `llDetected*` accessors.

use crate::ast::LslType::{self, Float, Integer, Key, String as Str};
use crate::event::{DetectedObject, LslEvent};
use crate::eval::value::{Rotation, Value, Vector, NULL_KEY};
use crate::service::sensor::SensorQuery;

use super::{
    HostCall,
    HostEffect::{AsyncCompletion, Pure, SideEffect},
    HostFunction, HostHandler, HostOutput, HostRegistry, HostResult,
};

pub(super) fn register(registry: &mut HostRegistry) {
    registry.register(HostFunction::new(
        "llSensor",
        &[Str, Key, Integer, Float, Float],
        None,
        AsyncCompletion {
            event: LslEvent::Sensor,
        },
        ll_sensor,
    ));
    registry.register(HostFunction::new(
        "llSensorRepeat",
        &[Str, Key, Integer, Float, Float, Float],
        None,
        AsyncCompletion {
            event: LslEvent::Sensor,
        },
        ll_sensor_repeat,
    ));
    registry.register(HostFunction::new("llSensorRemove", &[], None, SideEffect, ll_sensor_remove));

    let detected = |name: &'static str, ty: LslType, handler: HostHandler| {
        HostFunction::new(name, &[Integer], Some(ty), Pure, handler)
    };
    registry.register(detected("llDetectedName", LslType::String, ll_detected_name));
    registry.register(detected("llDetectedKey", LslType::Key, ll_detected_key));
    registry.register(detected("llDetectedOwner", LslType::Key, ll_detected_owner));
    registry.register(detected("llDetectedType", LslType::Integer, ll_detected_type));
    registry.register(detected("llDetectedPos", LslType::Vector, ll_detected_pos));
    registry.register(detected("llDetectedRot", LslType::Rotation, ll_detected_rot));
    registry.register(detected("llDetectedVel", LslType::Vector, ll_detected_vel));
}

fn query(call: &HostCall) -> SensorQuery {
    SensorQuery {
        name: call.string(0),
        key: call.string(1),
        type_mask: call.int(2),
        range: call.float(3),
        arc: call.float(4),
    }
}

fn ll_sensor(call: &HostCall) -> HostResult<HostOutput> {
    let env = call.env;
    if let Err(e) = env.sensors.sense(&query(call), &env.vantage()) {
        env.warn(crate::output::DiagnosticKind::QueueOverflow, e.to_string());
    }
    Ok(HostOutput::void())
}

fn ll_sensor_repeat(call: &HostCall) -> HostResult<HostOutput> {
    let env = call.env;
    env.sensors.repeat(query(call), env.vantage(), call.float(5));
    Ok(HostOutput::void())
}

fn ll_sensor_remove(call: &HostCall) -> HostResult<HostOutput> {
    call.env.sensors.cancel();
    Ok(HostOutput::void())
}

/// Reads one field of a detected row; out-of-range rows give `default`.
fn field<T: Into<Value>>(
    call: &HostCall,
    default: T,
    read: impl FnOnce(&DetectedObject) -> T,
) -> HostResult<HostOutput> {
    Ok(HostOutput::value(match call.detected(0) {
        Some(row) => read(row),
        None => default,
    }))
}

fn ll_detected_name(call: &HostCall) -> HostResult<HostOutput> {
    field(call, String::new(), |d| d.name.clone())
}

fn ll_detected_key(call: &HostCall) -> HostResult<HostOutput> {
    let key = call.detected(0).map_or(NULL_KEY, |d| d.key.as_str());
    Ok(HostOutput::value(Value::key(key)))
}

fn ll_detected_owner(call: &HostCall) -> HostResult<HostOutput> {
    let key = call.detected(0).map_or(NULL_KEY, |d| d.owner.as_str());
    Ok(HostOutput::value(Value::key(key)))
}

fn ll_detected_type(call: &HostCall) -> HostResult<HostOutput> {
    field(call, 0, |d| d.object_type)
}

fn ll_detected_pos(call: &HostCall) -> HostResult<HostOutput> {
    field(call, Vector::ZERO, |d| d.position)
}

fn ll_detected_rot(call: &HostCall) -> HostResult<HostOutput> {
    field(call, Rotation::IDENTITY, |d| d.rotation)
}

fn ll_detected_vel(call: &HostCall) -> HostResult<HostOutput> {
    field(call, Vector::ZERO, |d| d.velocity)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{call, call_detected, env};
    use crate::eval::constants::AGENT;
    use crate::eval::value::{Value, Vector, NULL_KEY};
    use crate::event::{DetectedObject, LslEvent};

    const BOB: &str = "a2e76fcd-9360-4f6d-a924-000000000003";

    #[test]
    fn test_detected_accessors() {
        let (env, _) = env();
        let rows = vec![DetectedObject::avatar("Bob", BOB, Vector::new(1.0, 2.0, 3.0))];
        let name = call_detected(&env, "llDetectedName", vec![Value::Integer(0)], &rows);
        assert_eq!(name.value, Value::from("Bob"));
        let key = call_detected(&env, "llDetectedKey", vec![Value::Integer(0)], &rows);
        assert_eq!(key.value, Value::Key(BOB.to_string()));
        let ty = call_detected(&env, "llDetectedType", vec![Value::Integer(0)], &rows);
        assert_eq!(ty.value, Value::Integer(AGENT));

        let missing = call_detected(&env, "llDetectedKey", vec![Value::Integer(3)], &rows);
        assert_eq!(missing.value, Value::Key(NULL_KEY.to_string()));
        let negative = call_detected(&env, "llDetectedName", vec![Value::Integer(-1)], &rows);
        assert_eq!(negative.value, Value::from(""));
    }

    #[test]
    fn test_sensor_finds_placed_avatar() {
        let (env, _) = env();
        let here = env.object().position;
        env.sensors.place(DetectedObject::avatar(
            "Bob",
            BOB,
            Vector::new(here.x + 3.0, here.y, here.z),
        ));
        call(
            &env,
            "llSensor",
            vec![
                Value::from(""),
                Value::key(NULL_KEY),
                Value::Integer(AGENT),
                Value::Float(10.0),
                Value::Float(std::f64::consts::PI),
            ],
        );
        let event = env.queue.pop().unwrap();
        assert_eq!(event.kind, LslEvent::Sensor);
        assert_eq!(event.detected[0].key, BOB);
    }
}
