//! Object properties and identity.

use rand::Rng;

use crate::ast::LslType::{self, Float, Key, Rotation, String as Str, Vector};
use crate::eval::value::Value;

use super::{
    HostCall,
    HostEffect::{Pure, SideEffect},
    HostFunction, HostHandler, HostOutput, HostRegistry, HostResult,
};

pub(super) fn register(registry: &mut HostRegistry) {
    let getter = |name: &'static str, ty: LslType, handler: HostHandler| {
        HostFunction::new(name, &[], Some(ty), SideEffect, handler)
    };
    registry.register(getter("llGetKey", LslType::Key, ll_get_key));
    registry.register(getter("llGetOwner", LslType::Key, ll_get_owner));
    registry.register(getter("llGetObjectName", LslType::String, ll_get_object_name));
    registry.register(getter("llGetObjectDesc", LslType::String, ll_get_object_desc));
    registry.register(getter("llGetPos", LslType::Vector, ll_get_pos));
    registry.register(getter("llGetRot", LslType::Rotation, ll_get_rot));
    registry.register(getter("llGetRegionName", LslType::String, ll_get_region_name));
    registry.register(getter("llGetScriptName", LslType::String, ll_get_script_name));
    registry.register(getter("llGenerateKey", LslType::Key, ll_generate_key));

    registry.register(HostFunction::new(
        "llSetObjectName",
        &[Str],
        None,
        SideEffect,
        ll_set_object_name,
    ));
    registry.register(HostFunction::new(
        "llSetObjectDesc",
        &[Str],
        None,
        SideEffect,
        ll_set_object_desc,
    ));
    registry.register(HostFunction::new("llSetPos", &[Vector], None, SideEffect, ll_set_pos));
    registry.register(HostFunction::new("llSetRot", &[Rotation], None, SideEffect, ll_set_rot));
    registry.register(HostFunction::new(
        "llKey2Name",
        &[Key],
        Some(LslType::String),
        SideEffect,
        ll_key2name,
    ));
    registry.register(HostFunction::new("llFrand", &[Float], Some(LslType::Float), Pure, ll_frand));
}

fn ll_get_key(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(Value::key(&call.env.object().key)))
}

fn ll_get_owner(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(Value::key(&call.env.object().owner_key)))
}

fn ll_get_object_name(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.env.object().name))
}

fn ll_get_object_desc(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.env.object().description))
}

fn ll_get_pos(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.env.object().position))
}

fn ll_get_rot(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.env.object().rotation))
}

fn ll_get_region_name(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.env.object().region))
}

fn ll_get_script_name(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.env.object().script_name))
}

fn ll_generate_key(_call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(Value::Key(uuid::Uuid::new_v4().to_string())))
}

fn ll_set_object_name(call: &HostCall) -> HostResult<HostOutput> {
    let name = call.string(0);
    call.env.update_object(|o| o.name = name);
    Ok(HostOutput::void())
}

fn ll_set_object_desc(call: &HostCall) -> HostResult<HostOutput> {
    let description = call.string(0);
    call.env.update_object(|o| o.description = description);
    Ok(HostOutput::void())
}

fn ll_set_pos(call: &HostCall) -> HostResult<HostOutput> {
    let position = call.vector(0);
    call.env.update_object(|o| o.position = position);
    Ok(HostOutput::void())
}

fn ll_set_rot(call: &HostCall) -> HostResult<HostOutput> {
    let rotation = call.rotation(0).normalize();
    call.env.update_object(|o| o.rotation = rotation);
    Ok(HostOutput::void())
}

fn ll_key2name(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.env.key_name(&call.string(0))))
}

/// Uniform in `[0, max)`; a negative `max` gives `(max, 0]`.
fn ll_frand(call: &HostCall) -> HostResult<HostOutput> {
    let max = call.float(0);
    let unit: f64 = rand::thread_rng().gen();
    Ok(HostOutput::value(unit * max))
}
