use std::time::Duration;

use chrono::{Timelike, Utc};

use crate::ast::LslType::{self, Float};

use super::{
    HostCall,
    HostEffect::{SideEffect, Sleeping},
    HostFunction, HostOutput, HostRegistry, HostResult,
};

pub(super) fn register(registry: &mut HostRegistry) {
    registry.register(HostFunction::new(
        "llSetTimerEvent",
        &[Float],
        None,
        SideEffect,
        ll_set_timer_event,
    ));
    registry.register(HostFunction::new("llSleep", &[Float], None, Sleeping, ll_sleep));
    registry.register(HostFunction::new(
        "llGetTime",
        &[],
        Some(LslType::Float),
        SideEffect,
        ll_get_time,
    ));
    registry.register(HostFunction::new("llResetTime", &[], None, SideEffect, ll_reset_time));
    registry.register(HostFunction::new(
        "llGetAndResetTime",
        &[],
        Some(LslType::Float),
        SideEffect,
        ll_get_and_reset_time,
    ));
    registry.register(HostFunction::new(
        "llGetUnixTime",
        &[],
        Some(LslType::Integer),
        SideEffect,
        ll_get_unix_time,
    ));
    registry.register(HostFunction::new(
        "llGetTimestamp",
        &[],
        Some(LslType::String),
        SideEffect,
        ll_get_timestamp,
    ));
    registry.register(HostFunction::new(
        "llGetDate",
        &[],
        Some(LslType::String),
        SideEffect,
        ll_get_date,
    ));
    registry.register(HostFunction::new(
        "llGetGMTclock",
        &[],
        Some(LslType::Float),
        SideEffect,
        ll_get_gmt_clock,
    ));
}

fn ll_set_timer_event(call: &HostCall) -> HostResult<HostOutput> {
    call.env.timer.set(call.float(0));
    Ok(HostOutput::void())
}

fn ll_sleep(call: &HostCall) -> HostResult<HostOutput> {
    let seconds = call.float(0);
    if !(seconds > 0.0) || !seconds.is_finite() {
        return Ok(HostOutput::void());
    }
    Ok(HostOutput::sleep(Duration::from_secs_f64(seconds)))
}

fn ll_get_time(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.env.script_time()))
}

fn ll_reset_time(call: &HostCall) -> HostResult<HostOutput> {
    call.env.reset_time();
    Ok(HostOutput::void())
}

fn ll_get_and_reset_time(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.env.reset_time()))
}

fn ll_get_unix_time(_call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(Utc::now().timestamp() as i32))
}

fn ll_get_timestamp(_call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
    ))
}

fn ll_get_date(_call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(Utc::now().format("%Y-%m-%d").to_string()))
}

fn ll_get_gmt_clock(_call: &HostCall) -> HostResult<HostOutput> {
    let now = Utc::now();
    Ok(HostOutput::value(
        now.num_seconds_from_midnight() as f64 + now.nanosecond() as f64 / 1e9,
    ))
}
