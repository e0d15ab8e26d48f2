//! Chat output and channel listeners.

use crate::ast::LslType::{self, Float, Integer, Key, String as Str, Vector};
use crate::output::{ChatVolume, DiagnosticKind};

use super::{
    HostCall, HostEffect::SideEffect, HostFunction, HostHandler, HostOutput, HostRegistry,
    HostResult,
};

/// Chat longer than this many bytes is cut.
const MAX_CHAT_BYTES: usize = 1024;

pub(super) fn register(registry: &mut HostRegistry) {
    let chat = |name: &'static str, handler: HostHandler| {
        HostFunction::new(name, &[Integer, Str], None, SideEffect, handler)
    };
    registry.register(chat("llSay", ll_say));
    registry.register(chat("llShout", ll_shout));
    registry.register(chat("llWhisper", ll_whisper));
    registry.register(chat("llRegionSay", ll_region_say));

    registry.register(HostFunction::new(
        "llRegionSayTo",
        &[Key, Integer, Str],
        None,
        SideEffect,
        ll_region_say_to,
    ));
    registry.register(HostFunction::new("llOwnerSay", &[Str], None, SideEffect, ll_owner_say));
    registry.register(HostFunction::new(
        "llInstantMessage",
        &[Key, Str],
        None,
        SideEffect,
        ll_instant_message,
    ));
    registry.register(HostFunction::new(
        "llSetText",
        &[Str, Vector, Float],
        None,
        SideEffect,
        ll_set_text,
    ));

    registry.register(HostFunction::new(
        "llListen",
        &[Integer, Str, Key, Str],
        Some(LslType::Integer),
        SideEffect,
        ll_listen,
    ));
    registry.register(HostFunction::new(
        "llListenRemove",
        &[Integer],
        None,
        SideEffect,
        ll_listen_remove,
    ));
    registry.register(HostFunction::new(
        "llListenControl",
        &[Integer, Integer],
        None,
        SideEffect,
        ll_listen_control,
    ));
}

fn truncate(text: &str) -> &str {
    if text.len() <= MAX_CHAT_BYTES {
        return text;
    }
    let mut end = MAX_CHAT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn say(call: &HostCall, volume: ChatVolume) -> HostResult<HostOutput> {
    call.env.chat(call.int(0), truncate(&call.string(1)), volume);
    Ok(HostOutput::void())
}

fn ll_say(call: &HostCall) -> HostResult<HostOutput> {
    say(call, ChatVolume::Say)
}

fn ll_shout(call: &HostCall) -> HostResult<HostOutput> {
    say(call, ChatVolume::Shout)
}

fn ll_whisper(call: &HostCall) -> HostResult<HostOutput> {
    say(call, ChatVolume::Whisper)
}

fn ll_region_say(call: &HostCall) -> HostResult<HostOutput> {
    say(call, ChatVolume::Region)
}

fn ll_region_say_to(call: &HostCall) -> HostResult<HostOutput> {
    call.env
        .direct(&call.string(0), call.int(1), truncate(&call.string(2)));
    Ok(HostOutput::void())
}

fn ll_owner_say(call: &HostCall) -> HostResult<HostOutput> {
    let owner = call.env.object().owner_key;
    call.env.direct(&owner, 0, truncate(&call.string(0)));
    Ok(HostOutput::void())
}

fn ll_instant_message(call: &HostCall) -> HostResult<HostOutput> {
    call.env.direct(&call.string(0), 0, truncate(&call.string(1)));
    Ok(HostOutput::void())
}

fn ll_set_text(call: &HostCall) -> HostResult<HostOutput> {
    let text = call.string(0);
    call.env.update_object(|o| o.text = text.clone());
    call.env.chat(0, &text, ChatVolume::Text);
    Ok(HostOutput::void())
}

fn ll_listen(call: &HostCall) -> HostResult<HostOutput> {
    let channel = call.int(0);
    match call
        .env
        .listeners
        .add(channel, &call.string(1), &call.string(2), &call.string(3))
    {
        Some(handle) => Ok(HostOutput::value(handle)),
        None => {
            call.env.warn(
                DiagnosticKind::ListenerLimit,
                format!("too many listeners, llListen on channel {} ignored", channel),
            );
            Ok(HostOutput::value(-1))
        }
    }
}

fn ll_listen_remove(call: &HostCall) -> HostResult<HostOutput> {
    call.env.listeners.remove(call.int(0));
    Ok(HostOutput::void())
}

fn ll_listen_control(call: &HostCall) -> HostResult<HostOutput> {
    call.env.listeners.set_active(call.int(0), call.int(1) != 0);
    Ok(HostOutput::void())
}
