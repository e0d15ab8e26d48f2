//! Scalar, vector and rotation math.

use std::f64::consts::FRAC_PI_2;

use crate::ast::LslType::{self, Float, Integer, Rotation as Rot, Vector as Vec3};
use crate::eval::value::{float_to_integer, Rotation, Vector};

use super::{
    HostCall, HostEffect::Pure, HostFunction, HostHandler, HostOutput, HostRegistry, HostResult,
};

pub(super) fn register(registry: &mut HostRegistry) {
    let pure = |name: &'static str, params: &'static [LslType], ty: LslType, handler: HostHandler| {
        HostFunction::new(name, params, Some(ty), Pure, handler)
    };
    registry.register(pure("llAbs", &[Integer], LslType::Integer, ll_abs));
    registry.register(pure("llFabs", &[Float], LslType::Float, ll_fabs));
    registry.register(pure("llFloor", &[Float], LslType::Integer, ll_floor));
    registry.register(pure("llCeil", &[Float], LslType::Integer, ll_ceil));
    registry.register(pure("llRound", &[Float], LslType::Integer, ll_round));
    registry.register(pure("llSqrt", &[Float], LslType::Float, ll_sqrt));
    registry.register(pure("llPow", &[Float, Float], LslType::Float, ll_pow));
    registry.register(pure("llSin", &[Float], LslType::Float, ll_sin));
    registry.register(pure("llCos", &[Float], LslType::Float, ll_cos));
    registry.register(pure("llTan", &[Float], LslType::Float, ll_tan));
    registry.register(pure("llAsin", &[Float], LslType::Float, ll_asin));
    registry.register(pure("llAcos", &[Float], LslType::Float, ll_acos));
    registry.register(pure("llAtan2", &[Float, Float], LslType::Float, ll_atan2));
    registry.register(pure("llLog", &[Float], LslType::Float, ll_log));
    registry.register(pure("llLog10", &[Float], LslType::Float, ll_log10));

    registry.register(pure("llVecMag", &[Vec3], LslType::Float, ll_vec_mag));
    registry.register(pure("llVecNorm", &[Vec3], LslType::Vector, ll_vec_norm));
    registry.register(pure("llVecDist", &[Vec3, Vec3], LslType::Float, ll_vec_dist));

    registry.register(pure("llEuler2Rot", &[Vec3], LslType::Rotation, ll_euler2rot));
    registry.register(pure("llRot2Euler", &[Rot], LslType::Vector, ll_rot2euler));
    registry.register(pure(
        "llAxisAngle2Rot",
        &[Vec3, Float],
        LslType::Rotation,
        ll_axis_angle2rot,
    ));
    registry.register(pure("llRot2Fwd", &[Rot], LslType::Vector, ll_rot2fwd));
    registry.register(pure("llRot2Left", &[Rot], LslType::Vector, ll_rot2left));
    registry.register(pure("llRot2Up", &[Rot], LslType::Vector, ll_rot2up));
    registry.register(pure("llAngleBetween", &[Rot, Rot], LslType::Float, ll_angle_between));
}

fn float(f: f64) -> HostResult<HostOutput> {
    Ok(HostOutput::value(f))
}

fn ll_abs(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.int(0).wrapping_abs()))
}

fn ll_fabs(call: &HostCall) -> HostResult<HostOutput> {
    float(call.float(0).abs())
}

fn ll_floor(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(float_to_integer(call.float(0).floor())))
}

fn ll_ceil(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(float_to_integer(call.float(0).ceil())))
}

/// Halves round up: `llRound(-2.5) == -2`.
fn ll_round(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(float_to_integer((call.float(0) + 0.5).floor())))
}

fn ll_sqrt(call: &HostCall) -> HostResult<HostOutput> {
    float(call.float(0).sqrt())
}

fn ll_pow(call: &HostCall) -> HostResult<HostOutput> {
    float(call.float(0).powf(call.float(1)))
}

fn ll_sin(call: &HostCall) -> HostResult<HostOutput> {
    float(call.float(0).sin())
}

fn ll_cos(call: &HostCall) -> HostResult<HostOutput> {
    float(call.float(0).cos())
}

fn ll_tan(call: &HostCall) -> HostResult<HostOutput> {
    float(call.float(0).tan())
}

fn ll_asin(call: &HostCall) -> HostResult<HostOutput> {
    float(call.float(0).asin())
}

fn ll_acos(call: &HostCall) -> HostResult<HostOutput> {
    float(call.float(0).acos())
}

fn ll_atan2(call: &HostCall) -> HostResult<HostOutput> {
    float(call.float(0).atan2(call.float(1)))
}

/// Non-positive input gives 0 rather than NaN.
fn ll_log(call: &HostCall) -> HostResult<HostOutput> {
    let x = call.float(0);
    float(if x > 0.0 { x.ln() } else { 0.0 })
}

fn ll_log10(call: &HostCall) -> HostResult<HostOutput> {
    let x = call.float(0);
    float(if x > 0.0 { x.log10() } else { 0.0 })
}

fn ll_vec_mag(call: &HostCall) -> HostResult<HostOutput> {
    float(call.vector(0).magnitude())
}

fn ll_vec_norm(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.vector(0).normalize()))
}

fn ll_vec_dist(call: &HostCall) -> HostResult<HostOutput> {
    let (a, b) = (call.vector(0), call.vector(1));
    float(Vector::new(a.x - b.x, a.y - b.y, a.z - b.z).magnitude())
}

pub fn euler_to_rot(v: &Vector) -> Rotation {
    let (sx, cx) = (v.x / 2.0).sin_cos();
    let (sy, cy) = (v.y / 2.0).sin_cos();
    let (sz, cz) = (v.z / 2.0).sin_cos();
    Rotation::new(
        sx * cy * cz + cx * sy * sz,
        cx * sy * cz - sx * cy * sz,
        cx * cy * sz + sx * sy * cz,
        cx * cy * cz - sx * sy * sz,
    )
}

pub fn rot_to_euler(r: &Rotation) -> Vector {
    let m = r.x * r.x + r.y * r.y + r.z * r.z + r.s * r.s;
    if m == 0.0 {
        return Vector::ZERO;
    }
    let n = 2.0 * (r.y * r.s + r.x * r.z);
    let p = m * m - n * n;
    if p > 0.0 {
        Vector::new(
            (2.0 * (r.x * r.s - r.y * r.z)).atan2(-r.x * r.x - r.y * r.y + r.z * r.z + r.s * r.s),
            n.atan2(p.sqrt()),
            (2.0 * (r.z * r.s - r.x * r.y)).atan2(r.x * r.x - r.y * r.y - r.z * r.z + r.s * r.s),
        )
    } else {
        // gimbal lock
        let z = (r.z * r.s + r.x * r.y).atan2(0.5 - r.x * r.x - r.z * r.z);
        Vector::new(0.0, FRAC_PI_2.copysign(n), z)
    }
}

fn ll_euler2rot(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(euler_to_rot(&call.vector(0))))
}

fn ll_rot2euler(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(rot_to_euler(&call.rotation(0))))
}

fn ll_axis_angle2rot(call: &HostCall) -> HostResult<HostOutput> {
    let axis = call.vector(0).normalize();
    let (s, c) = (call.float(1) / 2.0).sin_cos();
    Ok(HostOutput::value(Rotation::new(axis.x * s, axis.y * s, axis.z * s, c)))
}

fn axis(call: &HostCall, unit: Vector) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.rotation(0).normalize().apply(&unit)))
}

fn ll_rot2fwd(call: &HostCall) -> HostResult<HostOutput> {
    axis(call, Vector::new(1.0, 0.0, 0.0))
}

fn ll_rot2left(call: &HostCall) -> HostResult<HostOutput> {
    axis(call, Vector::new(0.0, 1.0, 0.0))
}

fn ll_rot2up(call: &HostCall) -> HostResult<HostOutput> {
    axis(call, Vector::new(0.0, 0.0, 1.0))
}

fn ll_angle_between(call: &HostCall) -> HostResult<HostOutput> {
    let a = call.rotation(0).normalize();
    let b = call.rotation(1).normalize();
    let r = a.conjugate().compose(&b);
    let vector = (r.x * r.x + r.y * r.y + r.z * r.z).sqrt();
    float(2.0 * vector.atan2(r.s.abs()))
}
