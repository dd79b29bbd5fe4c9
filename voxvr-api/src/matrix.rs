//! Conversions between the runtime's row-major pose/projection matrices and
//! the engine's column-major representation, plus the small set of matrix
//! operations the VR layer needs.
//!
//! Euler convention: rotations compose as `R = Ry(yaw) * Rx(pitch) * Rz(roll)`
//! (YXZ). `euler_yxz` decomposes under the same convention and falls back to
//! `roll = 0` at the gimbal poles.

/// Row-major 3x4 rigid transform as delivered by the runtime.
pub type HmdMatrix34 = [[f32; 4]; 3];

/// Row-major 4x4 projection as delivered by the runtime.
pub type HmdMatrix44 = [[f32; 4]; 4];

/// Column-major 4x4 matrix in the engine's convention.
pub type Matrix = [f32; 16];

#[inline]
pub fn from_hmd34(m: &HmdMatrix34) -> Matrix {
    [
        m[0][0], m[1][0], m[2][0], 0.0, //
        m[0][1], m[1][1], m[2][1], 0.0, //
        m[0][2], m[1][2], m[2][2], 0.0, //
        m[0][3], m[1][3], m[2][3], 1.0,
    ]
}

#[inline]
pub fn from_hmd44(m: &HmdMatrix44) -> Matrix {
    [
        m[0][0], m[1][0], m[2][0], m[3][0], //
        m[0][1], m[1][1], m[2][1], m[3][1], //
        m[0][2], m[1][2], m[2][2], m[3][2], //
        m[0][3], m[1][3], m[2][3], m[3][3],
    ]
}

#[inline]
pub fn to_hmd34(m: &Matrix) -> HmdMatrix34 {
    [
        [m[0], m[4], m[8], m[12]],
        [m[1], m[5], m[9], m[13]],
        [m[2], m[6], m[10], m[14]],
    ]
}

/// `a * b`, column-major.
pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    let mut out = [0.0f32; 16];
    for col in 0..4 {
        for row in 0..4 {
            let mut sum = 0.0;
            for k in 0..4 {
                sum += a[k * 4 + row] * b[col * 4 + k];
            }
            out[col * 4 + row] = sum;
        }
    }
    out
}

/// Full inverse via the adjoint; `None` for a singular matrix.
pub fn inverse(m: &Matrix) -> Option<Matrix> {
    let det = determinant4x4(m);
    if det == 0.0 {
        return None;
    }

    let mut out = adjoint(m);
    for v in out.iter_mut() {
        *v /= det;
    }
    Some(out)
}

fn adjoint(m: &Matrix) -> Matrix {
    let mut t = [0.0f32; 16];

    t[0] = det3(m[5], m[9], m[13], m[6], m[10], m[14], m[7], m[11], m[15]);
    t[4] = -det3(m[4], m[8], m[12], m[6], m[10], m[14], m[7], m[11], m[15]);
    t[8] = det3(m[4], m[8], m[12], m[5], m[9], m[13], m[7], m[11], m[15]);
    t[12] = -det3(m[4], m[8], m[12], m[5], m[9], m[13], m[6], m[10], m[14]);

    t[1] = -det3(m[1], m[9], m[13], m[2], m[10], m[14], m[3], m[11], m[15]);
    t[5] = det3(m[0], m[8], m[12], m[2], m[10], m[14], m[3], m[11], m[15]);
    t[9] = -det3(m[0], m[8], m[12], m[1], m[9], m[13], m[3], m[11], m[15]);
    t[13] = det3(m[0], m[8], m[12], m[1], m[9], m[13], m[2], m[10], m[14]);

    t[2] = det3(m[1], m[5], m[13], m[2], m[6], m[14], m[3], m[7], m[15]);
    t[6] = -det3(m[0], m[4], m[12], m[2], m[6], m[14], m[3], m[7], m[15]);
    t[10] = det3(m[0], m[4], m[12], m[1], m[5], m[13], m[3], m[7], m[15]);
    t[14] = -det3(m[0], m[4], m[12], m[1], m[5], m[13], m[2], m[6], m[14]);

    t[3] = -det3(m[1], m[5], m[9], m[2], m[6], m[10], m[3], m[7], m[11]);
    t[7] = det3(m[0], m[4], m[8], m[2], m[6], m[10], m[3], m[7], m[11]);
    t[11] = -det3(m[0], m[4], m[8], m[1], m[5], m[9], m[3], m[7], m[11]);
    t[15] = det3(m[0], m[4], m[8], m[1], m[5], m[9], m[2], m[6], m[10]);

    t
}

fn determinant4x4(m: &Matrix) -> f32 {
    m[0] * det3(m[5], m[9], m[13], m[6], m[10], m[14], m[7], m[11], m[15])
        - m[1] * det3(m[4], m[8], m[12], m[6], m[10], m[14], m[7], m[11], m[15])
        + m[2] * det3(m[4], m[8], m[12], m[5], m[9], m[13], m[7], m[11], m[15])
        - m[3] * det3(m[4], m[8], m[12], m[5], m[9], m[13], m[6], m[10], m[14])
}

#[allow(clippy::too_many_arguments)]
fn det3(a1: f32, a2: f32, a3: f32, b1: f32, b2: f32, b3: f32, c1: f32, c2: f32, c3: f32) -> f32 {
    a1 * det2(b2, b3, c2, c3) - b1 * det2(a2, a3, c2, c3) + c1 * det2(a2, a3, b2, b3)
}

#[inline]
fn det2(a: f32, b: f32, c: f32, d: f32) -> f32 {
    a * d - b * c
}

pub fn translation(x: f32, y: f32, z: f32) -> Matrix {
    let mut m: Matrix = identity_matrix!();
    m[12] = x;
    m[13] = y;
    m[14] = z;
    m
}

pub fn rotation_x(angle: f32) -> Matrix {
    let (s, c) = angle.sin_cos();
    [
        1.0, 0.0, 0.0, 0.0, //
        0.0, c, s, 0.0, //
        0.0, -s, c, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

pub fn rotation_y(angle: f32) -> Matrix {
    let (s, c) = angle.sin_cos();
    [
        c, 0.0, -s, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        s, 0.0, c, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

pub fn rotation_z(angle: f32) -> Matrix {
    let (s, c) = angle.sin_cos();
    [
        c, s, 0.0, 0.0, //
        -s, c, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

/// `Ry(yaw) * Rx(pitch) * Rz(roll)`, the crate's Euler convention.
pub fn rotation_yxz(yaw: f32, pitch: f32, roll: f32) -> Matrix {
    multiply(&rotation_y(yaw), &multiply(&rotation_x(pitch), &rotation_z(roll)))
}

/// Decompose the rotation part of `m` into `(yaw, pitch, roll)` radians under
/// the `Ry * Rx * Rz` convention. At the gimbal poles (`|sin pitch| ~ 1`) the
/// yaw/roll split is ambiguous; roll is reported as zero.
pub fn euler_yxz(m: &Matrix) -> (f32, f32, f32) {
    let sp = (-m[9]).clamp(-1.0, 1.0);
    let pitch = sp.asin();
    if m[9].abs() < 0.9999 {
        let yaw = m[8].atan2(m[10]);
        let roll = m[1].atan2(m[5]);
        (yaw, pitch, roll)
    } else {
        let yaw = (-m[2]).atan2(m[0]);
        (yaw, pitch, 0.0)
    }
}

/// View matrix for a camera at `pos` looking with the given yaw/pitch:
/// `Rx(pitch) * Ry(yaw) * T(-pos)`.
pub fn view_rot(pos: [f32; 3], yaw: f32, pitch: f32) -> Matrix {
    multiply(
        &rotation_x(pitch),
        &multiply(&rotation_y(yaw), &translation(-pos[0], -pos[1], -pos[2])),
    )
}

/// Unit look direction for the given yaw/pitch. Zero yaw and pitch face -Z;
/// positive pitch looks down.
pub fn dir_vector(yaw: f32, pitch: f32) -> [f32; 3] {
    let (sy, cy) = yaw.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    [cp * sy, -sp, -cp * cy]
}

/// Translation column of a transform.
#[inline]
pub fn position_of(m: &Matrix) -> [f32; 3] {
    [m[12], m[13], m[14]]
}

/// Forward direction of a device transform: the negated, normalized Z basis.
pub fn forward_of(m: &Matrix) -> [f32; 3] {
    let (x, y, z) = (m[8], m[9], m[10]);
    let len = (x * x + y * y + z * z).sqrt();
    if len < 1e-10 {
        return [0.0, 0.0, -1.0];
    }
    [-x / len, -y / len, -z / len]
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn assert_matrix_eq(a: &Matrix, b: &Matrix) {
        for i in 0..16 {
            assert!((a[i] - b[i]).abs() < EPS, "element {}: {} vs {}", i, a[i], b[i]);
        }
    }

    #[test]
    fn hmd34_conversion_transposes() {
        let hmd: HmdMatrix34 = [
            [1.0, 2.0, 3.0, 10.0],
            [4.0, 5.0, 6.0, 11.0],
            [7.0, 8.0, 9.0, 12.0],
        ];
        let m = from_hmd34(&hmd);
        // Row-major rows become columns; translation lands in column 3.
        assert_eq!(m[0], 1.0);
        assert_eq!(m[1], 4.0);
        assert_eq!(m[4], 2.0);
        assert_eq!(m[12], 10.0);
        assert_eq!(m[13], 11.0);
        assert_eq!(m[14], 12.0);
        assert_eq!(m[15], 1.0);
        assert_eq!(to_hmd34(&m), hmd);
    }

    #[test]
    fn multiply_identity_is_noop() {
        let t = translation(1.0, 2.0, 3.0);
        let id: Matrix = identity_matrix!();
        assert_matrix_eq(&multiply(&t, &id), &t);
        assert_matrix_eq(&multiply(&id, &t), &t);
    }

    #[test]
    fn inverse_of_rigid_transform() {
        let m = multiply(&translation(1.0, -2.0, 0.5), &rotation_y(0.7));
        let inv = inverse(&m).unwrap();
        let id: Matrix = identity_matrix!();
        assert_matrix_eq(&multiply(&m, &inv), &id);
    }

    #[test]
    fn inverse_of_singular_is_none() {
        let zero = [0.0f32; 16];
        assert!(inverse(&zero).is_none());
    }

    #[test]
    fn euler_round_trip() {
        let (yaw, pitch, roll) = (0.4f32, -0.3f32, 0.2f32);
        let m = rotation_yxz(yaw, pitch, roll);
        let (y, p, r) = euler_yxz(&m);
        assert!((y - yaw).abs() < EPS);
        assert!((p - pitch).abs() < EPS);
        assert!((r - roll).abs() < EPS);
    }

    #[test]
    fn euler_gimbal_pole_keeps_yaw() {
        let m = rotation_yxz(0.6, std::f32::consts::FRAC_PI_2, 0.0);
        let (y, p, r) = euler_yxz(&m);
        assert!((y - 0.6).abs() < 1e-3);
        assert!((p - std::f32::consts::FRAC_PI_2).abs() < 1e-3);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn dir_vector_axes() {
        let fwd = dir_vector(0.0, 0.0);
        assert!((fwd[0]).abs() < EPS && (fwd[1]).abs() < EPS && (fwd[2] + 1.0).abs() < EPS);

        let down = dir_vector(0.0, std::f32::consts::FRAC_PI_2);
        assert!((down[1] + 1.0).abs() < EPS);
    }

    #[test]
    fn view_rot_at_origin_is_identity() {
        let id: Matrix = identity_matrix!();
        assert_matrix_eq(&view_rot([0.0, 0.0, 0.0], 0.0, 0.0), &id);
    }

    #[test]
    fn forward_of_identity_faces_minus_z() {
        let id: Matrix = identity_matrix!();
        let f = forward_of(&id);
        assert!((f[2] + 1.0).abs() < EPS);
    }
}
