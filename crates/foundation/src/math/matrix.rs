use super::Vec3;

/// Row-major 4x4 matrix operating on column vectors (`m * v`).
///
/// Rotations use the yaw-pitch-roll convention `Rz(yaw) * Rx(pitch) * Ry(roll)`,
/// with +Y as the forward axis and +Z as up.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat4 {
    pub m: [[f64; 4]; 4],
}

/// Translation, rotation and scale recovered from an affine matrix.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Decomposed {
    pub position: Vec3,
    /// Yaw, pitch, roll in radians.
    pub ypr: Vec3,
    pub scale: Vec3,
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat4 {
    pub fn identity() -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    pub fn translation(t: Vec3) -> Self {
        let mut out = Self::identity();
        out.m[0][3] = t.x;
        out.m[1][3] = t.y;
        out.m[2][3] = t.z;
        out
    }

    pub fn scale_non_uniform(s: Vec3) -> Self {
        let mut out = Self::identity();
        out.m[0][0] = s.x;
        out.m[1][1] = s.y;
        out.m[2][2] = s.z;
        out
    }

    pub fn rotation_ypr(ypr: Vec3) -> Self {
        let (sy, cy) = ypr.x.sin_cos();
        let (sp, cp) = ypr.y.sin_cos();
        let (sr, cr) = ypr.z.sin_cos();

        Self {
            m: [
                [cy * cr - sy * sp * sr, -sy * cp, cy * sr + sy * sp * cr, 0.0],
                [sy * cr + cy * sp * sr, cy * cp, sy * sr - cy * sp * cr, 0.0],
                [-cp * sr, sp, cp * cr, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// `translation(position) * rotation_ypr(ypr) * scale_non_uniform(scale)`.
    pub fn from_trs(position: Vec3, ypr: Vec3, scale: Vec3) -> Self {
        Self::translation(position) * Self::rotation_ypr(ypr) * Self::scale_non_uniform(scale)
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let m = &self.m;
        let x = m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z + m[0][3];
        let y = m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z + m[1][3];
        let z = m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z + m[2][3];
        let w = m[3][0] * p.x + m[3][1] * p.y + m[3][2] * p.z + m[3][3];
        if w != 0.0 && w != 1.0 {
            Vec3::new(x / w, y / w, z / w)
        } else {
            Vec3::new(x, y, z)
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.m[0][3], self.m[1][3], self.m[2][3])
    }

    fn column3(&self, c: usize) -> Vec3 {
        Vec3::new(self.m[0][c], self.m[1][c], self.m[2][c])
    }

    fn determinant3(&self) -> f64 {
        self.column3(0)
            .cross(self.column3(1))
            .dot(self.column3(2))
    }

    /// Splits an affine matrix into translation, yaw-pitch-roll and scale.
    ///
    /// A negative determinant is folded into the x scale. Zero-length axes
    /// produce a zero scale on that axis and an identity contribution to the
    /// rotation.
    pub fn decompose(&self) -> Decomposed {
        let mut scale = Vec3::new(
            self.column3(0).length(),
            self.column3(1).length(),
            self.column3(2).length(),
        );
        if self.determinant3() < 0.0 {
            scale.x = -scale.x;
        }

        let axis = |c: usize, s: f64, fallback: Vec3| -> Vec3 {
            if s == 0.0 {
                fallback
            } else {
                self.column3(c).scale(1.0 / s)
            }
        };
        let c0 = axis(0, scale.x, Vec3::new(1.0, 0.0, 0.0));
        let c1 = axis(1, scale.y, Vec3::new(0.0, 1.0, 0.0));
        let c2 = axis(2, scale.z, Vec3::new(0.0, 0.0, 1.0));

        // r[row][col] of the pure rotation.
        let r = [[c0.x, c1.x, c2.x], [c0.y, c1.y, c2.y], [c0.z, c1.z, c2.z]];

        let pitch = r[2][1].clamp(-1.0, 1.0).asin();
        let (yaw, roll) = if pitch.cos() > 1e-9 {
            ((-r[0][1]).atan2(r[1][1]), (-r[2][0]).atan2(r[2][2]))
        } else {
            // Gimbal lock: roll folds into yaw.
            (r[1][0].atan2(r[0][0]), 0.0)
        };

        Decomposed {
            position: self.position(),
            ypr: Vec3::new(yaw, pitch, roll),
            scale,
        }
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(other.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= eps)
    }
}

impl std::ops::Mul for Mat4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        let mut out = [[0.0; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.m[r][k] * rhs.m[k][c]).sum();
            }
        }
        Self { m: out }
    }
}
