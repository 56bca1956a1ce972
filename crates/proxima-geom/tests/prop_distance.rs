use proptest::num::f32::NORMAL;
use proptest::prelude::*;
use proptest::strategy::Strategy;
use proxima_geom::{Vec3, distance_3d, distance_horizontal};

fn approx_abs_rel(a: f32, b: f32, atol: f32, rtol: f32) -> bool {
    let diff = (a - b).abs();
    let scale = a.abs().max(b.abs());
    diff <= atol + rtol * scale
}

fn bounded_f32() -> impl Strategy<Value = f32> {
    NORMAL.prop_filter("bounded", |v| v.is_finite() && v.abs() <= 1e4)
}

fn arb_vec3() -> impl Strategy<Value = Vec3> {
    (bounded_f32(), bounded_f32(), bounded_f32()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    // d(a,b) == d(b,a)
    #[test]
    fn distance_3d_commutative(a in arb_vec3(), b in arb_vec3()) {
        prop_assert_eq!(distance_3d(a, b), distance_3d(b, a));
    }

    #[test]
    fn distance_horizontal_commutative(a in arb_vec3(), b in arb_vec3()) {
        prop_assert_eq!(distance_horizontal(a, b), distance_horizontal(b, a));
    }

    // d(a,a) == 0
    #[test]
    fn distance_to_self_is_zero(a in arb_vec3()) {
        prop_assert_eq!(distance_3d(a, a), 0.0);
        prop_assert_eq!(distance_horizontal(a, a), 0.0);
    }

    // Moving either point along y never changes the horizontal distance
    #[test]
    fn horizontal_ignores_vertical(
        a in arb_vec3(),
        b in arb_vec3(),
        ya in bounded_f32(),
        yb in bounded_f32(),
    ) {
        let a2 = Vec3::new(a.x, ya, a.z);
        let b2 = Vec3::new(b.x, yb, b.z);
        prop_assert_eq!(distance_horizontal(a, b), distance_horizontal(a2, b2));
    }

    // Dropping an axis can only shrink the distance
    #[test]
    fn horizontal_never_exceeds_3d(a in arb_vec3(), b in arb_vec3()) {
        let h = distance_horizontal(a, b);
        let d = distance_3d(a, b);
        prop_assert!(h <= d || approx_abs_rel(h, d, 1e-6, 1e-5));
    }

    #[test]
    fn distance_triangle_inequality(a in arb_vec3(), b in arb_vec3(), c in arb_vec3()) {
        let lhs = distance_3d(a, c);
        let rhs = distance_3d(a, b) + distance_3d(b, c);
        prop_assert!(lhs <= rhs + 1e-6 + 1e-5 * rhs.max(1.0));
    }
}
