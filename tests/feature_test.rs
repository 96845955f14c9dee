use approx::assert_relative_eq;
use nalgebra as na;
use visual_servo::error::FeatureError;
use visual_servo::feature::{
    BasicFeature, FEATURE_ALL, PointFeature, Selection, servo_velocity, stack_error,
    stack_interaction,
};

fn x_row(x: f64, y: f64, z: f64) -> [f64; 6] {
    [-1.0 / z, 0.0, x / z, x * y, -(1.0 + x * x), y]
}

fn y_row(x: f64, y: f64, z: f64) -> [f64; 6] {
    [0.0, -1.0 / z, y / z, 1.0 + y * y, -x * y, -x]
}

#[test]
fn test_interaction_closed_form() {
    for &(x, y, z) in &[(0.1, -0.2, 1.5), (0.0, 0.0, 1.0), (-0.7, 0.3, -2.0), (2.0, 1.0, 0.25)] {
        let p = PointFeature::build_from(x, y, z);
        let l = p.interaction(FEATURE_ALL).unwrap();
        assert_eq!(l.shape(), (2, 6));
        for c in 0..6 {
            assert_relative_eq!(l[(0, c)], x_row(x, y, z)[c], epsilon = 1e-12);
            assert_relative_eq!(l[(1, c)], y_row(x, y, z)[c], epsilon = 1e-12);
        }
    }
}

#[test]
fn test_interaction_single_rows() {
    let p = PointFeature::build_from(0.3, 0.4, 2.0);
    let lx = p.interaction(PointFeature::select_x()).unwrap();
    assert_eq!(lx.shape(), (1, 6));
    assert_eq!(lx.row(0).iter().copied().collect::<Vec<_>>(), x_row(0.3, 0.4, 2.0));

    let ly = p.interaction(PointFeature::select_y()).unwrap();
    assert_eq!(ly.shape(), (1, 6));
    assert_eq!(ly.row(0).iter().copied().collect::<Vec<_>>(), y_row(0.3, 0.4, 2.0));

    // rows always come in [x, y] order
    let both = p
        .interaction(PointFeature::select_y() | PointFeature::select_x())
        .unwrap();
    assert_eq!(both, p.interaction(FEATURE_ALL).unwrap());
}

#[test]
fn test_error() {
    let p1 = PointFeature::build_from(0.5, -0.25, 1.0);
    let p2 = PointFeature::build_from(0.125, 0.5, 3.0);

    let e = p1.error(&p2, FEATURE_ALL).unwrap();
    assert_eq!(e, na::dvector![0.375, -0.75]);

    let ey = p1.error(&p2, PointFeature::select_y()).unwrap();
    assert_eq!(ey, na::dvector![-0.75]);

    let ex = p1.error(&p2, PointFeature::select_x()).unwrap();
    assert_eq!(ex, na::dvector![0.375]);

    assert_eq!(p1.error_to_zero(FEATURE_ALL).unwrap(), na::dvector![0.5, -0.25]);
}

#[test]
fn test_set_get_round_trip() {
    let mut p = PointFeature::new();
    assert_eq!((p.x(), p.y(), p.z()), (0.0, 0.0, 1.0));
    p.set_xyz(0.123456789, -9.87654321, 4.5);
    assert_eq!((p.x(), p.y(), p.z()), (0.123456789, -9.87654321, 4.5));

    p.set_x(1.0);
    p.set_y(2.0);
    p.set_z(3.0);
    assert_eq!((p.x(), p.y(), p.z()), (1.0, 2.0, 3.0));

    let copy = p;
    assert_eq!(copy, p);
    assert_eq!(format!("{}", p), "PointFeature: x=1, y=2, Z=3");
}

#[test]
fn test_zero_depth() {
    let mut p = PointFeature::build_from(0.1, 0.2, 0.0);
    assert_eq!(p.z(), 0.0);
    assert_eq!(p.interaction(FEATURE_ALL), Err(FeatureError::ZeroDepth));
    assert_eq!(
        p.interaction(PointFeature::select_x()),
        Err(FeatureError::ZeroDepth)
    );
    // the error vector does not depend on depth
    let desired = PointFeature::build_from(0.0, 0.0, 1.0);
    assert!(p.error(&desired, FEATURE_ALL).is_ok());

    p.set_z(1.0);
    assert!(p.interaction(FEATURE_ALL).is_ok());
}

#[test]
fn test_empty_selection() {
    let p = PointFeature::build_from(0.1, 0.2, 1.0);
    let none = Selection::line(5);
    assert_eq!(
        p.interaction(none),
        Err(FeatureError::EmptySelection(none.bits()))
    );
    assert!(matches!(
        p.error(&p, none),
        Err(FeatureError::EmptySelection(_))
    ));
}

#[test]
fn test_selection_bits() {
    assert_eq!(PointFeature::select_x().bits(), 1);
    assert_eq!(PointFeature::select_y().bits(), 2);
    assert_eq!(FEATURE_ALL.count(2), 2);
    assert_eq!(Selection::default(), FEATURE_ALL);
    assert_eq!(
        (PointFeature::select_x() | PointFeature::select_y()).indices(2).collect::<Vec<_>>(),
        vec![0, 1]
    );
}

#[test]
fn test_stacking() {
    let p1 = PointFeature::build_from(0.1, 0.2, 1.0);
    let p2 = PointFeature::build_from(-0.3, 0.4, 2.0);
    let d1 = PointFeature::build_from(0.0, 0.0, 1.0);
    let d2 = PointFeature::build_from(0.0, 0.1, 2.0);

    let features: [(&dyn BasicFeature, Selection); 2] =
        [(&p1, FEATURE_ALL), (&p2, PointFeature::select_y())];
    let l = stack_interaction(&features).unwrap();
    assert_eq!(l.shape(), (3, 6));
    assert_eq!(l.rows(0, 2), p1.interaction(FEATURE_ALL).unwrap());
    assert_eq!(
        l.rows(2, 1),
        p2.interaction(PointFeature::select_y()).unwrap()
    );

    let pairs: [(&dyn BasicFeature, &dyn BasicFeature, Selection); 2] = [
        (&p1, &d1, FEATURE_ALL),
        (&p2, &d2, PointFeature::select_y()),
    ];
    let e = stack_error(&pairs).unwrap();
    assert_eq!(e.len(), 3);
    assert_relative_eq!(e[0], 0.1);
    assert_relative_eq!(e[1], 0.2);
    assert_relative_eq!(e[2], 0.3, epsilon = 1e-12);
    assert_eq!(p1.dimension(), 2);
}

#[test]
fn test_servo_velocity_reduces_error() {
    let current = PointFeature::build_from(0.2, -0.1, 1.0);
    let desired = PointFeature::build_from(0.0, 0.0, 1.0);
    let l = current.interaction(FEATURE_ALL).unwrap();
    let e = current.error(&desired, FEATURE_ALL).unwrap();
    let v = servo_velocity(&l, &e, 0.5).unwrap();
    assert_eq!(v.len(), 6);

    // the feature moves along -gain * e under the computed velocity
    let s_dot = &l * &v;
    assert_relative_eq!(s_dot[0], -0.5 * e[0], epsilon = 1e-9);
    assert_relative_eq!(s_dot[1], -0.5 * e[1], epsilon = 1e-9);
}

#[test]
fn test_serde() {
    let p = PointFeature::build_from(0.25, 0.5, 2.0);
    let j = serde_json::to_string(&p).unwrap();
    let back: PointFeature = serde_json::from_str(&j).unwrap();
    assert_eq!(p, back);
}
