use water_math::{Matrix4, Raytracer, TransformContext, Vector3, Viewport};

fn sample_matrices() -> Vec<Matrix4> {
    vec![
        Matrix4::identity(),
        Matrix4::translate(1.0, -2.0, 3.5),
        Matrix4::scale(2.0, 0.5, -3.0),
        Matrix4::rotate(37.0, 1.0, 2.0, 3.0),
        Matrix4::perspective(45.0, 1.6, 0.01, 100.0),
        Matrix4::frustum(-1.0, 2.0, -0.5, 1.5, 0.2, 30.0),
        Matrix4::translate(0.0, 0.5, 0.0)
            * Matrix4::rotate(-200.5, 0.0, 1.0, 0.0)
            * Matrix4::rotate(25.0, 1.0, 0.0, 0.0)
            * Matrix4::translate(0.0, 0.0, -4.0),
    ]
}

#[test]
fn identity_is_neutral_for_multiply() {
    for m in sample_matrices() {
        assert_eq!(m.multiply(&Matrix4::identity()), m);
        assert_eq!(Matrix4::identity().multiply(&m), m);
    }
}

#[test]
fn inverse_times_matrix_is_identity() {
    for m in sample_matrices() {
        let product = m.multiply(&m.inverse());
        assert!(
            product.approx_eq(&Matrix4::identity(), 1e-4),
            "M * M^-1 drifted from identity: {product:?}"
        );
    }
}

#[test]
fn multiply_and_inverse_agree_with_glam() {
    let matrices = sample_matrices();
    for a in &matrices {
        for b in &matrices {
            let ours = a.multiply(b);
            let theirs = Matrix4::from(glam::Mat4::from(*a) * glam::Mat4::from(*b));
            assert!(ours.approx_eq(&theirs, 1e-4), "{ours:?} != {theirs:?}");
        }
        let ours = a.inverse();
        let theirs = Matrix4::from(glam::Mat4::from(*a).inverse());
        assert!(ours.approx_eq(&theirs, 1e-3), "{ours:?} != {theirs:?}");
    }
}

#[test]
fn perspective_matches_glam_gl_convention() {
    let ours = Matrix4::perspective(45.0, 1.5, 0.1, 50.0);
    let theirs = Matrix4::from(glam::Mat4::perspective_rh_gl(45f32.to_radians(), 1.5, 0.1, 50.0));
    assert!(ours.approx_eq(&theirs, 1e-5), "{ours:?} != {theirs:?}");
}

#[test]
fn translate_maps_origin_to_offset() {
    for (tx, ty, tz) in [(0.0, 0.0, 0.0), (1.0, 2.0, 3.0), (-7.25, 0.5, 1e3)] {
        let p = Matrix4::translate(tx, ty, tz).transform_point(Vector3::ZERO);
        assert_eq!(p, Vector3::new(tx, ty, tz));
    }
}

fn orbit_camera() -> TransformContext {
    let mut transforms = TransformContext::new();
    transforms.projection.perspective(45.0, 800.0 / 600.0, 0.01, 100.0);
    transforms
        .model_view
        .translate(0.0, 0.0, -4.0)
        .rotate(25.0, 1.0, 0.0, 0.0)
        .rotate(200.5, 0.0, 1.0, 0.0)
        .translate(0.0, 0.5, 0.0);
    transforms
}

#[test]
fn centre_ray_is_parallel_to_forward_axis() {
    let viewport = Viewport::new(0, 0, 800, 600);

    let plain = TransformContext {
        projection: orbit_camera().projection,
        ..TransformContext::new()
    };
    let ray = Raytracer::new(&plain, viewport).ray_for_pixel(400.0, 300.0);
    assert!((ray - Vector3::new(0.0, 0.0, -1.0)).length() < 1e-4, "ray {ray:?}");

    let transforms = orbit_camera();
    let m = transforms.model_view.current().m;
    let forward = Vector3::new(-m[8], -m[9], -m[10]).unit();
    let ray = Raytracer::new(&transforms, viewport).ray_for_pixel(400.0, 300.0);
    assert!(ray.cross(forward).length() < 1e-3, "ray {ray:?} vs forward {forward:?}");
    assert!(ray.dot(forward) > 0.999);
}

#[test]
fn pixel_rays_point_at_what_the_pixel_shows() {
    let viewport = Viewport::new(0, 0, 640, 480);
    let transforms = orbit_camera();
    let tracer = Raytracer::new(&transforms, viewport);

    let target = Vector3::new(0.25, 0.0, -0.4);
    let window = transforms.project(target, viewport);
    // Window y grows upwards, pointer y grows downwards.
    let ray = tracer.ray_for_pixel(window.x, 480.0 - window.y);
    let hit = Raytracer::hit_plane(tracer.eye, ray, 0.0);
    assert!((hit - target).length() < 1e-3, "hit {hit:?}");
}
