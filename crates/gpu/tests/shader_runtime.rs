use water_geometry::{Mesh, MeshOptions};
use water_gpu::{
    source, CameraMatrix, Command, CommandLog, Context, GpuError, GpuMesh, Primitive, RecordingDevice, Shader,
    UniformUpload, UniformValue,
};
use water_math::{Matrix4, TransformContext};

const VERTEX: &str = "
uniform tint: vec4<f32>;
struct Varyings {
    @builtin(position) position: vec4<f32>,
    @location(0) coord: vec2<f32>,
};
@vertex
fn vs_main(input: VertexInput) -> Varyings {
    var out: Varyings;
    out.coord = input.vertex_texcoord;
    out.position = ftransform(input);
    return out;
}
";

const FRAGMENT: &str = "
uniform tint: vec4<f32>;
uniform image: sampler2D;
@fragment
fn fs_main(varyings: Varyings) -> @location(0) vec4<f32> {
    return tint * textureSampleLevel(image, image_sampler, varyings.coord, 0.0);
}
";

fn setup() -> (Context, CommandLog) {
    let device = RecordingDevice::new();
    let log = device.log();
    (Context::new(Box::new(device)), log)
}

fn uniform_uploads(log: &CommandLog) -> Vec<(String, UniformUpload)> {
    log.commands()
        .into_iter()
        .filter_map(|c| match c {
            Command::SetUniform { name, value, .. } => Some((name, value)),
            _ => None,
        })
        .collect()
}

#[test]
fn only_referenced_camera_matrices_are_uploaded() {
    let (mut context, log) = setup();
    let mut shader = Shader::new(&mut context, "textured", VERTEX, FRAGMENT).unwrap();
    assert_eq!(shader.camera_matrices(), &[CameraMatrix::ModelViewProjection]);

    let mesh = GpuMesh::compile(&mut context, &Mesh::plane(1, 1, MeshOptions::default().with_coords())).unwrap();
    let mut transforms = TransformContext::new();
    transforms.model_view.translate(1.0, 2.0, 3.0);
    shader.draw(&mut context, &transforms, &mesh, Primitive::Triangles).unwrap();

    let uploads = uniform_uploads(&log);
    assert_eq!(uploads.len(), 1);
    let (name, value) = &uploads[0];
    assert_eq!(name, "model_view_projection_matrix");
    assert_eq!(value, &UniformUpload::Mat4(Matrix4::translate(1.0, 2.0, 3.0).to_cols_array()));
}

#[test]
fn matrices_are_recomputed_for_every_draw() {
    let (mut context, log) = setup();
    let mut shader = Shader::new(&mut context, "textured", VERTEX, FRAGMENT).unwrap();
    let mesh = GpuMesh::compile(&mut context, &Mesh::plane(1, 1, MeshOptions::default())).unwrap();
    let mut transforms = TransformContext::new();

    shader.draw(&mut context, &transforms, &mesh, Primitive::Triangles).unwrap();
    {
        let mut model_view = transforms.model_view.scoped();
        model_view.scale(2.0, 2.0, 2.0);
    }
    transforms.model_view.translate(0.0, 1.0, 0.0);
    shader.draw(&mut context, &transforms, &mesh, Primitive::Triangles).unwrap();

    let uploads = uniform_uploads(&log);
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].1, UniformUpload::Mat4(Matrix4::IDENTITY.to_cols_array()));
    assert_eq!(uploads[1].1, UniformUpload::Mat4(Matrix4::translate(0.0, 1.0, 0.0).to_cols_array()));
}

#[test]
fn sampler_scalars_upload_as_integers_and_unknown_names_are_skipped() {
    let (mut context, log) = setup();
    let mut shader = Shader::new(&mut context, "textured", VERTEX, FRAGMENT).unwrap();
    assert!(shader.is_sampler("image"));

    shader
        .uniforms(
            &mut context,
            &[
                ("image", UniformValue::Scalar(3.0)),
                ("not_declared", UniformValue::Scalar(1.0)),
                ("tint", UniformValue::Vec4([1.0, 0.5, 0.25, 1.0])),
            ],
        )
        .unwrap();

    assert_eq!(
        uniform_uploads(&log),
        vec![
            ("image".to_owned(), UniformUpload::Int(3)),
            ("tint".to_owned(), UniformUpload::Vec4([1.0, 0.5, 0.25, 1.0])),
        ]
    );
}

#[test]
fn mismatched_uniform_type_is_an_error() {
    let (mut context, _log) = setup();
    let mut shader = Shader::new(&mut context, "textured", VERTEX, FRAGMENT).unwrap();
    let err = shader
        .uniforms(&mut context, &[("tint", UniformValue::Scalar(1.0))])
        .unwrap_err();
    assert!(matches!(err, GpuError::UniformTypeMismatch { ref name, .. } if name == "tint"));
}

#[test]
fn attributes_missing_from_the_next_mesh_are_disabled() {
    let (mut context, log) = setup();
    let mut shader = Shader::new(&mut context, "textured", VERTEX, FRAGMENT).unwrap();
    let with_coords = GpuMesh::compile(&mut context, &Mesh::plane(1, 1, MeshOptions::default().with_coords())).unwrap();
    let without = GpuMesh::compile(&mut context, &Mesh::plane(1, 1, MeshOptions::default())).unwrap();
    let transforms = TransformContext::new();

    shader.draw(&mut context, &transforms, &with_coords, Primitive::Triangles).unwrap();
    assert_eq!(log.count(|c| matches!(c, Command::DisableAttribute(_))), 0);
    log.clear();

    shader.draw(&mut context, &transforms, &without, Primitive::Triangles).unwrap();
    let commands = log.commands();
    assert!(commands.contains(&Command::DisableAttribute(1)));
    assert!(!commands.iter().any(|c| matches!(c, Command::EnableAttribute { location: 1, .. })));
}

#[test]
fn draws_use_index_lists_when_present() {
    let (mut context, log) = setup();
    let mut shader = Shader::new(&mut context, "textured", VERTEX, FRAGMENT).unwrap();
    let transforms = TransformContext::new();

    let indexed = GpuMesh::compile(&mut context, &Mesh::plane(1, 1, MeshOptions::default())).unwrap();
    shader.draw(&mut context, &transforms, &indexed, Primitive::Triangles).unwrap();
    // No line list was built, so lines fall back to drawing the vertices.
    shader.draw(&mut context, &transforms, &indexed, Primitive::Lines).unwrap();

    let draws: Vec<_> = log
        .draws()
        .into_iter()
        .map(|c| match c {
            Command::Draw {
                primitive,
                count,
                indexed,
                ..
            } => (primitive, count, indexed),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(draws, vec![(Primitive::Triangles, 6, true), (Primitive::Lines, 4, false)]);
}

#[test]
fn compile_errors_carry_the_device_log() {
    let device = RecordingDevice::new().rejecting("fs_main", "error: unknown identifier `oops`");
    let mut context = Context::new(Box::new(device));
    let err = Shader::new(&mut context, "broken", VERTEX, FRAGMENT).unwrap_err();
    assert!(
        matches!(err, GpuError::Compile { ref label, ref log } if label == "broken" && log.contains("oops")),
        "{err}"
    );
}

#[test]
fn draw_without_program_fails() {
    let (mut context, _log) = setup();
    let err = context
        .device_mut()
        .draw_arrays(Primitive::Triangles, 3)
        .unwrap_err();
    assert!(matches!(err, GpuError::NoProgram));
}

#[test]
fn assembled_module_is_valid_wgsl() {
    let program = source::assemble("textured", VERTEX, FRAGMENT).unwrap();
    let module = naga::front::wgsl::parse_str(&program.module)
        .unwrap_or_else(|e| panic!("{}", e.emit_to_string(&program.module)));
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .unwrap_or_else(|e| panic!("{}", e.emit_to_string(&program.module)));
}
