use water_gpu::{source, ShaderLibrary};
use water_sim::{kernels, register_kernels};

fn validate(name: &str, module: &str) {
    let parsed = naga::front::wgsl::parse_str(module)
        .unwrap_or_else(|e| panic!("{name}: {}", e.emit_to_string(module)));
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&parsed)
        .unwrap_or_else(|e| panic!("{name}: {}", e.emit_to_string(module)));
}

#[test]
fn simulation_kernels_are_valid_wgsl() {
    let mut library = ShaderLibrary::new();
    register_kernels(&mut library);

    let names: Vec<String> = library.program_names().map(str::to_owned).collect();
    assert_eq!(names.len(), 4);
    for name in names {
        let (vertex, fragment) = library.program_sources(&name).unwrap();
        let program = source::assemble(&name, &vertex, &fragment).unwrap();
        validate(&name, &program.module);
    }
}

#[test]
fn simulation_kernels_need_no_camera_matrices() {
    let mut library = ShaderLibrary::new();
    register_kernels(&mut library);
    for name in [kernels::DROP, kernels::UPDATE, kernels::NORMAL, kernels::SPHERE] {
        let (vertex, fragment) = library.program_sources(name).unwrap();
        let program = source::assemble(name, &vertex, &fragment).unwrap();
        assert!(program.camera_matrices.is_empty(), "{name}");
        assert!(program.layout.is_sampler("water"), "{name}");
    }
}
