//! Turns a kernel's vertex and fragment text into one WGSL module plus the
//! binding layout the backends need.
//!
//! Kernel authors write ordinary WGSL with `vs_main`/`fs_main` entry points,
//! and may additionally use:
//!
//! * `uniform name: type;` lines, where `type` is a WGSL scalar, vector or
//!   matrix type, or `sampler2D`/`samplerCube`. A sampler named `tiles`
//!   becomes `tiles: texture_2d<f32>` plus `tiles_sampler: sampler`.
//! * the camera matrices in [`CameraMatrix`], declared only when referenced.
//! * `VertexInput`, whose fields `vertex_position`, `vertex_texcoord`,
//!   `vertex_normal` and `vertex_color` are the mesh attributes.
//! * `to_clip(p)`, which must wrap every clip-space position written by a
//!   vertex stage, and `ftransform(input)`, the projected vertex position.

use std::fmt::Write as _;

use crate::{Attribute, GpuError, UniformLocation, UniformUpload};

/// Group-0 binding of the backend-owned clip-space adapter uniform.
pub const CLIP_BINDING: u32 = 0;

/// Camera matrices a kernel can reference by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CameraMatrix {
    ModelView,
    Projection,
    ModelViewProjection,
    ModelViewInverse,
    ProjectionInverse,
    ModelViewProjectionInverse,
    Normal,
}

impl CameraMatrix {
    pub const ALL: [Self; 7] = [
        Self::ModelView,
        Self::Projection,
        Self::ModelViewProjection,
        Self::ModelViewInverse,
        Self::ProjectionInverse,
        Self::ModelViewProjectionInverse,
        Self::Normal,
    ];

    #[must_use]
    pub const fn uniform_name(self) -> &'static str {
        match self {
            Self::ModelView => "model_view_matrix",
            Self::Projection => "projection_matrix",
            Self::ModelViewProjection => "model_view_projection_matrix",
            Self::ModelViewInverse => "model_view_matrix_inverse",
            Self::ProjectionInverse => "projection_matrix_inverse",
            Self::ModelViewProjectionInverse => "model_view_projection_matrix_inverse",
            Self::Normal => "normal_matrix",
        }
    }

    #[must_use]
    pub const fn uniform_type(self) -> UniformType {
        match self {
            Self::Normal => UniformType::Mat3,
            _ => UniformType::Mat4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl UniformType {
    fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "f32" => Self::Float,
            "i32" => Self::Int,
            "vec2<f32>" | "vec2f" => Self::Vec2,
            "vec3<f32>" | "vec3f" => Self::Vec3,
            "vec4<f32>" | "vec4f" => Self::Vec4,
            "mat3x3<f32>" | "mat3x3f" => Self::Mat3,
            "mat4x4<f32>" | "mat4x4f" => Self::Mat4,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn wgsl(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Int => "i32",
            Self::Vec2 => "vec2<f32>",
            Self::Vec3 => "vec3<f32>",
            Self::Vec4 => "vec4<f32>",
            Self::Mat3 => "mat3x3<f32>",
            Self::Mat4 => "mat4x4<f32>",
        }
    }

    /// Size of the value in the uniform address space, padding included.
    #[must_use]
    pub const fn uniform_size(self) -> u64 {
        match self {
            Self::Float | Self::Int => 4,
            Self::Vec2 => 8,
            Self::Vec3 | Self::Vec4 => 16,
            Self::Mat3 => 48,
            Self::Mat4 => 64,
        }
    }

    #[must_use]
    pub fn accepts(self, value: &UniformUpload) -> bool {
        matches!(
            (self, value),
            (Self::Float, UniformUpload::Float(_))
                | (Self::Int, UniformUpload::Int(_))
                | (Self::Vec2, UniformUpload::Vec2(_))
                | (Self::Vec3, UniformUpload::Vec3(_))
                | (Self::Vec4, UniformUpload::Vec4(_))
                | (Self::Mat3, UniformUpload::Mat3(_))
                | (Self::Mat4, UniformUpload::Mat4(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerDimension {
    D2,
    Cube,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub binding: u32,
    pub ty: UniformType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerSlot {
    pub name: String,
    pub texture_binding: u32,
    pub sampler_binding: u32,
    pub dimension: SamplerDimension,
}

/// One uniform location resolved against a [`ProgramLayout`].
#[derive(Debug, Clone, Copy)]
pub enum Slot<'a> {
    Uniform(&'a UniformSlot),
    Sampler(usize, &'a SamplerSlot),
}

/// Every group-0 binding in an assembled module, plus the vertex inputs.
///
/// Uniform locations number the uniform slots first, then the samplers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramLayout {
    pub uniforms: Vec<UniformSlot>,
    pub samplers: Vec<SamplerSlot>,
    pub attributes: Vec<Attribute>,
}

impl ProgramLayout {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn location_of(&self, name: &str) -> Option<UniformLocation> {
        if let Some(i) = self.uniforms.iter().position(|u| u.name == name) {
            return Some(UniformLocation(i as u32));
        }
        self.samplers
            .iter()
            .position(|s| s.name == name)
            .map(|i| UniformLocation((self.uniforms.len() + i) as u32))
    }

    #[must_use]
    pub fn slot(&self, location: UniformLocation) -> Option<Slot<'_>> {
        let index = location.0 as usize;
        if let Some(uniform) = self.uniforms.get(index) {
            return Some(Slot::Uniform(uniform));
        }
        let sampler = index - self.uniforms.len();
        self.samplers.get(sampler).map(|s| Slot::Sampler(sampler, s))
    }

    #[must_use]
    pub fn is_sampler(&self, name: &str) -> bool {
        self.samplers.iter().any(|s| s.name == name)
    }
}

/// An assembled kernel: WGSL text and the layout derived while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    pub module: String,
    pub layout: ProgramLayout,
    pub camera_matrices: Vec<CameraMatrix>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Declared {
    Uniform(UniformType),
    Sampler(SamplerDimension),
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whether `word` occurs in `source` as a whole identifier.
#[must_use]
pub fn contains_word(source: &str, word: &str) -> bool {
    source.match_indices(word).any(|(start, _)| {
        let before = source[..start].chars().next_back();
        let after = source[start + word.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

fn compile_error(label: &str, log: impl Into<String>) -> GpuError {
    GpuError::Compile {
        label: label.to_owned(),
        log: log.into(),
    }
}

/// Removes `uniform` lines from `source`, collecting them into `declared`.
/// Removed lines are left blank so line numbers in diagnostics still match.
fn strip_declarations(
    label: &str,
    stage: &str,
    source: &str,
    declared: &mut Vec<(String, Declared)>,
) -> Result<String, GpuError> {
    let mut body = String::with_capacity(source.len());
    for (number, line) in source.lines().enumerate() {
        let Some(rest) = line.trim().strip_prefix("uniform ") else {
            body.push_str(line);
            body.push('\n');
            continue;
        };
        body.push('\n');

        let at = || format!("{stage}:{}: ", number + 1);
        let (name, ty) = rest
            .trim()
            .strip_suffix(';')
            .and_then(|decl| decl.split_once(':'))
            .map(|(name, ty)| (name.trim(), ty.trim()))
            .ok_or_else(|| compile_error(label, format!("{}expected `uniform name: type;`", at())))?;

        if name.is_empty() || !name.chars().all(is_ident_char) {
            return Err(compile_error(label, format!("{}invalid uniform name `{name}`", at())));
        }
        if CameraMatrix::ALL.iter().any(|m| m.uniform_name() == name) || name == "device_clip" {
            return Err(compile_error(
                label,
                format!("{}`{name}` is supplied automatically and cannot be declared", at()),
            ));
        }
        let kind = match ty {
            "sampler2D" => Declared::Sampler(SamplerDimension::D2),
            "samplerCube" => Declared::Sampler(SamplerDimension::Cube),
            other => Declared::Uniform(
                UniformType::parse(other)
                    .ok_or_else(|| compile_error(label, format!("{}unsupported uniform type `{other}`", at())))?,
            ),
        };

        match declared.iter().find(|(existing, _)| existing == name) {
            Some((_, previous)) if *previous != kind => {
                return Err(compile_error(
                    label,
                    format!("{}uniform `{name}` redeclared with a different type", at()),
                ));
            }
            Some(_) => {}
            None => declared.push((name.to_owned(), kind)),
        }
    }
    Ok(body)
}

/// Builds the module for one kernel pair.
///
/// # Errors
///
/// [`GpuError::Compile`] for malformed `uniform` declarations. WGSL errors are
/// only found later, when a device compiles the module.
pub fn assemble(label: &str, vertex: &str, fragment: &str) -> Result<ProgramSource, GpuError> {
    let mut declared = Vec::new();
    let vertex_body = strip_declarations(label, "vertex", vertex, &mut declared)?;
    let fragment_body = strip_declarations(label, "fragment", fragment, &mut declared)?;

    let uses = |word: &str| contains_word(&vertex_body, word) || contains_word(&fragment_body, word);
    let uses_ftransform = uses("ftransform");
    let camera_matrices: Vec<CameraMatrix> = CameraMatrix::ALL
        .into_iter()
        .filter(|m| uses(m.uniform_name()) || (uses_ftransform && *m == CameraMatrix::ModelViewProjection))
        .collect();

    let attributes: Vec<Attribute> = Attribute::ALL
        .into_iter()
        .filter(|a| *a == Attribute::Position || contains_word(&vertex_body, a.shader_name()))
        .collect();

    let mut layout = ProgramLayout {
        attributes,
        ..ProgramLayout::default()
    };
    let mut next_binding = CLIP_BINDING + 1;
    for matrix in &camera_matrices {
        layout.uniforms.push(UniformSlot {
            name: matrix.uniform_name().to_owned(),
            binding: next_binding,
            ty: matrix.uniform_type(),
        });
        next_binding += 1;
    }
    for (name, kind) in declared {
        match kind {
            Declared::Uniform(ty) => {
                layout.uniforms.push(UniformSlot {
                    name,
                    binding: next_binding,
                    ty,
                });
                next_binding += 1;
            }
            Declared::Sampler(dimension) => {
                layout.samplers.push(SamplerSlot {
                    name,
                    texture_binding: next_binding,
                    sampler_binding: next_binding + 1,
                    dimension,
                });
                next_binding += 2;
            }
        }
    }

    let mut module = String::new();
    write_header(&mut module, &layout, uses_ftransform);
    module.push_str("\n// vertex stage\n");
    module.push_str(&vertex_body);
    module.push_str("\n// fragment stage\n");
    module.push_str(&fragment_body);

    Ok(ProgramSource {
        module,
        layout,
        camera_matrices,
    })
}

fn attribute_type(attribute: Attribute) -> &'static str {
    match attribute {
        Attribute::TexCoord => "vec2<f32>",
        Attribute::Position | Attribute::Normal => "vec3<f32>",
        Attribute::Color => "vec4<f32>",
    }
}

fn write_header(out: &mut String, layout: &ProgramLayout, with_ftransform: bool) {
    out.push_str("struct VertexInput {\n");
    for attribute in &layout.attributes {
        let _ = writeln!(
            out,
            "    @location({}) {}: {},",
            attribute.location(),
            attribute.shader_name(),
            attribute_type(*attribute)
        );
    }
    out.push_str("};\n\n");

    let _ = writeln!(out, "@group(0) @binding({CLIP_BINDING}) var<uniform> device_clip: vec4<f32>;");
    for uniform in &layout.uniforms {
        let _ = writeln!(
            out,
            "@group(0) @binding({}) var<uniform> {}: {};",
            uniform.binding,
            uniform.name,
            uniform.ty.wgsl()
        );
    }
    for sampler in &layout.samplers {
        let texture = match sampler.dimension {
            SamplerDimension::D2 => "texture_2d<f32>",
            SamplerDimension::Cube => "texture_cube<f32>",
        };
        let _ = writeln!(
            out,
            "@group(0) @binding({}) var {}: {texture};",
            sampler.texture_binding, sampler.name
        );
        let _ = writeln!(
            out,
            "@group(0) @binding({}) var {}_sampler: sampler;",
            sampler.sampler_binding, sampler.name
        );
    }

    out.push_str(
        "\nfn to_clip(position: vec4<f32>) -> vec4<f32> {\n    \
         return vec4<f32>(position.x, position.y * device_clip.x, \
         position.z * device_clip.y + position.w * device_clip.z, position.w);\n}\n",
    );
    if with_ftransform {
        out.push_str(
            "\nfn ftransform(input: VertexInput) -> vec4<f32> {\n    \
             return to_clip(model_view_projection_matrix * vec4<f32>(input.vertex_position, 1.0));\n}\n",
        );
    }
}
