use std::borrow::Cow;

use wgpu::naga;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::RenderError;
use crate::launch::LocalSize;

/// Kernel program shipped with the renderer, used when no file is given.
pub const DEFAULT_KERNEL: &str = include_str!("../kernels/scatter.wgsl");

/// Wraps a kernel file with the argument prelude and tile-size constants.
///
/// The prelude declares:
///
/// 1. `KernelArgs`, matching [`crate::kernel::KernelArgs`] field for field.
/// 2. `scatter_pixels` at binding 0 and `scatter_args` at binding 1.
/// 3. `SCATTER_LOCAL_X`/`SCATTER_LOCAL_Y` for `@workgroup_size`, plus the
///    bounds/index helpers kernels use to discard padding invocations.
pub fn wrap_kernel_source(source: &str, local: LocalSize) -> String {
    format!(
        "{HEADER}const SCATTER_LOCAL_X: u32 = {x}u;\nconst SCATTER_LOCAL_Y: u32 = {y}u;\n\n{source}",
        x = local.x,
        y = local.y,
    )
}

fn prelude_lines() -> usize {
    HEADER.lines().count() + 3
}

/// Parses and validates a wrapped program, returning its compute entry points
/// in declaration order.
pub(crate) fn compute_entry_points(wrapped: &str) -> Result<Vec<String>, RenderError> {
    let module = naga::front::wgsl::parse_str(wrapped)
        .map_err(|err| build_failure(err.emit_to_string(wrapped)))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| build_failure(err.emit_to_string(wrapped)))?;

    let names: Vec<String> = module
        .entry_points
        .iter()
        .filter(|entry| entry.stage == naga::ShaderStage::Compute)
        .map(|entry| entry.name.clone())
        .collect();
    if names.is_empty() {
        return Err(build_failure(
            "kernel program declares no @compute entry points".to_string(),
        ));
    }
    Ok(names)
}

pub(crate) fn build_failure(log: String) -> RenderError {
    RenderError::Build {
        log: format!(
            "{log}\nnote: kernel source starts at line {} of the wrapped program",
            prelude_lines() + 1
        ),
    }
}

pub(crate) fn create_kernel_module(device: &wgpu::Device, wrapped: String) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scatter kernels"),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(wrapped)),
    })
}

/// Compiles the fullscreen-triangle shader that blits the pixel buffer.
pub(crate) fn create_present_module(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("present"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(PRESENT_SHADER)),
    })
}

/// WGSL prologue injected ahead of every kernel program.
///
/// The struct layout must match `KernelArgs` in `kernel.rs`: two ints, eight
/// bytes of padding, three padded vectors, then the frame counters and fov.
const HEADER: &str = r"struct KernelArgs {
    width: i32,
    height: i32,
    _pad0: vec2<i32>,
    position: vec4<f32>,
    look: vec4<f32>,
    up: vec4<f32>,
    accumulation_frame: i32,
    true_frame: i32,
    fov: f32,
    _pad1: f32,
}

@group(0) @binding(0) var<storage, read_write> scatter_pixels: array<vec4<f32>>;
@group(0) @binding(1) var<uniform> scatter_args: KernelArgs;

fn scatter_in_bounds(id: vec3<u32>) -> bool {
    return i32(id.x) < scatter_args.width && i32(id.y) < scatter_args.height;
}

fn scatter_index(id: vec3<u32>) -> u32 {
    return id.y * u32(scatter_args.width) + id.x;
}

";

/// Fullscreen triangle that samples the pixel buffer at the fragment's
/// integer coordinate.
const PRESENT_SHADER: &str = r"struct PresentParams {
    width: u32,
    height: u32,
    _pad0: u32,
    _pad1: u32,
}

@group(0) @binding(0) var<storage, read> pixels: array<vec4<f32>>;
@group(0) @binding(1) var<uniform> params: PresentParams;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -3.0),
        vec2<f32>(3.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    return vec4<f32>(positions[vertex_index], 0.0, 1.0);
}

@fragment
fn fs_main(@builtin(position) coord: vec4<f32>) -> @location(0) vec4<f32> {
    let x = min(u32(coord.x), params.width - 1u);
    let y = min(u32(coord.y), params.height - 1u);
    let color = pixels[y * params.width + x];
    return vec4<f32>(clamp(color.rgb, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_injects_contract_and_tile_size() {
        let wrapped = wrap_kernel_source("// body", LocalSize::square(16));
        assert!(wrapped.contains("struct KernelArgs"));
        assert!(wrapped.contains("@group(0) @binding(0)"));
        assert!(wrapped.contains("@group(0) @binding(1)"));
        assert!(wrapped.contains("const SCATTER_LOCAL_X: u32 = 16u;"));
        assert!(wrapped.contains("const SCATTER_LOCAL_Y: u32 = 16u;"));
        assert!(wrapped.ends_with("// body"));
        assert_eq!(
            wrapped.lines().position(|line| line == "// body"),
            Some(prelude_lines())
        );
    }

    #[test]
    fn bundled_kernel_validates() {
        let wrapped = wrap_kernel_source(DEFAULT_KERNEL, LocalSize::square(8));
        let names = compute_entry_points(&wrapped).expect("bundled kernel builds");
        assert_eq!(names, ["trace"]);
    }

    #[test]
    fn entry_points_keep_declaration_order() {
        let source = r"
@compute @workgroup_size(SCATTER_LOCAL_X, SCATTER_LOCAL_Y, 1)
fn second_stage(@builtin(global_invocation_id) id: vec3<u32>) {
    if (scatter_in_bounds(id)) {
        scatter_pixels[scatter_index(id)] = vec4<f32>(1.0);
    }
}

@compute @workgroup_size(SCATTER_LOCAL_X, SCATTER_LOCAL_Y, 1)
fn after_second(@builtin(global_invocation_id) id: vec3<u32>) {
    if (scatter_in_bounds(id)) {
        scatter_pixels[scatter_index(id)] *= 0.5;
    }
}
";
        let wrapped = wrap_kernel_source(source, LocalSize::square(4));
        let names = compute_entry_points(&wrapped).unwrap();
        assert_eq!(names, ["second_stage", "after_second"]);
    }

    #[test]
    fn syntax_error_reports_build_log() {
        let wrapped = wrap_kernel_source("fn broken( {", LocalSize::square(4));
        match compute_entry_points(&wrapped) {
            Err(RenderError::Build { log }) => {
                assert!(log.contains("error"));
                assert!(log.contains("kernel source starts at line"));
            }
            other => panic!("expected build failure, got {other:?}"),
        }
    }

    #[test]
    fn program_without_kernels_is_a_build_failure() {
        let wrapped = wrap_kernel_source("fn helper() -> f32 { return 1.0; }", LocalSize::square(4));
        assert!(matches!(
            compute_entry_points(&wrapped),
            Err(RenderError::Build { .. })
        ));
    }
}
