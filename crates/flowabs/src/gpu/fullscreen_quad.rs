/// Fullscreen triangle vertex shader (WGSL).
/// Three vertices from `vertex_index` cover the target without a vertex
/// buffer; fragment stages derive their UV from `@builtin(position)`.
pub const FULLSCREEN_TRIANGLE_VS: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4f {
    let x = f32(i32(vi & 1u) * 4) - 1.0;
    let y = f32(i32(vi & 2u) * 2) - 1.0;
    return vec4f(x, y, 0.0, 1.0);
}
"#;
