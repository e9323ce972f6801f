use crate::body::BodyMetadata;

/// Color drawn for the selected body.
pub const SELECTED_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelViewProjectionUniform {
    pub matrix: [[f32; 4]; 4],
}

impl ModelViewProjectionUniform {
    pub fn new(matrix: [[f32; 4]; 4]) -> Self {
        Self { matrix }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BodyColorUniform {
    pub rgb: [f32; 4],
}

impl BodyColorUniform {
    pub fn new(rgb: [f32; 3]) -> Self {
        Self { rgb: [rgb[0], rgb[1], rgb[2], 1.0] }
    }
}

/// Per-body colors with the selection highlighted.
pub fn body_colors(metadata: &[BodyMetadata], selection: Option<usize>) -> Vec<BodyColorUniform> {
    metadata
        .iter()
        .enumerate()
        .map(|(i, body)| {
            if Some(i) == selection {
                BodyColorUniform::new(SELECTED_COLOR)
            } else {
                BodyColorUniform::new(body.color)
            }
        })
        .collect()
}

/// Packs `colors` at `stride`-byte slots for dynamic-offset binding.
pub fn pack_strided(colors: &[BodyColorUniform], stride: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; colors.len() * stride];
    for (i, color) in colors.iter().enumerate() {
        let offset = i * stride;
        bytes[offset..offset + std::mem::size_of::<BodyColorUniform>()]
            .copy_from_slice(bytemuck::bytes_of(color));
    }
    bytes
}
