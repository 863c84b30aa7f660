//! Shader variant management for the sprite program.
//!
//! A variant is the sorted, deduplicated set of feature flags. One WGSL
//! source serves every variant: the manager prepends a `const ENABLE_*`
//! boolean per flag and lets the shader compiler eliminate disabled
//! branches. Pipelines link on first use and are cached by flag set; all
//! variants share one uniform struct and bind-group layout, so uniform
//! writes cannot miss.

use std::collections::HashMap;
use std::fmt::Write as _;

use smallvec::SmallVec;
use tracing::debug;

use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::math::Mat3;
use crate::model::filters::Filters;
use crate::render::gpu::context::{GpuContext, TARGET_FORMAT};

/// One feature flag of the sprite program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum EffectFlag {
    Mosaic,
    Pixelate,
    Whirl,
    Fisheye,
    Ghost,
    Brightness,
    Color,
}

impl EffectFlag {
    /// Every flag; the rendering variant enables them all.
    pub(crate) const ALL: [EffectFlag; 7] = [
        EffectFlag::Mosaic,
        EffectFlag::Pixelate,
        EffectFlag::Whirl,
        EffectFlag::Fisheye,
        EffectFlag::Ghost,
        EffectFlag::Brightness,
        EffectFlag::Color,
    ];

    /// Effects that change shape but not color; the point-query variant.
    pub(crate) const SHAPE_ONLY: [EffectFlag; 4] = [
        EffectFlag::Mosaic,
        EffectFlag::Pixelate,
        EffectFlag::Whirl,
        EffectFlag::Fisheye,
    ];

    fn const_name(self) -> &'static str {
        match self {
            EffectFlag::Mosaic => "ENABLE_MOSAIC",
            EffectFlag::Pixelate => "ENABLE_PIXELATE",
            EffectFlag::Whirl => "ENABLE_WHIRL",
            EffectFlag::Fisheye => "ENABLE_FISHEYE",
            EffectFlag::Ghost => "ENABLE_GHOST",
            EffectFlag::Brightness => "ENABLE_BRIGHTNESS",
            EffectFlag::Color => "ENABLE_COLOR",
        }
    }
}

/// A variant's identity: its sorted, deduplicated flag set.
pub(crate) type VariantKey = SmallVec<[EffectFlag; 8]>;

pub(crate) fn variant_key(flags: &[EffectFlag]) -> VariantKey {
    let mut key: VariantKey = flags.iter().copied().collect();
    key.sort();
    key.dedup();
    key
}

/// The sprite WGSL for a flag set: feature constants, then the shared body.
pub(crate) fn sprite_shader_source(flags: &[EffectFlag]) -> String {
    let key = variant_key(flags);
    let mut src = String::new();
    for flag in EffectFlag::ALL {
        let _ = writeln!(
            src,
            "const {}: bool = {};",
            flag.const_name(),
            key.contains(&flag)
        );
    }
    src.push_str(include_str!("sprite.wgsl"));
    src
}

/// Per-draw uniforms, one 256-byte slot per child in the frame buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct SpriteUniforms {
    pub(crate) matrix: [[f32; 4]; 3],
    pub(crate) opacity: f32,
    pub(crate) brightness: f32,
    pub(crate) color_shift: f32,
    pub(crate) mosaic: f32,
    pub(crate) pixelate: f32,
    pub(crate) whirl: f32,
    pub(crate) fisheye: f32,
    pub(crate) _pad: f32,
    pub(crate) size: [f32; 2],
    pub(crate) _pad2: [f32; 2],
}

impl SpriteUniforms {
    pub(crate) fn for_child(matrix: &Mat3, filters: &Filters, tex_w: u32, tex_h: u32) -> Self {
        Self {
            matrix: matrix.to_gpu_columns(),
            opacity: filters.ghost_opacity() as f32,
            brightness: filters.brightness_offset() as f32,
            color_shift: filters.color_shift() as f32,
            mosaic: filters.mosaic_steps(),
            pixelate: filters.pixelate_size(),
            whirl: filters.whirl_radians(),
            fisheye: filters.fisheye_power(),
            _pad: 0.0,
            size: [tex_w as f32, tex_h as f32],
            _pad2: [0.0; 2],
        }
    }
}

/// Byte size of one uniform slot (the required dynamic-offset alignment).
pub(crate) const UNIFORM_SLOT: u64 = 256;

/// Unit-quad vertices shared by every program.
pub(crate) const QUAD_VERTICES: [[f32; 2]; 6] = [
    [0.0, 0.0],
    [1.0, 0.0],
    [0.0, 1.0],
    [0.0, 1.0],
    [1.0, 0.0],
    [1.0, 1.0],
];

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

/// Vertex layout of the unit quad.
pub(crate) fn quad_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 8,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &QUAD_ATTRIBUTES,
    }
}

/// Compiles, caches, and hands out sprite pipeline variants.
pub(crate) struct SpriteVariants {
    pub(crate) uniform_layout: wgpu::BindGroupLayout,
    pub(crate) texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<VariantKey, wgpu::RenderPipeline>,
}

impl SpriteVariants {
    pub(crate) fn new(ctx: &GpuContext) -> Self {
        let uniform_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("sprite-uniforms"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: true,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });
        let texture_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("sprite-texture"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });
        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("sprite"),
                bind_group_layouts: &[&uniform_layout, &texture_layout],
                push_constant_ranges: &[],
            });

        Self {
            uniform_layout,
            texture_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
        }
    }

    /// Link the variant if it has not been linked yet. Compile and link
    /// failures surface as [`RenderError::Shader`] with the validation log.
    pub(crate) fn ensure(&mut self, ctx: &GpuContext, flags: &[EffectFlag]) -> RenderResult<()> {
        let key = variant_key(flags);
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }

        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("sprite"),
                source: wgpu::ShaderSource::Wgsl(sprite_shader_source(flags).into()),
            });
        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("sprite"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[quad_layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        if let Some(err) = pollster::block_on(ctx.device.pop_error_scope()) {
            return Err(RenderError::shader(format!(
                "sprite variant {key:?} failed to link: {err}"
            )));
        }

        debug!(?key, "linked sprite shader variant");
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    /// Fetch a previously linked variant; a miss is a programming error.
    pub(crate) fn get(&self, flags: &[EffectFlag]) -> RenderResult<&wgpu::RenderPipeline> {
        let key = variant_key(flags);
        self.pipelines
            .get(&key)
            .ok_or_else(|| RenderError::shader(format!("variant {key:?} was never linked")))
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/render/variants.rs"]
mod tests;
