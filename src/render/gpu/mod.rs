//! The wgpu-accelerated backend.
//!
//! Renders into an owned offscreen target; the pen layer is a 480x360
//! texture drawn by dedicated dot/line programs and composited as a
//! full-screen quad between the backdrop and the children. Queries the GPU
//! has no advantage on (everything that composites the rest of the stage)
//! delegate to an embedded software renderer; pen primitives are mirrored
//! into it so delegated queries observe identical pen state.

use std::sync::Arc;

use kurbo::Affine;
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::foundation::core::{
    FrameRgba, Rgb24, STAGE_HEIGHT, STAGE_WIDTH, stage_to_screen,
};
use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::math::Mat3;
use crate::model::costume::CostumeLod;
use crate::model::pen::PenColor;
use crate::model::target::{Child, Stage};
use crate::render::software::SoftwareRenderer;
use crate::render::texture_cache::LodCache;
use crate::render::{ProjectRenderer, RendererConfig, SpriteRenderer, placement_transform};

pub(crate) mod context;
pub(crate) mod variants;

use context::{GpuContext, TARGET_FORMAT};
use variants::{
    EffectFlag, QUAD_VERTICES, SpriteUniforms, SpriteVariants, UNIFORM_SLOT, quad_layout,
};

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct PenUniforms {
    a: [f32; 2],
    b: [f32; 2],
    color: [f32; 4],
    radius: f32,
    _pad: [f32; 3],
}

struct CachedTexture {
    bind_group: wgpu::BindGroup,
}

/// One queued sprite draw: which texture, and its uniform slot contents.
type ChildDraw = (Arc<CostumeLod>, SpriteUniforms);

fn target_dims(zoom: f64, scale: f64) -> (u32, u32) {
    (
        ((f64::from(STAGE_WIDTH) * zoom * scale).round().max(1.0)) as u32,
        ((f64::from(STAGE_HEIGHT) * zoom * scale).round().max(1.0)) as u32,
    )
}

/// GPU stage renderer.
pub struct GpuRenderer {
    ctx: GpuContext,
    config: RendererConfig,
    zoom: f64,

    target: wgpu::Texture,
    target_size: (u32, u32),
    pen_texture: wgpu::Texture,

    quad: wgpu::Buffer,
    sampler: wgpu::Sampler,
    variants: SpriteVariants,

    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_slots: u32,

    pen_uniform_buffer: wgpu::Buffer,
    pen_uniform_bind_group: wgpu::BindGroup,
    pen_dot_pipeline: wgpu::RenderPipeline,
    pen_line_pipeline: wgpu::RenderPipeline,
    overlay_pipeline: wgpu::RenderPipeline,
    overlay_bind_group: wgpu::BindGroup,

    textures: LodCache<CachedTexture>,
    fallback: SoftwareRenderer,
}

impl GpuRenderer {
    /// Acquire a device, link the rendering and query shader variants, and
    /// allocate the quad buffer, pen texture, and output target.
    pub fn new(config: RendererConfig) -> RenderResult<Self> {
        let ctx = GpuContext::new()?;

        let mut variants = SpriteVariants::new(&ctx);
        variants.ensure(&ctx, &EffectFlag::ALL)?;
        variants.ensure(&ctx, &EffectFlag::SHAPE_ONLY)?;

        let quad = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("unit-quad"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("costume"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let (uniform_buffer, uniform_bind_group) =
            Self::make_uniform_buffer(&ctx, &variants.uniform_layout, 16);

        // Pen programs: uniforms shared by the dot and line entry points.
        let pen_uniform_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("pen-uniforms"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });
        let pen_uniform_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pen-uniforms"),
            size: std::mem::size_of::<PenUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let pen_uniform_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pen-uniforms"),
            layout: &pen_uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: pen_uniform_buffer.as_entire_binding(),
            }],
        });

        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pen_module = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("pen"),
                source: wgpu::ShaderSource::Wgsl(include_str!("pen.wgsl").into()),
            });
        let overlay_module = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("overlay"),
                source: wgpu::ShaderSource::Wgsl(include_str!("overlay.wgsl").into()),
            });

        let pen_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("pen"),
                bind_group_layouts: &[&pen_uniform_layout],
                push_constant_ranges: &[],
            });
        let overlay_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("overlay"),
                bind_group_layouts: &[&variants.texture_layout],
                push_constant_ranges: &[],
            });

        let pen_pipeline = |entry: &str| {
            ctx.device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("pen"),
                    layout: Some(&pen_layout),
                    vertex: wgpu::VertexState {
                        module: &pen_module,
                        entry_point: Some("vs_pen"),
                        compilation_options: Default::default(),
                        buffers: &[quad_layout()],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &pen_module,
                        entry_point: Some(entry),
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
                })
        };
        let pen_dot_pipeline = pen_pipeline("fs_dot");
        let pen_line_pipeline = pen_pipeline("fs_line");

        let overlay_pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("overlay"),
                layout: Some(&overlay_layout),
                vertex: wgpu::VertexState {
                    module: &overlay_module,
                    entry_point: Some("vs_overlay"),
                    compilation_options: Default::default(),
                    buffers: &[quad_layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &overlay_module,
                    entry_point: Some("fs_overlay"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
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
                "pen/overlay programs failed to link: {err}"
            )));
        }

        let pen_texture = ctx.create_target(STAGE_WIDTH, STAGE_HEIGHT, "pen-layer");
        let pen_view = pen_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let overlay_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pen-overlay"),
            layout: &variants.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&pen_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let target_size = target_dims(1.0, config.scale);
        let target = ctx.create_target(target_size.0, target_size.1, "stage-target");

        Ok(Self {
            ctx,
            config,
            zoom: 1.0,
            target,
            target_size,
            pen_texture,
            quad,
            sampler,
            variants,
            uniform_buffer,
            uniform_bind_group,
            uniform_slots: 16,
            pen_uniform_buffer,
            pen_uniform_bind_group,
            pen_dot_pipeline,
            pen_line_pipeline,
            overlay_pipeline,
            overlay_bind_group,
            textures: LodCache::new(),
            fallback: SoftwareRenderer::new(config),
        })
    }

    fn make_uniform_buffer(
        ctx: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        slots: u32,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprite-uniforms"),
            size: u64::from(slots) * UNIFORM_SLOT,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite-uniforms"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<SpriteUniforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Make sure a texture exists for the LOD (cache miss uploads it).
    fn ensure_texture(&mut self, lod: &Arc<CostumeLod>) {
        if self.textures.get(lod).is_some() {
            return;
        }
        let texture = self
            .ctx
            .upload_rgba(lod.width(), lod.height(), lod.pixels(), "costume-lod");
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("costume-lod"),
            layout: &self.variants.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        debug!(lod = lod.id(), "uploaded costume texture");
        self.textures.insert(lod, CachedTexture { bind_group });
    }

    /// Build a child's draw record: skip missing costumes and degenerate
    /// rects, pick the texture LOD, and assemble the uniform slot.
    fn child_draw(
        &mut self,
        child: Child<'_>,
        proj_w: u32,
        proj_h: u32,
        k: f64,
    ) -> Option<ChildDraw> {
        let costume = child.costume()?;
        let p = child.placement();
        let object_scale = costume.scale() * p.scale;
        let w = costume.width() as f64 * object_scale;
        let h = costume.height() as f64 * object_scale;
        if !(w >= 1.0 && h >= 1.0) {
            return None;
        }

        let lod = costume.lod(1.0).clone();
        let affine = placement_transform(&p, costume, k)
            * Affine::scale(costume.lod_pixel_scale(&lod))
            * Affine::scale_non_uniform(f64::from(lod.width()), f64::from(lod.height()));
        let mut matrix = Mat3::projection(proj_w as f32, proj_h as f32);
        matrix.multiply(&Mat3::from_affine(affine));

        let uniforms = SpriteUniforms::for_child(&matrix, child.filters(), lod.width(), lod.height());
        self.ensure_texture(&lod);
        Some((lod, uniforms))
    }

    /// Write one 256-byte uniform slot per draw, growing the buffer when a
    /// frame has more children than before.
    fn write_uniform_slots(&mut self, draws: &[ChildDraw]) {
        let needed = draws.len().max(1) as u32;
        if needed > self.uniform_slots {
            let slots = needed.next_power_of_two();
            let (buffer, bind_group) =
                Self::make_uniform_buffer(&self.ctx, &self.variants.uniform_layout, slots);
            self.uniform_buffer = buffer;
            self.uniform_bind_group = bind_group;
            self.uniform_slots = slots;
        }

        let mut bytes = vec![0u8; draws.len().max(1) * UNIFORM_SLOT as usize];
        for (i, (_, uniforms)) in draws.iter().enumerate() {
            let start = i * UNIFORM_SLOT as usize;
            let raw = bytemuck::bytes_of(uniforms);
            bytes[start..start + raw.len()].copy_from_slice(raw);
        }
        self.ctx.queue.write_buffer(&self.uniform_buffer, 0, &bytes);
    }

    /// Encode sprite draws into an open render pass, one slot per draw.
    fn encode_sprites<'p>(
        &'p self,
        pass: &mut wgpu::RenderPass<'p>,
        pipeline: &'p wgpu::RenderPipeline,
        draws: &[ChildDraw],
        first_slot: u32,
    ) -> RenderResult<()> {
        pass.set_pipeline(pipeline);
        for (i, (lod, _)) in draws.iter().enumerate() {
            let texture = self
                .textures
                .get(lod)
                .ok_or_else(|| RenderError::resource("costume texture missing from cache"))?;
            let offset = (first_slot + i as u32) * UNIFORM_SLOT as u32;
            pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
            pass.set_bind_group(1, &texture.bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        Ok(())
    }

    /// Run one pen program over the pen texture.
    fn pen_draw(&mut self, uniforms: PenUniforms, line: bool) -> RenderResult<()> {
        self.ctx
            .queue
            .write_buffer(&self.pen_uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        let view = self
            .pen_texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("pen") });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pen"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(if line {
                &self.pen_line_pipeline
            } else {
                &self.pen_dot_pipeline
            });
            pass.set_bind_group(0, &self.pen_uniform_bind_group, &[]);
            pass.set_vertex_buffer(0, self.quad.slice(..));
            pass.draw(0..6, 0..1);
        }
        self.ctx.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

impl SpriteRenderer for GpuRenderer {
    fn draw_child(&mut self, child: Child<'_>) -> RenderResult<()> {
        let (w, h) = self.target_size;
        let k = self.zoom * self.config.scale;
        let Some(draw) = self.child_draw(child, w, h, k) else {
            return Ok(());
        };
        self.write_uniform_slots(std::slice::from_ref(&draw));

        let pipeline = self.variants.get(&EffectFlag::ALL)?;
        let view = self
            .target
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("draw-child"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("draw-child"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_vertex_buffer(0, self.quad.slice(..));
            self.encode_sprites(&mut pass, pipeline, std::slice::from_ref(&draw), 0)?;
        }
        self.ctx.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

impl ProjectRenderer for GpuRenderer {
    fn draw_frame(&mut self, stage: &Stage) -> RenderResult<()> {
        let pruned = self.textures.prune();
        if pruned > 0 {
            debug!(pruned, "released unreachable costume textures");
        }

        let (w, h) = target_dims(self.zoom, self.config.scale);
        if (w, h) != self.target_size {
            self.target = self.ctx.create_target(w, h, "stage-target");
            self.target_size = (w, h);
        }
        let k = self.zoom * self.config.scale;

        let mut backdrop = Vec::new();
        if let Some(draw) = self.child_draw(Child::Stage(stage), w, h, k) {
            backdrop.push(draw);
        }
        let mut children = Vec::new();
        for child in &stage.children {
            if !child.visible {
                continue;
            }
            if let Some(draw) = self.child_draw(Child::Sprite(child), w, h, k) {
                children.push(draw);
            }
        }

        let mut all = backdrop.clone();
        all.extend(children.iter().cloned());
        self.write_uniform_slots(&all);

        let pipeline = self.variants.get(&EffectFlag::ALL)?;
        let view = self
            .target
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("frame") });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_vertex_buffer(0, self.quad.slice(..));

            self.encode_sprites(&mut pass, pipeline, &backdrop, 0)?;

            pass.set_pipeline(&self.overlay_pipeline);
            pass.set_bind_group(0, &self.overlay_bind_group, &[]);
            pass.draw(0..6, 0..1);

            self.encode_sprites(&mut pass, pipeline, &children, backdrop.len() as u32)?;
        }
        self.ctx.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn frame(&mut self) -> RenderResult<FrameRgba> {
        let (w, h) = self.target_size;
        let data = self.ctx.read_back(&self.target, w, h)?;
        Ok(FrameRgba {
            width: w,
            height: h,
            data,
        })
    }

    fn on_stage_filters_changed(&mut self) {
        // The backdrop re-renders every frame here; only the software
        // delegate caches it.
        self.fallback.on_stage_filters_changed();
    }

    fn resize(&mut self, zoom: f64) {
        self.zoom = zoom;
        self.fallback.resize(zoom);
        let dims = target_dims(zoom, self.config.scale);
        if dims != self.target_size {
            self.target = self.ctx.create_target(dims.0, dims.1, "stage-target");
            self.target_size = dims;
        }
    }

    fn pen_line(
        &mut self,
        color: &PenColor,
        size: f64,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    ) -> RenderResult<()> {
        self.fallback.pen_line(color, size, x1, y1, x2, y2)?;

        let (mut sx1, mut sy1) = stage_to_screen(x1, y1, 1.0);
        let (mut sx2, mut sy2) = stage_to_screen(x2, y2, 1.0);
        let m = size.rem_euclid(2.0);
        if m > 0.5 && m < 1.5 {
            sx1 -= 0.5;
            sy1 -= 0.5;
            sx2 -= 0.5;
            sy2 -= 0.5;
        }
        let (r, g, b, a) = color.to_parts();
        self.pen_draw(
            PenUniforms {
                a: [sx1 as f32, sy1 as f32],
                b: [sx2 as f32, sy2 as f32],
                color: [r, g, b, a],
                radius: (size / 2.0) as f32,
                _pad: [0.0; 3],
            },
            true,
        )
    }

    fn pen_dot(&mut self, color: &PenColor, size: f64, x: f64, y: f64) -> RenderResult<()> {
        self.fallback.pen_dot(color, size, x, y)?;

        let (sx, sy) = stage_to_screen(x, y, 1.0);
        let center = [sx as f32, sy as f32];
        let (r, g, b, a) = color.to_parts();
        self.pen_draw(
            PenUniforms {
                a: center,
                b: center,
                color: [r, g, b, a],
                radius: (size / 2.0) as f32,
                _pad: [0.0; 3],
            },
            false,
        )
    }

    fn pen_stamp(&mut self, stage: &Stage, sprite: usize) -> RenderResult<()> {
        self.fallback.pen_stamp(stage, sprite)?;

        let child = stage
            .children
            .get(sprite)
            .ok_or_else(|| RenderError::resource(format!("no sprite at index {sprite}")))?;
        let Some(draw) = self.child_draw(Child::Sprite(child), STAGE_WIDTH, STAGE_HEIGHT, 1.0)
        else {
            return Ok(());
        };
        self.write_uniform_slots(std::slice::from_ref(&draw));

        let pipeline = self.variants.get(&EffectFlag::ALL)?;
        let view = self
            .pen_texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pen-stamp"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pen-stamp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_vertex_buffer(0, self.quad.slice(..));
            self.encode_sprites(&mut pass, pipeline, std::slice::from_ref(&draw), 0)?;
        }
        self.ctx.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn pen_clear(&mut self) -> RenderResult<()> {
        self.fallback.pen_clear()?;

        let view = self
            .pen_texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pen-clear"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pen-clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        self.ctx.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn sprite_touches_point(
        &mut self,
        stage: &Stage,
        sprite: usize,
        x: f64,
        y: f64,
    ) -> RenderResult<bool> {
        let index = sprite;
        let child = stage
            .children
            .get(index)
            .ok_or_else(|| RenderError::resource(format!("no sprite at index {index}")))?;

        // Color-only filters leave the shape alone; the CPU sampling path is
        // exact there and needs no readback.
        if !child.filters.is_shape_affecting() {
            return self.fallback.sprite_touches_point(stage, index, x, y);
        }

        let (sx, sy) = stage_to_screen(x, y, 1.0);
        let px = sx.round();
        let py = sy.round();
        if px < 0.0 || py < 0.0 || px >= f64::from(STAGE_WIDTH) || py >= f64::from(STAGE_HEIGHT) {
            return Ok(false);
        }

        let Some(draw) = self.child_draw(Child::Sprite(child), STAGE_WIDTH, STAGE_HEIGHT, 1.0)
        else {
            return Ok(false);
        };
        self.write_uniform_slots(std::slice::from_ref(&draw));

        // One-shot query target, released before returning.
        let scratch = self
            .ctx
            .create_target(STAGE_WIDTH, STAGE_HEIGHT, "touch-query");
        let pipeline = self.variants.get(&EffectFlag::SHAPE_ONLY)?;
        let view = scratch.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("touch-query"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("touch-query"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_vertex_buffer(0, self.quad.slice(..));
            self.encode_sprites(&mut pass, pipeline, std::slice::from_ref(&draw), 0)?;
        }
        self.ctx.queue.submit(Some(encoder.finish()));

        let pixel = self.ctx.read_pixel(&scratch, px as u32, py as u32)?;
        Ok(pixel[3] != 0)
    }

    fn sprites_intersect(
        &mut self,
        stage: &Stage,
        sprite: usize,
        others: &[usize],
    ) -> RenderResult<bool> {
        self.fallback.sprites_intersect(stage, sprite, others)
    }

    fn sprite_touches_color(
        &mut self,
        stage: &Stage,
        sprite: usize,
        color: Rgb24,
    ) -> RenderResult<bool> {
        self.fallback.sprite_touches_color(stage, sprite, color)
    }

    fn sprite_color_touches_color(
        &mut self,
        stage: &Stage,
        sprite: usize,
        sprite_color: Rgb24,
        other_color: Rgb24,
    ) -> RenderResult<bool> {
        self.fallback
            .sprite_color_touches_color(stage, sprite, sprite_color, other_color)
    }
}
