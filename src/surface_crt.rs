use crate::{
    error::{RetropicError, RetropicResult},
    raster::RasterImage,
    surface::CrtOptions,
};

/// Upper bound on blur taps compiled into the fragment shader; the runtime
/// radius is clamped to it.
pub const MAX_BLUR_TAPS: u32 = 16;

const UNIFORM_SIZE: u64 = 48;

const CRT_SHADER: &str = r#"
struct VsOut {
  @builtin(position) pos: vec4<f32>,
  @location(0) uv: vec2<f32>,
};

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> VsOut {
  var p = array<vec2<f32>, 3>(
    vec2<f32>(-1.0, -1.0),
    vec2<f32>( 3.0, -1.0),
    vec2<f32>(-1.0,  3.0),
  );
  let pos = p[vi];
  var o: VsOut;
  o.pos = vec4<f32>(pos, 0.0, 1.0);
  o.uv = (pos + vec2<f32>(1.0, 1.0)) * 0.5;
  return o;
}

struct CrtUniforms {
  // fx, fy, scale, blur radius
  lens: vec4<f32>,
  // grain, vignette, scanlines, unused
  post: vec4<f32>,
  // target w, target h, source w, source h
  res: vec4<f32>,
};

@group(0) @binding(0) var t_src: texture_2d<f32>;
@group(0) @binding(1) var s_src: sampler;
@group(0) @binding(2) var<uniform> u: CrtUniforms;

const MAX_BLUR_TAPS: i32 = 16;

fn grain_noise(p: vec2<f32>) -> f32 {
  return fract(sin(dot(p, vec2<f32>(12.9898, 78.233))) * 43758.5453);
}

fn sample_src(uv: vec2<f32>) -> vec4<f32> {
  return textureSampleLevel(t_src, s_src, uv, 0.0);
}

@fragment
fn fs(in: VsOut) -> @location(0) vec4<f32> {
  let fx = u.lens.x;
  let fy = u.lens.y;
  let scale = u.lens.z;

  // Barrel distortion over centered [-1,1] coordinates.
  let v = in.uv * 2.0 - vec2<f32>(1.0, 1.0);
  var m = v;
  m.x = m.x + ((v.y * v.y / scale) * (v.x / scale)) * -fx;
  m.y = m.y + ((v.x * v.x / scale) * (v.y / scale)) * -fy;
  m = m / scale;
  // Texture space has row 0 at the top; clip space grows upward.
  let uv = vec2<f32>(m.x, -m.y) * 0.5 + vec2<f32>(0.5, 0.5);

  // Horizontal box blur: compile-time tap bound, runtime-controlled radius.
  let radius = i32(clamp(u.lens.w, 0.0, f32(MAX_BLUR_TAPS)));
  var acc = vec4<f32>(0.0);
  var taps = 0.0;
  for (var i = -MAX_BLUR_TAPS; i <= MAX_BLUR_TAPS; i = i + 1) {
    if (abs(i) <= radius) {
      acc = acc + sample_src(uv + vec2<f32>(f32(i) / u.res.z, 0.0));
      taps = taps + 1.0;
    }
  }
  var color = acc / taps;

  // Scanline attenuation on alternating source rows.
  if (u.post.z > 0.5) {
    let row = floor(uv.y * u.res.w);
    let odd = row - 2.0 * floor(row / 2.0);
    color = vec4<f32>(color.rgb * (1.0 - 0.2 * odd), color.a);
  }

  // Two-layer vignette.
  let d = distance(in.uv, vec2<f32>(0.5, 0.5));
  let outer = clamp(smoothstep(-0.6, 0.6, 0.9 - d), 0.0, 1.0);
  let inner = clamp(smoothstep(-0.3, 0.3, 0.7 - d), 0.0, 1.0);
  let vig = mix(1.0, outer * (0.6 + 0.4 * inner), u.post.y);
  color = vec4<f32>(color.rgb * vig, color.a);

  // Film grain, seeded from fragment coordinates only: static across frames
  // at a fixed position.
  let n = grain_noise(in.pos.xy);
  color = vec4<f32>(color.rgb + (n - 0.5) * u.post.x, color.a);

  // Samples mapped outside [0,1] fade out progressively instead of clipping
  // to a hard edge at the distortion boundary.
  let edge = max(abs(m.x), abs(m.y));
  let fade = 1.0 - smoothstep(1.0, 1.04, edge);
  return vec4<f32>(color.rgb * fade, color.a * fade);
}
"#;

struct SourceTexture {
    width: u32,
    height: u32,
    texture: wgpu::Texture,
}

struct TargetTexture {
    width: u32,
    height: u32,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// The CRT-emulation presentation surface.
///
/// Construction brings up a wgpu device and compiles the fixed shader pair;
/// a compile or link failure is fatal and carries the driver's diagnostic
/// log. All GPU resources are released deterministically when the surface is
/// dropped.
pub struct CrtSurface {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniforms: wgpu::Buffer,
    source: Option<SourceTexture>,
    target: Option<TargetTexture>,
    bind_group: Option<wgpu::BindGroup>,
}

impl CrtSurface {
    pub fn new() -> RetropicResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                RetropicError::gpu("no gpu adapter available")
            }
            other => RetropicError::gpu(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) =
            pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            }))
            .map_err(|e| RetropicError::gpu(format!("wgpu request_device failed: {e:?}")))?;

        // Shader and pipeline creation run under a validation error scope so
        // a compile or link failure surfaces with the compiler log attached
        // instead of going through the uncaptured-error handler.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("retropic_crt_shader"),
            source: wgpu::ShaderSource::Wgsl(CRT_SHADER.into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("retropic_crt_bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: Some(
                                std::num::NonZeroU64::new(UNIFORM_SIZE).unwrap(),
                            ),
                        },
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("retropic_crt_pl"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("retropic_crt_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RetropicError::shader(err.to_string()));
        }

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("retropic_crt_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("retropic_crt_uniforms"),
            size: UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            sampler,
            uniforms,
            source: None,
            target: None,
            bind_group: None,
        })
    }

    /// Render one frame: upload the raster (full texture, every call), write
    /// the per-frame options, and draw into the aspect-corrected target.
    pub fn update(
        &mut self,
        raster: &RasterImage,
        options: CrtOptions,
        target: (u32, u32),
    ) -> RetropicResult<()> {
        if raster.width == 0 || raster.height == 0 {
            return Err(RetropicError::evaluation("cannot present an empty raster"));
        }
        let (tw, th) = (target.0.max(1), target.1.max(1));

        self.ensure_source(raster.width, raster.height);
        self.ensure_target(tw, th);
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| RetropicError::evaluation("crt source texture missing"))?;

        // No dirty tracking: the full image is re-uploaded each call.
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &raster.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(raster.width * 4),
                rows_per_image: Some(raster.height),
            },
            wgpu::Extent3d {
                width: raster.width,
                height: raster.height,
                depth_or_array_layers: 1,
            },
        );

        let mut data = [0u8; UNIFORM_SIZE as usize];
        let fields = [
            options.fx,
            options.fy,
            options.scale,
            options.h_blur.clamp(0.0, MAX_BLUR_TAPS as f32),
            options.grain,
            options.vignette,
            if options.scanlines { 1.0 } else { 0.0 },
            0.0,
            tw as f32,
            th as f32,
            raster.width as f32,
            raster.height as f32,
        ];
        for (i, f) in fields.iter().enumerate() {
            data[i * 4..i * 4 + 4].copy_from_slice(&f.to_le_bytes());
        }
        self.queue.write_buffer(&self.uniforms, 0, &data);

        let target_view = &self
            .target
            .as_ref()
            .ok_or_else(|| RetropicError::evaluation("crt target texture missing"))?
            .view;
        let bind_group = self
            .bind_group
            .as_ref()
            .ok_or_else(|| RetropicError::evaluation("crt bind group missing"))?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("retropic_crt_encoder"),
            });
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("retropic_crt_rp"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(&self.pipeline);
            rp.set_bind_group(0, bind_group, &[]);
            rp.draw(0..3, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Current backing-store dimensions.
    pub fn target_size(&self) -> (u32, u32) {
        self.target.as_ref().map_or((0, 0), |t| (t.width, t.height))
    }

    /// Read the most recently rendered frame back into a raster.
    pub fn read_pixels(&mut self) -> RetropicResult<RasterImage> {
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| RetropicError::evaluation("nothing rendered yet"))?;

        let bytes_per_row_unpadded = target.width * 4;
        let bytes_per_row = align_to(bytes_per_row_unpadded, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer_size = u64::from(bytes_per_row) * u64::from(target.height);

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("retropic_crt_readback"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("retropic_crt_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(target.height),
                },
            },
            wgpu::Extent3d {
                width: target.width,
                height: target.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| RetropicError::gpu(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| RetropicError::gpu("readback channel closed"))?
            .map_err(|e| RetropicError::gpu(format!("readback map failed: {e:?}")))?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = (target.width as usize) * 4;
        let padded_row_bytes = bytes_per_row as usize;
        let mut out = Vec::with_capacity(row_bytes * target.height as usize);
        for row in 0..target.height as usize {
            let start = row * padded_row_bytes;
            out.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        readback.unmap();

        RasterImage::from_vec(target.width, target.height, out)
    }

    fn ensure_source(&mut self, width: u32, height: u32) {
        let up_to_date = self
            .source
            .as_ref()
            .is_some_and(|s| s.width == width && s.height == height);
        if up_to_date {
            return;
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("retropic_crt_source"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("retropic_crt_bg"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniforms.as_entire_binding(),
                },
            ],
        }));
        self.source = Some(SourceTexture {
            width,
            height,
            texture,
        });
    }

    fn ensure_target(&mut self, width: u32, height: u32) {
        let up_to_date = self
            .target
            .as_ref()
            .is_some_and(|t| t.width == width && t.height == height);
        if up_to_date {
            return;
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("retropic_crt_target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.target = Some(TargetTexture {
            width,
            height,
            texture,
            view,
        });
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_rounds_up_to_the_alignment() {
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(1280, 256), 1280);
        assert_eq!(align_to(1284, 256), 1536);
    }
}
