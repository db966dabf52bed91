//! Direct3D 11 half of the sprite batch.

use glam::Vec2;
use windows::{
    core::{s, Interface},
    Win32::Graphics::{
        Direct3D::D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST,
        Direct3D11::{
            ID3D11BlendState, ID3D11Buffer, ID3D11DepthStencilState, ID3D11Device,
            ID3D11DeviceContext, ID3D11InputLayout, ID3D11PixelShader, ID3D11RasterizerState,
            ID3D11SamplerState, ID3D11ShaderResourceView, ID3D11VertexShader,
            D3D11_BIND_CONSTANT_BUFFER, D3D11_BIND_INDEX_BUFFER, D3D11_BIND_VERTEX_BUFFER,
            D3D11_BLEND_DESC, D3D11_BLEND_INV_SRC_ALPHA, D3D11_BLEND_ONE, D3D11_BLEND_OP_ADD,
            D3D11_BUFFER_DESC, D3D11_COLOR_WRITE_ENABLE_ALL, D3D11_COMPARISON_ALWAYS,
            D3D11_COMPARISON_NEVER, D3D11_CPU_ACCESS_WRITE, D3D11_CULL_NONE,
            D3D11_DEPTH_STENCILOP_DESC, D3D11_DEPTH_STENCIL_DESC, D3D11_DEPTH_WRITE_MASK_ZERO,
            D3D11_FILL_SOLID, D3D11_FILTER_MIN_MAG_MIP_LINEAR, D3D11_FLOAT32_MAX,
            D3D11_INPUT_ELEMENT_DESC, D3D11_INPUT_PER_VERTEX_DATA, D3D11_MAPPED_SUBRESOURCE,
            D3D11_MAP_WRITE_DISCARD, D3D11_MAP_WRITE_NO_OVERWRITE, D3D11_RASTERIZER_DESC,
            D3D11_RENDER_TARGET_BLEND_DESC, D3D11_SAMPLER_DESC, D3D11_STENCIL_OP_KEEP,
            D3D11_SUBRESOURCE_DATA, D3D11_TEXTURE_ADDRESS_CLAMP, D3D11_USAGE_DYNAMIC,
            D3D11_USAGE_IMMUTABLE, D3D11_VIEWPORT,
        },
        Dxgi::Common::{
            DXGI_FORMAT_R16_UINT, DXGI_FORMAT_R32G32B32A32_FLOAT, DXGI_FORMAT_R32G32B32_FLOAT,
            DXGI_FORMAT_R32G32_FLOAT,
        },
    },
};

use crate::{
    error::AppError,
    gfx::{
        color::Color,
        shader::{blob_bytes, compile_shader},
        sprite_batch::{
            sprite_indices, viewport_transform, Batch, DrawParams, PreparedSprites,
            SpriteQueue, SpriteRing, SpriteSortMode, SpriteVertex, INDICES_PER_SPRITE,
            MAX_BATCH_SIZE, VERTICES_PER_SPRITE,
        },
        texture::Texture,
    },
};

const SPRITE_SHADER: &str = r#"
cbuffer Parameters : register(b0)
{
    row_major float4x4 MatrixTransform;
};

Texture2D<float4> Texture : register(t0);
sampler TextureSampler : register(s0);

struct VSInput
{
    float4 position : POSITION;
    float4 color : COLOR;
    float2 texCoord : TEXCOORD0;
};

struct PSInput
{
    float4 position : SV_Position;
    float4 color : COLOR;
    float2 texCoord : TEXCOORD0;
};

PSInput SpriteVertexShader(VSInput input)
{
    PSInput output;
    output.position = mul(input.position, MatrixTransform);
    output.color = input.color;
    output.texCoord = input.texCoord;
    return output;
}

float4 SpritePixelShader(PSInput input) : SV_Target0
{
    return Texture.Sample(TextureSampler, input.texCoord) * input.color;
}
"#;

/// Pipeline objects shared by every batch drawn with this sprite batch.
struct SpritePipeline {
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    vertex_buffer: ID3D11Buffer,
    index_buffer: ID3D11Buffer,
    constant_buffer: ID3D11Buffer,
    blend_state: ID3D11BlendState,
    sampler_state: ID3D11SamplerState,
    rasterizer_state: ID3D11RasterizerState,
    depth_stencil_state: ID3D11DepthStencilState,
}

fn created<T>(value: Option<T>, what: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Shader(format!("{what} was not created")))
}

impl SpritePipeline {
    fn new(device: &ID3D11Device) -> Result<Self, AppError> {
        let vertex_blob = compile_shader(SPRITE_SHADER, s!("SpriteVertexShader"), s!("vs_4_0_level_9_3"))?;
        let pixel_blob = compile_shader(SPRITE_SHADER, s!("SpritePixelShader"), s!("ps_4_0_level_9_3"))?;
        let vertex_code = blob_bytes(&vertex_blob);
        let pixel_code = blob_bytes(&pixel_blob);

        let mut vertex_shader = None;
        unsafe { device.CreateVertexShader(vertex_code, None, Some(&mut vertex_shader)) }?;
        let mut pixel_shader = None;
        unsafe { device.CreatePixelShader(pixel_code, None, Some(&mut pixel_shader)) }?;

        let input_element_descs = [
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("POSITION"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("COLOR"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32A32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 12,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: s!("TEXCOORD"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 28,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];
        let mut input_layout = None;
        unsafe { device.CreateInputLayout(&input_element_descs, vertex_code, Some(&mut input_layout)) }?;

        let vertex_buffer_desc = D3D11_BUFFER_DESC {
            ByteWidth: (MAX_BATCH_SIZE * VERTICES_PER_SPRITE * std::mem::size_of::<SpriteVertex>()) as u32,
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: D3D11_BIND_VERTEX_BUFFER.0 as u32,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            ..Default::default()
        };
        let mut vertex_buffer = None;
        unsafe { device.CreateBuffer(&vertex_buffer_desc, None, Some(&mut vertex_buffer)) }?;

        let indices = sprite_indices(MAX_BATCH_SIZE);
        let index_bytes: &[u8] = bytemuck::cast_slice(&indices);
        let index_buffer_desc = D3D11_BUFFER_DESC {
            ByteWidth: index_bytes.len() as u32,
            Usage: D3D11_USAGE_IMMUTABLE,
            BindFlags: D3D11_BIND_INDEX_BUFFER.0 as u32,
            ..Default::default()
        };
        let index_data = D3D11_SUBRESOURCE_DATA {
            pSysMem: index_bytes.as_ptr().cast(),
            ..Default::default()
        };
        let mut index_buffer = None;
        unsafe { device.CreateBuffer(&index_buffer_desc, Some(&index_data), Some(&mut index_buffer)) }?;

        let constant_buffer_desc = D3D11_BUFFER_DESC {
            ByteWidth: std::mem::size_of::<[f32; 16]>() as u32,
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: D3D11_BIND_CONSTANT_BUFFER.0 as u32,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            ..Default::default()
        };
        let mut constant_buffer = None;
        unsafe { device.CreateBuffer(&constant_buffer_desc, None, Some(&mut constant_buffer)) }?;

        // Premultiplied alpha.
        let mut blend_desc = D3D11_BLEND_DESC::default();
        blend_desc.RenderTarget[0] = D3D11_RENDER_TARGET_BLEND_DESC {
            BlendEnable: true.into(),
            SrcBlend: D3D11_BLEND_ONE,
            DestBlend: D3D11_BLEND_INV_SRC_ALPHA,
            BlendOp: D3D11_BLEND_OP_ADD,
            SrcBlendAlpha: D3D11_BLEND_ONE,
            DestBlendAlpha: D3D11_BLEND_INV_SRC_ALPHA,
            BlendOpAlpha: D3D11_BLEND_OP_ADD,
            RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
        };
        let mut blend_state = None;
        unsafe { device.CreateBlendState(&blend_desc, Some(&mut blend_state)) }?;

        let sampler_desc = D3D11_SAMPLER_DESC {
            Filter: D3D11_FILTER_MIN_MAG_MIP_LINEAR,
            AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
            MipLODBias: 0.0,
            MaxAnisotropy: 1,
            ComparisonFunc: D3D11_COMPARISON_NEVER,
            BorderColor: [0.0; 4],
            MinLOD: 0.0,
            MaxLOD: D3D11_FLOAT32_MAX,
        };
        let mut sampler_state = None;
        unsafe { device.CreateSamplerState(&sampler_desc, Some(&mut sampler_state)) }?;

        let rasterizer_desc = D3D11_RASTERIZER_DESC {
            FillMode: D3D11_FILL_SOLID,
            CullMode: D3D11_CULL_NONE,
            DepthClipEnable: true.into(),
            MultisampleEnable: true.into(),
            ..Default::default()
        };
        let mut rasterizer_state = None;
        unsafe { device.CreateRasterizerState(&rasterizer_desc, Some(&mut rasterizer_state)) }?;

        let stencil_op = D3D11_DEPTH_STENCILOP_DESC {
            StencilFailOp: D3D11_STENCIL_OP_KEEP,
            StencilDepthFailOp: D3D11_STENCIL_OP_KEEP,
            StencilPassOp: D3D11_STENCIL_OP_KEEP,
            StencilFunc: D3D11_COMPARISON_ALWAYS,
        };
        let depth_stencil_desc = D3D11_DEPTH_STENCIL_DESC {
            DepthEnable: false.into(),
            DepthWriteMask: D3D11_DEPTH_WRITE_MASK_ZERO,
            DepthFunc: D3D11_COMPARISON_ALWAYS,
            StencilEnable: false.into(),
            StencilReadMask: 0xff,
            StencilWriteMask: 0xff,
            FrontFace: stencil_op,
            BackFace: stencil_op,
        };
        let mut depth_stencil_state = None;
        unsafe { device.CreateDepthStencilState(&depth_stencil_desc, Some(&mut depth_stencil_state)) }?;

        Ok(Self {
            vertex_shader: created(vertex_shader, "sprite vertex shader")?,
            pixel_shader: created(pixel_shader, "sprite pixel shader")?,
            input_layout: created(input_layout, "sprite input layout")?,
            vertex_buffer: created(vertex_buffer, "sprite vertex buffer")?,
            index_buffer: created(index_buffer, "sprite index buffer")?,
            constant_buffer: created(constant_buffer, "sprite constant buffer")?,
            blend_state: created(blend_state, "sprite blend state")?,
            sampler_state: created(sampler_state, "sprite sampler state")?,
            rasterizer_state: created(rasterizer_state, "sprite rasterizer state")?,
            depth_stencil_state: created(depth_stencil_state, "sprite depth stencil state")?,
        })
    }
}

/// Queues textured quads between `begin` and `end` and submits them in as
/// few draw calls as the sort mode allows.
pub struct SpriteBatch {
    pipeline: SpritePipeline,
    context: ID3D11DeviceContext,
    queue: SpriteQueue<usize>,
    /// Views referenced by queued sprites, keyed by their raw pointer.
    textures: Vec<ID3D11ShaderResourceView>,
    ring: SpriteRing,
}

impl SpriteBatch {
    pub fn new(device: &ID3D11Device, context: &ID3D11DeviceContext) -> Result<Self, AppError> {
        let pipeline = SpritePipeline::new(device)?;
        log::debug!("sprite batch ready, {MAX_BATCH_SIZE} sprites per draw");

        Ok(Self {
            pipeline,
            context: context.clone(),
            queue: SpriteQueue::default(),
            textures: Vec::new(),
            ring: SpriteRing::new(MAX_BATCH_SIZE),
        })
    }

    pub fn begin(&mut self, mode: SpriteSortMode) -> Result<(), AppError> {
        self.queue.begin(mode)?;
        if mode == SpriteSortMode::Immediate {
            self.prepare_for_rendering()?;
        }
        Ok(())
    }

    /// Draws the whole texture at `position` with no scaling.
    pub fn draw(&mut self, texture: &Texture, position: Vec2, color: Color) -> Result<(), AppError> {
        self.draw_with(texture, DrawParams::at(position).color(color))
    }

    pub fn draw_with(&mut self, texture: &Texture, params: DrawParams) -> Result<(), AppError> {
        let key = self.texture_key(texture.view());
        if self.queue.push(key, texture.size(), params)? {
            self.flush()?;
        }
        Ok(())
    }

    /// Submits every queued sprite. Pipeline state is left bound.
    pub fn end(&mut self) -> Result<(), AppError> {
        let immediate = self.queue.sort_mode() == Some(SpriteSortMode::Immediate);
        let prepared = self.queue.end()?;

        let result = if prepared.is_empty() {
            Ok(())
        } else if immediate {
            self.render_prepared(&prepared)
        } else {
            self.prepare_for_rendering()
                .and_then(|()| self.render_prepared(&prepared))
        };
        self.textures.clear();
        result
    }

    /// Leaves the batch without drawing what is still queued. Call after a
    /// failed `draw` so the next `begin` succeeds.
    pub fn abort(&mut self) {
        self.queue.abort();
        self.textures.clear();
    }

    fn flush(&mut self) -> Result<(), AppError> {
        let prepared = self.queue.take_prepared();
        let result = self.render_prepared(&prepared);
        self.textures.clear();
        result
    }

    fn texture_key(&mut self, view: &ID3D11ShaderResourceView) -> usize {
        let raw = view.as_raw() as usize;
        if !self.textures.iter().any(|t| t.as_raw() as usize == raw) {
            self.textures.push(view.clone());
        }
        raw
    }

    fn texture_for(&self, key: usize) -> Option<&ID3D11ShaderResourceView> {
        self.textures.iter().find(|t| t.as_raw() as usize == key)
    }

    fn current_viewport(&self) -> D3D11_VIEWPORT {
        let mut count = 1;
        let mut viewport = D3D11_VIEWPORT::default();
        unsafe { self.context.RSGetViewports(&mut count, Some(&mut viewport)) };
        viewport
    }

    fn prepare_for_rendering(&mut self) -> Result<(), AppError> {
        let pipeline = &self.pipeline;
        let context = &self.context;
        let stride = std::mem::size_of::<SpriteVertex>() as u32;
        let offset = 0;

        unsafe {
            context.OMSetBlendState(&pipeline.blend_state, None, 0xffffffff);
            context.OMSetDepthStencilState(&pipeline.depth_stencil_state, 0);
            context.RSSetState(&pipeline.rasterizer_state);
            context.PSSetSamplers(0, Some(&[Some(pipeline.sampler_state.clone())]));

            context.IASetInputLayout(&pipeline.input_layout);
            context.VSSetShader(&pipeline.vertex_shader, None);
            context.PSSetShader(&pipeline.pixel_shader, None);

            context.IASetVertexBuffers(
                0,
                1,
                Some(&Some(pipeline.vertex_buffer.clone())),
                Some(&stride),
                Some(&offset),
            );
            context.IASetIndexBuffer(&pipeline.index_buffer, DXGI_FORMAT_R16_UINT, 0);
            context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
        }

        let viewport = self.current_viewport();
        let transform = viewport_transform(viewport.Width, viewport.Height).to_cols_array();

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            context.Map(&pipeline.constant_buffer, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))?;
            let bytes: &[u8] = bytemuck::cast_slice(&transform);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.pData.cast::<u8>(), bytes.len());
            context.Unmap(&pipeline.constant_buffer, 0);

            context.VSSetConstantBuffers(0, Some(&[Some(pipeline.constant_buffer.clone())]));
        }

        // The device context may have been used elsewhere since the last frame.
        self.ring.reset();
        Ok(())
    }

    fn render_prepared(&mut self, prepared: &PreparedSprites<usize>) -> Result<(), AppError> {
        for batch in &prepared.batches {
            self.render_batch(batch, prepared.batch_vertices(batch))?;
        }
        Ok(())
    }

    fn render_batch(&mut self, batch: &Batch<usize>, vertices: &[SpriteVertex]) -> Result<(), AppError> {
        let Some(view) = self.texture_for(batch.texture).cloned() else {
            log::warn!("dropping {} sprites with an unknown texture", batch.count);
            return Ok(());
        };
        let context = &self.context;
        let vertex_buffer = &self.pipeline.vertex_buffer;

        let slot = self.ring.reserve(batch.count);
        let map_type = if slot.discard {
            D3D11_MAP_WRITE_DISCARD
        } else {
            D3D11_MAP_WRITE_NO_OVERWRITE
        };

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            context.PSSetShaderResources(0, Some(&[Some(view)]));

            context.Map(vertex_buffer, 0, map_type, 0, Some(&mut mapped))?;
            let bytes: &[u8] = bytemuck::cast_slice(vertices);
            let destination = mapped
                .pData
                .cast::<u8>()
                .add(slot.start * VERTICES_PER_SPRITE * std::mem::size_of::<SpriteVertex>());
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), destination, bytes.len());
            context.Unmap(vertex_buffer, 0);

            context.DrawIndexed(
                (batch.count * INDICES_PER_SPRITE) as u32,
                0,
                (slot.start * VERTICES_PER_SPRITE) as i32,
            );
        }

        Ok(())
    }
}
