use std::path::Path;

use glam::{vec2, Vec2};
use windows::Win32::Graphics::{
    Direct3D11::{
        ID3D11Device, ID3D11ShaderResourceView, D3D11_BIND_SHADER_RESOURCE,
        D3D11_SUBRESOURCE_DATA, D3D11_TEXTURE2D_DESC, D3D11_USAGE_IMMUTABLE,
    },
    Dxgi::Common::{DXGI_FORMAT, DXGI_SAMPLE_DESC},
};

use crate::{error::AppError, gfx::texture_data::TextureData};

/// An immutable GPU texture and its shader resource view.
pub struct Texture {
    view: ID3D11ShaderResourceView,
    width: u32,
    height: u32,
}

impl Texture {
    pub fn create(device: &ID3D11Device, data: &TextureData) -> Result<Self, AppError> {
        let desc = D3D11_TEXTURE2D_DESC {
            Width: data.width,
            Height: data.height,
            MipLevels: data.mips.len() as u32,
            ArraySize: 1,
            Format: DXGI_FORMAT(data.format.dxgi_value() as i32),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_IMMUTABLE,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            CPUAccessFlags: 0,
            MiscFlags: 0,
        };

        let initial_data: Vec<D3D11_SUBRESOURCE_DATA> = data
            .mips
            .iter()
            .enumerate()
            .map(|(level, mip)| D3D11_SUBRESOURCE_DATA {
                pSysMem: data.mip_bytes(level).as_ptr().cast(),
                SysMemPitch: mip.row_pitch as u32,
                SysMemSlicePitch: mip.len as u32,
            })
            .collect();

        let mut texture = None;
        unsafe { device.CreateTexture2D(&desc, Some(initial_data.as_ptr()), Some(&mut texture)) }?;
        let texture = texture.ok_or_else(|| AppError::Texture("CreateTexture2D returned nothing".into()))?;

        let mut view = None;
        unsafe { device.CreateShaderResourceView(&texture, None, Some(&mut view)) }?;
        let view = view.ok_or_else(|| AppError::Texture("CreateShaderResourceView returned nothing".into()))?;

        Ok(Self {
            view,
            width: data.width,
            height: data.height,
        })
    }

    pub fn from_file(device: &ID3D11Device, path: &Path) -> Result<Self, AppError> {
        let data = TextureData::load(path)?;
        Self::create(device, &data)
    }

    pub fn view(&self) -> &ID3D11ShaderResourceView {
        &self.view
    }

    pub fn size(&self) -> Vec2 {
        vec2(self.width as f32, self.height as f32)
    }
}
