use windows::Win32::{
    Foundation::{E_POINTER, HMODULE, HWND},
    Graphics::{
        Direct3D::{
            D3D_DRIVER_TYPE, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_REFERENCE,
            D3D_DRIVER_TYPE_WARP, D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_10_0,
            D3D_FEATURE_LEVEL_10_1, D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_9_3,
        },
        Direct3D11::{
            D3D11CreateDeviceAndSwapChain, ID3D11Device, ID3D11DeviceContext,
            ID3D11RenderTargetView, ID3D11Texture2D, D3D11_CREATE_DEVICE_DEBUG,
            D3D11_CREATE_DEVICE_FLAG, D3D11_SDK_VERSION, D3D11_VIEWPORT,
        },
        Dxgi::{
            Common::{
                DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_FORMAT_UNKNOWN, DXGI_MODE_DESC, DXGI_RATIONAL,
                DXGI_SAMPLE_DESC,
            },
            IDXGISwapChain, DXGI_ERROR_SDK_COMPONENT_MISSING, DXGI_PRESENT,
            DXGI_SWAP_CHAIN_DESC, DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH,
            DXGI_SWAP_EFFECT_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT,
        },
    },
};

use crate::{
    config::{AppConfig, CommandLine},
    error::AppError,
    gfx::{
        color::Color,
        driver::{create_with_fallback, driver_candidates, DriverKind},
    },
    os::resize_target,
};

const FEATURE_LEVELS: [D3D_FEATURE_LEVEL; 4] = [
    D3D_FEATURE_LEVEL_11_0,
    D3D_FEATURE_LEVEL_10_1,
    D3D_FEATURE_LEVEL_10_0,
    D3D_FEATURE_LEVEL_9_3,
];

fn d3d_driver_type(driver: DriverKind) -> D3D_DRIVER_TYPE {
    match driver {
        DriverKind::Hardware => D3D_DRIVER_TYPE_HARDWARE,
        DriverKind::Warp => D3D_DRIVER_TYPE_WARP,
        DriverKind::Reference => D3D_DRIVER_TYPE_REFERENCE,
    }
}

struct CreatedDevice {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    swap_chain: IDXGISwapChain,
    feature_level: D3D_FEATURE_LEVEL,
}

fn try_create(
    driver: DriverKind,
    flags: D3D11_CREATE_DEVICE_FLAG,
    swap_chain_desc: &DXGI_SWAP_CHAIN_DESC,
) -> windows::core::Result<CreatedDevice> {
    let mut swap_chain = None;
    let mut device = None;
    let mut context = None;
    let mut feature_level = D3D_FEATURE_LEVEL::default();

    unsafe {
        D3D11CreateDeviceAndSwapChain(
            None,
            d3d_driver_type(driver),
            HMODULE::default(),
            flags,
            Some(&FEATURE_LEVELS),
            D3D11_SDK_VERSION,
            Some(swap_chain_desc),
            Some(&mut swap_chain),
            Some(&mut device),
            Some(&mut feature_level),
            Some(&mut context),
        )
    }?;

    match (device, context, swap_chain) {
        (Some(device), Some(context), Some(swap_chain)) => Ok(CreatedDevice {
            device,
            context,
            swap_chain,
            feature_level,
        }),
        _ => Err(E_POINTER.into()),
    }
}

/// Retries without the debug layer when the SDK layers are not installed.
fn create_device_and_swap_chain(
    driver: DriverKind,
    flags: D3D11_CREATE_DEVICE_FLAG,
    swap_chain_desc: &DXGI_SWAP_CHAIN_DESC,
) -> windows::core::Result<CreatedDevice> {
    match try_create(driver, flags, swap_chain_desc) {
        Err(e)
            if e.code() == DXGI_ERROR_SDK_COMPONENT_MISSING
                && flags.contains(D3D11_CREATE_DEVICE_DEBUG) =>
        {
            log::warn!("D3D11 debug layer is not installed, continuing without it");
            try_create(driver, flags & !D3D11_CREATE_DEVICE_DEBUG, swap_chain_desc)
        }
        result => result,
    }
}

fn create_render_target(
    device: &ID3D11Device,
    swap_chain: &IDXGISwapChain,
) -> Result<ID3D11RenderTargetView, AppError> {
    let back_buffer: ID3D11Texture2D = unsafe { swap_chain.GetBuffer(0) }?;

    let mut render_target_view = None;
    unsafe { device.CreateRenderTargetView(&back_buffer, None, Some(&mut render_target_view)) }?;

    render_target_view.ok_or_else(|| AppError::Texture("no render target view for the back buffer".into()))
}

fn full_viewport(width: u32, height: u32) -> D3D11_VIEWPORT {
    D3D11_VIEWPORT {
        TopLeftX: 0.0,
        TopLeftY: 0.0,
        Width: width as f32,
        Height: height as f32,
        MinDepth: 0.0,
        MaxDepth: 1.0,
    }
}

/// Device, immediate context, swap chain and back-buffer view.
///
/// Fields drop top to bottom, the reverse of creation order.
pub struct Direct3D {
    render_target_view: Option<ID3D11RenderTargetView>,
    swap_chain: IDXGISwapChain,
    context: ID3D11DeviceContext,
    device: ID3D11Device,
    driver: DriverKind,
    feature_level: D3D_FEATURE_LEVEL,
    viewport: D3D11_VIEWPORT,
    size: (u32, u32),
    sync_interval: u32,
}

impl Direct3D {
    pub fn new(
        hwnd: HWND,
        client_size: (u32, u32),
        config: &AppConfig,
        command_line: &CommandLine,
    ) -> Result<Self, AppError> {
        let (width, height) = if client_size.0 == 0 || client_size.1 == 0 {
            (config.client_width, config.client_height)
        } else {
            client_size
        };

        let mut flags = D3D11_CREATE_DEVICE_FLAG(0);
        if cfg!(debug_assertions) && config.debug_layer {
            flags |= D3D11_CREATE_DEVICE_DEBUG;
        }

        let swap_chain_desc = DXGI_SWAP_CHAIN_DESC {
            BufferDesc: DXGI_MODE_DESC {
                Width: width,
                Height: height,
                RefreshRate: DXGI_RATIONAL {
                    Numerator: 60,
                    Denominator: 1,
                },
                Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                ..Default::default()
            },
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: 1,
            OutputWindow: hwnd,
            Windowed: true.into(),
            SwapEffect: DXGI_SWAP_EFFECT_DISCARD,
            // Alt-Enter fullscreen.
            Flags: DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH.0 as u32,
        };

        let candidates = driver_candidates(command_line);
        let (driver, created) = match create_with_fallback(&candidates, |driver| {
            create_device_and_swap_chain(driver, flags, &swap_chain_desc)
        }) {
            Some(Ok(created)) => created,
            Some(Err(e)) => {
                log::error!("FAILED TO CREATE DEVICE AND SWAP CHAIN");
                return Err(AppError::DeviceCreation(e.to_string()));
            }
            None => {
                log::error!("FAILED TO CREATE DEVICE AND SWAP CHAIN");
                return Err(AppError::DeviceCreation("no driver types to try".into()));
            }
        };

        log::info!(
            "created {driver} device, feature level {:#x}, {width}x{height} back buffer",
            created.feature_level.0
        );

        let render_target_view = create_render_target(&created.device, &created.swap_chain)?;

        let mut direct3d = Self {
            render_target_view: Some(render_target_view),
            swap_chain: created.swap_chain,
            context: created.context,
            device: created.device,
            driver,
            feature_level: created.feature_level,
            viewport: full_viewport(width, height),
            size: (width, height),
            sync_interval: u32::from(config.vsync),
        };
        direct3d.bind_output();

        Ok(direct3d)
    }

    fn bind_output(&mut self) {
        unsafe {
            self.context
                .OMSetRenderTargets(Some(&[self.render_target_view.clone()]), None);
            self.context.RSSetViewports(Some(&[self.viewport]));
        }
    }

    pub fn device(&self) -> &ID3D11Device {
        &self.device
    }

    pub fn context(&self) -> &ID3D11DeviceContext {
        &self.context
    }

    pub fn driver(&self) -> DriverKind {
        self.driver
    }

    pub fn feature_level(&self) -> D3D_FEATURE_LEVEL {
        self.feature_level
    }

    pub fn viewport(&self) -> &D3D11_VIEWPORT {
        &self.viewport
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Resizes the back buffer to a new client area. Returns `false` when
    /// nothing had to change.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool, AppError> {
        let Some((width, height)) = resize_target(self.size, (width, height)) else {
            return Ok(false);
        };

        // Every reference to the back buffer must be gone before resizing.
        unsafe { self.context.OMSetRenderTargets(None, None) };
        self.render_target_view = None;

        unsafe {
            self.swap_chain.ResizeBuffers(
                0,
                width,
                height,
                DXGI_FORMAT_UNKNOWN,
                DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH,
            )
        }?;

        self.render_target_view = Some(create_render_target(&self.device, &self.swap_chain)?);
        self.viewport = full_viewport(width, height);
        self.size = (width, height);
        self.bind_output();

        log::debug!("resized back buffer to {width}x{height}");
        Ok(true)
    }

    pub fn clear(&self, color: Color) {
        if let Some(render_target_view) = &self.render_target_view {
            unsafe {
                self.context
                    .ClearRenderTargetView(render_target_view, &color.0);
            }
        }
    }

    pub fn present(&self) -> windows::core::Result<()> {
        unsafe { self.swap_chain.Present(self.sync_interval, DXGI_PRESENT(0)) }.ok()
    }
}

impl Drop for Direct3D {
    fn drop(&mut self) {
        unsafe {
            self.context.ClearState();
            // A swap chain must not be released while fullscreen.
            let _ = self.swap_chain.SetFullscreenState(false, None);
        }
    }
}
