use windows::{
    core::PCSTR,
    Win32::Graphics::Direct3D::{
        Fxc::{
            D3DCompile, D3DCOMPILE_DEBUG, D3DCOMPILE_ENABLE_STRICTNESS,
            D3DCOMPILE_OPTIMIZATION_LEVEL3, D3DCOMPILE_SKIP_OPTIMIZATION,
        },
        ID3DBlob,
    },
};

use crate::error::AppError;

pub fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    // The slice lives as long as the blob does.
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer().cast::<u8>(), blob.GetBufferSize()) }
}

/// Compiles HLSL source for one entry point, e.g. `vs_4_0_level_9_3`.
pub fn compile_shader(source: &str, entry_point: PCSTR, target: PCSTR) -> Result<ID3DBlob, AppError> {
    let flags = if cfg!(debug_assertions) {
        D3DCOMPILE_ENABLE_STRICTNESS | D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION
    } else {
        D3DCOMPILE_ENABLE_STRICTNESS | D3DCOMPILE_OPTIMIZATION_LEVEL3
    };

    let mut code = None;
    let mut errors = None;
    let result = unsafe {
        D3DCompile(
            source.as_ptr().cast(),
            source.len(),
            None,
            None,
            None,
            entry_point,
            target,
            flags,
            0,
            &mut code,
            Some(&mut errors),
        )
    };

    let message = errors
        .as_ref()
        .map(|blob| String::from_utf8_lossy(blob_bytes(blob)).trim_end_matches('\0').to_string());

    if let Err(e) = result {
        return Err(AppError::Shader(message.unwrap_or_else(|| e.to_string())));
    }
    if let Some(warnings) = message.filter(|m| !m.trim().is_empty()) {
        log::warn!("shader compiler: {warnings}");
    }

    code.ok_or_else(|| AppError::Shader("compiler returned no bytecode".into()))
}
