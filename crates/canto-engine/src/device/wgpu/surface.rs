use crate::device::{PresentInterval, PresentResult};
use crate::error::DeviceError;

pub(crate) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if caps.formats.is_empty() {
        return None;
    }

    let preferred: &[wgpu::TextureFormat] = if prefer_srgb {
        &[wgpu::TextureFormat::Bgra8UnormSrgb, wgpu::TextureFormat::Rgba8UnormSrgb]
    } else {
        &[wgpu::TextureFormat::Bgra8Unorm, wgpu::TextureFormat::Rgba8Unorm]
    };
    for f in preferred {
        if caps.formats.contains(f) {
            return Some(*f);
        }
    }

    Some(caps.formats[0])
}

pub(crate) fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

/// Vsync uses the configured mode; immediate presentation falls back to
/// mailbox, then to the configured mode.
pub(crate) fn choose_present_mode(
    caps: &wgpu::SurfaceCapabilities,
    interval: PresentInterval,
    vsync_mode: wgpu::PresentMode,
) -> wgpu::PresentMode {
    match interval {
        PresentInterval::Default => vsync_mode,
        PresentInterval::Immediate => [wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
            .into_iter()
            .find(|m| caps.present_modes.contains(m))
            .unwrap_or(vsync_mode),
    }
}

/// True when read-back pixels must have red and blue swapped to be BGRA.
pub(crate) fn is_rgba_order(format: wgpu::TextureFormat) -> bool {
    matches!(format, wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb)
}

/// Maps a failed frame acquisition to the result the next present reports
/// and the error the current call returns.
pub(crate) fn map_surface_error(err: wgpu::SurfaceError) -> (PresentResult, DeviceError) {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            (PresentResult::NeedsReset, DeviceError::Lost)
        }
        wgpu::SurfaceError::OutOfMemory => (PresentResult::Fatal, DeviceError::OutOfMemory),
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => {
            (PresentResult::Failed, DeviceError::call("acquire frame", err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_surface_needs_reset() {
        let (result, _) = map_surface_error(wgpu::SurfaceError::Outdated);
        assert_eq!(result, PresentResult::NeedsReset);
        let (result, _) = map_surface_error(wgpu::SurfaceError::Timeout);
        assert_eq!(result, PresentResult::Failed);
        let (result, _) = map_surface_error(wgpu::SurfaceError::OutOfMemory);
        assert_eq!(result, PresentResult::Fatal);
    }

    #[test]
    fn rgba_formats_need_swap() {
        assert!(is_rgba_order(wgpu::TextureFormat::Rgba8Unorm));
        assert!(!is_rgba_order(wgpu::TextureFormat::Bgra8Unorm));
    }
}
