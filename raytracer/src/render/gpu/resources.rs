use std::sync::Arc;
use winit::window::Window;

use crate::render::RenderError;

/// The device context every stage runs against: one adapter, one logical
/// device, one in-order queue. The surface is absent for headless contexts.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: Option<wgpu::Surface<'static>>,
    pub surface_config: Option<wgpu::SurfaceConfiguration>,
}

impl GpuContext {
    /// Context bound to a window surface.
    pub async fn new(window: Arc<Window>, width: u32, height: u32) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .map_err(|err| RenderError::DeviceRequest(err.to_string()))?;

        let (adapter, device, queue) = Self::request_device(&instance, Some(&surface)).await?;

        let surface_config = surface
            .get_default_config(&adapter, width.max(1), height.max(1))
            .ok_or(RenderError::NoAdapter)?;
        surface.configure(&device, &surface_config);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface: Some(surface),
            surface_config: Some(surface_config),
        })
    }

    /// Context without a presentation surface, for offscreen rendering and
    /// tests.
    pub async fn headless() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::default();
        let (adapter, device, queue) = Self::request_device(&instance, None).await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface: None,
            surface_config: None,
        })
    }

    async fn request_device(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'static>>,
    ) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), RenderError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: surface,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        log::info!("compute device: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Tracer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|err| RenderError::DeviceRequest(err.to_string()))?;

        Ok((adapter, device, queue))
    }

    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.surface_config.as_ref().map(|config| config.format)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if let (Some(surface), Some(config)) = (&self.surface, &mut self.surface_config) {
            config.width = width.max(1);
            config.height = height.max(1);
            surface.configure(&self.device, config);
        }
    }
}
