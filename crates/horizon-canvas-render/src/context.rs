//! Graphics context owning the GPU device.
//!
//! A [`GraphicsContext`] owns the wgpu instance, adapter, device and queue.
//! There is no process-wide instance: the editor creates one, hands it to a
//! [`GpuCompositor`](crate::GpuCompositor) and drops it when done. Cloning
//! is cheap and shares the same device.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{RenderError, RenderResult};

/// Configuration options for graphics context initialization.
#[derive(Debug, Clone)]
pub struct GraphicsConfig {
    /// Preferred GPU backends to use.
    pub backends: wgpu::Backends,
    /// Power preference for adapter selection.
    pub power_preference: wgpu::PowerPreference,
    /// Select the software (fallback) adapter even when hardware is present.
    pub force_fallback_adapter: bool,
    /// Required device limits.
    pub required_limits: wgpu::Limits,
    /// Enable debug validation layers.
    pub debug_validation: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::PRIMARY,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_limits: wgpu::Limits::downlevel_defaults(),
            debug_validation: cfg!(debug_assertions),
        }
    }
}

impl GraphicsConfig {
    /// Set the backends to try.
    pub fn with_backends(mut self, backends: wgpu::Backends) -> Self {
        self.backends = backends;
        self
    }

    /// Set the adapter power preference.
    pub fn with_power_preference(mut self, power_preference: wgpu::PowerPreference) -> Self {
        self.power_preference = power_preference;
        self
    }

    /// Force the software adapter. Useful for reproducible CI runs.
    pub fn with_force_fallback_adapter(mut self, force: bool) -> Self {
        self.force_fallback_adapter = force;
        self
    }
}

/// GPU handles shared by clones of a [`GraphicsContext`].
#[derive(Debug)]
struct GpuResources {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

/// A headless GPU device and queue.
///
/// # Example
///
/// ```no_run
/// use horizon_canvas_render::{GraphicsConfig, GraphicsContext};
///
/// match GraphicsContext::new(GraphicsConfig::default()) {
///     Ok(ctx) => println!("Using GPU: {}", ctx.adapter_info().name),
///     Err(err) => println!("GPU unavailable, compositing on the CPU: {err}"),
/// }
/// ```
#[derive(Clone)]
pub struct GraphicsContext {
    resources: Arc<GpuResources>,
    config: GraphicsConfig,
}

impl GraphicsContext {
    /// Acquire an adapter and device.
    ///
    /// # Errors
    ///
    /// Returns an error if no suitable adapter was found or the device
    /// request failed. Both are expected on machines without a GPU, and
    /// when `config.backends` is empty.
    pub fn new(config: GraphicsConfig) -> RenderResult<Self> {
        if config.backends.is_empty() {
            return Err(RenderError::NoAdapter);
        }

        let instance_flags = if config.debug_validation {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::empty()
        };

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backends,
            flags: instance_flags,
            ..Default::default()
        });

        debug!(
            target: "horizon_canvas_render::context",
            backends = ?config.backends,
            "created wgpu instance"
        );

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            compatible_surface: None,
            force_fallback_adapter: config.force_fallback_adapter,
        }))
        .ok_or(RenderError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        info!(
            target: "horizon_canvas_render::context",
            name = adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected graphics adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("horizon-canvas-device"),
                required_features: wgpu::Features::empty(),
                required_limits: config.required_limits.clone().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        debug!(
            target: "horizon_canvas_render::context",
            "created graphics device and queue"
        );

        Ok(Self {
            resources: Arc::new(GpuResources {
                adapter,
                device,
                queue,
            }),
            config,
        })
    }

    /// Get the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.resources.device
    }

    /// Get the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.resources.queue
    }

    /// Get the configuration used to create this context.
    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    /// Get information about the graphics adapter.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.resources.adapter.get_info()
    }

    /// Largest texture side the device accepts.
    pub fn max_texture_dimension(&self) -> u32 {
        self.resources.device.limits().max_texture_dimension_2d
    }

    /// Check that a texture of this size can be created.
    pub fn check_dimensions(&self, width: u32, height: u32) -> RenderResult<()> {
        let max = self.max_texture_dimension();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        Ok(())
    }

    /// Block until all submitted work has finished.
    pub fn wait_idle(&self) {
        self.resources.device.poll(wgpu::Maintain::Wait);
    }
}

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let info = self.adapter_info();
        f.debug_struct("GraphicsContext")
            .field("adapter", &info.name)
            .field("backend", &info.backend)
            .field("device_type", &info.device_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphics_config_default() {
        let config = GraphicsConfig::default();
        assert_eq!(config.backends, wgpu::Backends::PRIMARY);
        assert_eq!(config.power_preference, wgpu::PowerPreference::HighPerformance);
        assert!(!config.force_fallback_adapter);
    }

    #[test]
    fn test_graphics_config_builder() {
        let config = GraphicsConfig::default()
            .with_backends(wgpu::Backends::VULKAN)
            .with_power_preference(wgpu::PowerPreference::LowPower)
            .with_force_fallback_adapter(true);
        assert_eq!(config.backends, wgpu::Backends::VULKAN);
        assert_eq!(config.power_preference, wgpu::PowerPreference::LowPower);
        assert!(config.force_fallback_adapter);
    }

    #[test]
    fn test_no_backends_is_no_adapter() {
        let config = GraphicsConfig::default().with_backends(wgpu::Backends::empty());
        let err = GraphicsContext::new(config).unwrap_err();
        assert!(matches!(err, RenderError::NoAdapter));
    }

    #[test]
    #[ignore = "requires GPU"]
    fn test_context_creation() {
        let ctx = GraphicsContext::new(GraphicsConfig::default()).unwrap();
        assert!(ctx.max_texture_dimension() >= 2048);
        assert!(ctx.check_dimensions(0, 10).is_err());
        assert!(ctx.check_dimensions(800, 500).is_ok());
    }
}
