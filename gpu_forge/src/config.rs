/// Device configuration

/// Backend profile a device is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Fixed-function era profile: mappable buffers, no compute targets
    Legacy,
    /// Compute-capable profile: unordered access and structured views
    Compute,
}

/// Configuration shared by the device, its context and the scheduler
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Backend profile
    pub backend: BackendKind,
    /// Adapter description reported by the device
    pub description: String,
    /// Default frame buffer width in pixels
    pub screen_width: u32,
    /// Default frame buffer height in pixels
    pub screen_height: u32,
    /// Enable backend validation (bounds and binding checks)
    pub enable_validation: bool,
    /// Reject passes binding the same buffer as SRV and UAV
    pub hazard_checks: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Compute,
            description: "GpuForge Device".to_string(),
            screen_width: 800,
            screen_height: 600,
            enable_validation: cfg!(debug_assertions),
            hazard_checks: true,
        }
    }
}

impl DeviceConfig {
    /// Default configuration for the given backend profile
    pub fn for_backend(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }
}
