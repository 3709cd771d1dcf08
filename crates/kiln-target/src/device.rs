//! Device types and the live-device attribute query seam.
//!
//! A target carrying `-from_device=<id>` fills attributes it does not set
//! explicitly from the [`DeviceApi`] registered for its device type.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::value::Value;

/// Device type codes, matching the DLPack numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Cpu,
    Cuda,
    CudaHost,
    OpenCL,
    Vulkan,
    Metal,
    Vpi,
    Rocm,
    ExtDev,
    WebGpu,
    Hexagon,
}

impl DeviceType {
    /// Numeric device type code.
    pub fn code(self) -> i32 {
        match self {
            DeviceType::Cpu => 1,
            DeviceType::Cuda => 2,
            DeviceType::CudaHost => 3,
            DeviceType::OpenCL => 4,
            DeviceType::Vulkan => 7,
            DeviceType::Metal => 8,
            DeviceType::Vpi => 9,
            DeviceType::Rocm => 10,
            DeviceType::ExtDev => 12,
            DeviceType::WebGpu => 15,
            DeviceType::Hexagon => 16,
        }
    }

    /// Look up a device type by its numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        [
            DeviceType::Cpu,
            DeviceType::Cuda,
            DeviceType::CudaHost,
            DeviceType::OpenCL,
            DeviceType::Vulkan,
            DeviceType::Metal,
            DeviceType::Vpi,
            DeviceType::Rocm,
            DeviceType::ExtDev,
            DeviceType::WebGpu,
            DeviceType::Hexagon,
        ]
        .into_iter()
        .find(|d| d.code() == code)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Cpu => "cpu",
            DeviceType::Cuda => "cuda",
            DeviceType::CudaHost => "cuda_host",
            DeviceType::OpenCL => "opencl",
            DeviceType::Vulkan => "vulkan",
            DeviceType::Metal => "metal",
            DeviceType::Vpi => "vpi",
            DeviceType::Rocm => "rocm",
            DeviceType::ExtDev => "ext_dev",
            DeviceType::WebGpu => "webgpu",
            DeviceType::Hexagon => "hexagon",
        };
        write!(f, "{name}")
    }
}

/// Live hardware attribute queries for one device type.
pub trait DeviceApi: Send + Sync {
    /// Whether a device with this id is present.
    fn exists(&self, device_id: i64) -> bool;

    /// The device's value for a target attribute, if it reports one.
    fn target_property(&self, device_id: i64, key: &str) -> Option<Value>;
}

type ApiTable = RwLock<HashMap<i32, Arc<dyn DeviceApi>>>;

fn apis() -> &'static ApiTable {
    static APIS: OnceLock<ApiTable> = OnceLock::new();
    APIS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register the API serving `device_type`, returning the one it replaces.
pub fn register_device_api(
    device_type: i32,
    api: Arc<dyn DeviceApi>,
) -> Option<Arc<dyn DeviceApi>> {
    apis()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(device_type, api)
}

/// Remove the API serving `device_type`.
pub fn unregister_device_api(device_type: i32) -> Option<Arc<dyn DeviceApi>> {
    apis()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&device_type)
}

/// The API serving `device_type`, if one is registered.
pub fn device_api(device_type: i32) -> Option<Arc<dyn DeviceApi>> {
    apis()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&device_type)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl DeviceApi for Fixed {
        fn exists(&self, device_id: i64) -> bool {
            device_id == 0
        }

        fn target_property(&self, _device_id: i64, key: &str) -> Option<Value> {
            (key == "max_num_threads").then_some(Value::Int(512))
        }
    }

    #[test]
    fn code_round_trip() {
        for code in [1, 2, 4, 7, 8, 10, 12, 15, 16] {
            assert_eq!(DeviceType::from_code(code).unwrap().code(), code);
        }
        assert!(DeviceType::from_code(5).is_none());
        assert_eq!(DeviceType::Rocm.to_string(), "rocm");
    }

    #[test]
    fn register_and_lookup() {
        // 900 is not a real device type code; keeps this test isolated.
        assert!(device_api(900).is_none());
        register_device_api(900, Arc::new(Fixed));
        let api = device_api(900).unwrap();
        assert!(api.exists(0));
        assert_eq!(api.target_property(0, "max_num_threads"), Some(Value::Int(512)));
        assert!(unregister_device_api(900).is_some());
        assert!(device_api(900).is_none());
    }
}
