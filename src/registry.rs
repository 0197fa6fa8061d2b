// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::devices::device::Device;

#[derive(Default)]
struct Inner {
    order: Vec<Arc<Device>>,
    by_id: HashMap<String, Arc<Device>>,
}

/// Every device discovered during the client's lifetime, keyed by full
/// device id and kept in discovery order. Devices are never removed.
#[derive(Default)]
pub struct DeviceRegistry {
    inner: RwLock<Inner>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn find(&self, device_id: &str) -> Option<Arc<Device>> {
        self.inner.read().await.by_id.get(device_id).cloned()
    }

    /// Insert `candidate` unless a device with the same id is already known.
    ///
    /// Returns the registered device and whether it was newly inserted. When
    /// the id is known the existing entry is returned unchanged.
    pub async fn register_if_absent(&self, candidate: Device) -> (Arc<Device>, bool) {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.by_id.get(candidate.device_id()) {
            return (existing.clone(), false);
        }
        let device = Arc::new(candidate);
        inner
            .by_id
            .insert(device.device_id().to_string(), device.clone());
        inner.order.push(device.clone());
        (device, true)
    }

    /// Point-in-time copy of all devices in discovery order.
    pub async fn snapshot(&self) -> Vec<Arc<Device>> {
        self.inner.read().await.order.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::device::tests::announcement;
    use std::time::Duration;

    fn device(id: &str, name: &str) -> Device {
        let mut ann = announcement(id);
        ann.device_name = name.to_string();
        Device::from_announcement(ann, "0000".to_string(), 5555, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_register_once() {
        let registry = DeviceRegistry::new();
        assert!(registry.is_empty().await);

        let (first, was_new) = registry.register_if_absent(device("aaaa", "Desk")).await;
        assert!(was_new);
        let (second, was_new) = registry.register_if_absent(device("aaaa", "Renamed")).await;
        assert!(!was_new);
        assert!(Arc::ptr_eq(&first, &second));
        // First registration wins
        assert_eq!(second.device_name(), "Desk");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_in_discovery_order() {
        let registry = DeviceRegistry::new();
        for id in ["cccc", "aaaa", "bbbb"] {
            registry.register_if_absent(device(id, id)).await;
        }
        let ids: Vec<String> = registry
            .snapshot()
            .await
            .iter()
            .map(|d| d.device_id().to_string())
            .collect();
        assert_eq!(ids, vec!["cccc", "aaaa", "bbbb"]);

        assert!(registry.find("bbbb").await.is_some());
        assert!(registry.find("dddd").await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration() {
        let registry = Arc::new(DeviceRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.register_if_absent(device("aaaa", "Desk")).await.1
            }));
        }
        let mut new_count = 0;
        for handle in handles {
            if handle.await.unwrap() {
                new_count += 1;
            }
        }
        assert_eq!(new_count, 1);
        assert_eq!(registry.len().await, 1);
    }
}
