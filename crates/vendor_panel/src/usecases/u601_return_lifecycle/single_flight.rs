use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Не больше одной операции на ключ (возврат или заявку) одновременно.
/// Вторая попытка отклоняется сразу, без очереди.
#[derive(Default)]
pub struct SingleFlight {
    active: Arc<Mutex<HashSet<String>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, key: &str) -> Option<FlightPermit> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.to_string()) {
            return None;
        }
        Some(FlightPermit {
            key: key.to_string(),
            active: self.active.clone(),
        })
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Ключ освобождается при уничтожении, в том числе при ошибке и панике
pub struct FlightPermit {
    key: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
