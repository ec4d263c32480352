use contracts::domain::a025_return_request::aggregate::ReturnRequestId;
use contracts::projections::p910_return_lifecycle::dto::LifecycleStage;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Максимальная стадия, которую уже видели по каждой заявке.
///
/// Источники обновляются асинхронно, и устаревшее чтение не должно
/// откатывать отображаемую стадию назад.
#[derive(Default)]
pub struct LifecycleLedger {
    high_water: Mutex<HashMap<ReturnRequestId, LifecycleStage>>,
}

impl LifecycleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Учесть прочитанную стадию. Возвращает итоговую стадию и признак,
    /// что она поднята до ранее наблюдавшейся.
    pub fn observe(&self, id: &ReturnRequestId, derived: LifecycleStage) -> (LifecycleStage, bool) {
        let mut high_water = self
            .high_water
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = high_water.entry(id.clone()).or_insert(derived);
        if derived > *entry {
            *entry = derived;
        }
        let stage = *entry;
        (stage, stage > derived)
    }

    /// Забыть заявку, которая больше не меняется
    pub fn forget(&self, id: &ReturnRequestId) {
        self.high_water
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn len(&self) -> usize {
        self.high_water
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn high_water(&self, id: &ReturnRequestId) -> Option<LifecycleStage> {
        self.high_water
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
    }
}
