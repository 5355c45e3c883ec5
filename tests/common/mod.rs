#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use cache_fanout::BulkListener;
use cache_fanout::Cacheable;
use cache_fanout::EntityId;
use cache_fanout::ListenerResult;
use cache_fanout::SingleListener;
use parking_lot::Mutex;

pub const WAIT_FOR_DELIVERY: Duration = Duration::from_secs(3);

pub fn enable_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Supervised equipment as a cache would hold it
#[derive(Debug, Clone, PartialEq)]
pub struct Equipment {
    pub id: EntityId,
    pub name: String,
    pub alive: bool,
    pub version: u64,
}

impl Equipment {
    pub fn new(
        id: EntityId,
        version: u64,
    ) -> Self {
        Self {
            id,
            name: format!("E_{id}"),
            alive: true,
            version,
        }
    }
}

impl Cacheable for Equipment {
    fn id(&self) -> EntityId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Updated(EntityId, u64),
    Confirmed(EntityId),
}

/// Module consuming equipment events one at a time
#[derive(Default)]
pub struct EquipmentMonitor {
    pub events: Mutex<Vec<Event>>,
}

impl EquipmentMonitor {
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }
}

impl SingleListener<Equipment> for EquipmentMonitor {
    fn notify_element_updated(
        &self,
        entity: &Equipment,
    ) -> ListenerResult {
        self.events.lock().push(Event::Updated(entity.id, entity.version));
        Ok(())
    }

    fn confirm_status(
        &self,
        entity: &Equipment,
    ) -> ListenerResult {
        self.events.lock().push(Event::Confirmed(entity.id));
        Ok(())
    }
}

/// Module persisting batches of entity ids
#[derive(Default)]
pub struct BatchWriter {
    pub updated: Mutex<Vec<Vec<EntityId>>>,
    pub confirmed: Mutex<Vec<Vec<EntityId>>>,
}

impl BulkListener<EntityId> for BatchWriter {
    fn notify_elements_updated(
        &self,
        batch: &[EntityId],
    ) -> ListenerResult {
        self.updated.lock().push(batch.to_vec());
        Ok(())
    }

    fn confirm_statuses(
        &self,
        batch: &[EntityId],
    ) -> ListenerResult {
        self.confirmed.lock().push(batch.to_vec());
        Ok(())
    }
}

pub fn wait_for<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + WAIT_FOR_DELIVERY;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
