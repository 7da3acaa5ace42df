use std::collections::VecDeque;

use bevy::prelude::*;

use crate::config::DESTRUCTION_BATCH;

/// FIFO of work items handed out a bounded batch at a time, so large jobs spread
/// over several frames instead of stalling one.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: VecDeque<T>,
    batch: usize,
}

impl<T> WorkQueue<T> {
    pub fn new(batch: usize) -> Self {
        Self { items: VecDeque::new(), batch: batch.max(1) }
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
    }

    /// Takes at most one batch off the front.
    pub fn next_batch(&mut self) -> Vec<T> {
        let take = self.batch.min(self.items.len());
        self.items.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Entities retired at phase changes, despawned a batch per frame.
#[derive(Resource, Debug)]
pub struct DespawnQueue(pub WorkQueue<Entity>);

impl Default for DespawnQueue {
    fn default() -> Self {
        Self(WorkQueue::new(DESTRUCTION_BATCH))
    }
}

pub struct TaskPlugin;

impl Plugin for TaskPlugin {
    fn build(&self, app: &mut App) {
        app
            .init_resource::<DespawnQueue>()
            .add_systems(Update, run_despawn_queue);
    }
}

fn run_despawn_queue(
    mut commands: Commands,
    mut queue: ResMut<DespawnQueue>,
) {
    if queue.0.is_empty() {
        return;
    }
    for entity in queue.0.next_batch() {
        // the same entity may have been queued twice
        commands.entity(entity).try_despawn();
    }
    if queue.0.is_empty() {
        debug!("Despawn queue drained");
    }
}
