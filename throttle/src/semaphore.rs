use std::sync::Arc;

#[derive(Debug)]
pub struct Semaphore {
    enabled: bool,
    capacity: usize,
    sem: Arc<tokio::sync::Semaphore>,
}

impl Semaphore {
    pub fn new(value: usize) -> Self {
        let sem = if value == 0 {
            tokio::sync::Semaphore::new(tokio::sync::Semaphore::MAX_PERMITS)
        } else {
            tokio::sync::Semaphore::new(value)
        };
        Self {
            enabled: value > 0,
            capacity: value,
            sem: Arc::new(sem),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.sem.available_permits()
    }

    pub async fn acquire(&self) -> Option<tokio::sync::OwnedSemaphorePermit> {
        if !self.enabled {
            return None;
        }
        // the semaphore is owned here and never closed
        Some(
            self.sem
                .clone()
                .acquire_owned()
                .await
                .expect("transfer semaphore closed"),
        )
    }

    pub fn try_acquire(&self) -> Option<Option<tokio::sync::OwnedSemaphorePermit>> {
        if !self.enabled {
            return Some(None);
        }
        self.sem.clone().try_acquire_owned().ok().map(Some)
    }
}
