mod key_queue;
mod key_record;

pub use key_queue::{KeyQueue, KeyQueueTrait};
pub use key_record::{KeyRecordRepository, KeyRecordRepositoryTrait};

#[cfg(test)]
pub use key_queue::MockKeyQueueTrait;
#[cfg(test)]
pub use key_record::MockKeyRecordRepositoryTrait;
