mod key;

pub use key::{dispense_handler, generate_handler, get_by_key_handler, stats_handler};
