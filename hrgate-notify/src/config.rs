// SPDX-License-Identifier: MIT OR Apache-2.0

/// The default number of events buffered per entity type.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub struct NotifierConfig {
    /// Events buffered per entity type before slow subscribers start lagging.
    pub capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}
