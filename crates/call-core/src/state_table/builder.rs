use super::types::{CallState, EventType, MasterStateTable, StateKey, Transition};

/// Incremental construction of the [`MasterStateTable`]
pub struct StateTableBuilder {
    table: MasterStateTable,
}

impl StateTableBuilder {
    pub fn new() -> Self {
        Self { table: MasterStateTable::new() }
    }

    pub fn add_transition(&mut self, state: CallState, event: EventType, transition: Transition) -> &mut Self {
        self.table.insert(StateKey::new(state, event), transition);
        self
    }

    /// Same transition registered for several states
    pub fn add_for_states(&mut self, states: &[CallState], event: EventType, transition: Transition) -> &mut Self {
        for state in states {
            self.table.insert(StateKey::new(*state, event), transition.clone());
        }
        self
    }

    /// Accept the event and do nothing
    pub fn add_no_op(&mut self, state: CallState, event: EventType) -> &mut Self {
        self.add_transition(state, event, Transition::default())
    }

    pub fn add_wildcard(&mut self, event: EventType, transition: Transition) -> &mut Self {
        self.table.insert_wildcard(event, transition);
        self
    }

    pub fn build(self) -> MasterStateTable {
        self.table
    }
}

impl Default for StateTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
