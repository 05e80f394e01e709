//! Form model driven purely by inbound agent events.

use std::collections::BTreeMap;

use shared::{domain::FieldSpec, protocol::InboundEvent};
use tracing::debug;

pub type FieldValues = BTreeMap<String, String>;

/// What to do with an `update_field` naming a field the open form does not
/// declare (or arriving while no form is open).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFieldPolicy {
    /// Keep the value anyway. This is what the agent backend has always
    /// relied on.
    #[default]
    Store,
    Ignore,
    /// Drop the value and report it to subscribers.
    Reject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDefinition {
    fields: Vec<FieldSpec>,
}

impl FormDefinition {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    definition: Option<FormDefinition>,
    values: FieldValues,
}

impl FormState {
    pub fn definition(&self) -> Option<&FormDefinition> {
        self.definition.as_ref()
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_active(&self) -> bool {
        self.definition.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.definition.is_none() && self.values.is_empty()
    }

    /// Drops the definition and every value. Returns whether anything was
    /// actually removed.
    pub(crate) fn clear(&mut self) -> bool {
        let changed = !self.is_empty();
        self.definition = None;
        self.values.clear();
        changed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
    Rejected { field_name: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormStateReducer {
    policy: UnknownFieldPolicy,
}

impl FormStateReducer {
    pub fn new(policy: UnknownFieldPolicy) -> Self {
        Self { policy }
    }

    /// Returns the state after `event` without touching `state`.
    pub fn reduce(&self, state: &FormState, event: &InboundEvent) -> FormState {
        let mut next = state.clone();
        self.apply(&mut next, event);
        next
    }

    pub fn apply(&self, state: &mut FormState, event: &InboundEvent) -> Applied {
        match event {
            InboundEvent::OpenForm { fields } => {
                let definition = FormDefinition::new(fields.clone());
                if state.definition.as_ref() == Some(&definition) && state.values.is_empty() {
                    return Applied::Unchanged;
                }
                state.definition = Some(definition);
                state.values.clear();
                Applied::Changed
            }
            InboundEvent::UpdateField {
                field_name,
                field_value,
            } => {
                let declared = state
                    .definition
                    .as_ref()
                    .is_some_and(|definition| definition.contains(field_name));
                if !declared {
                    match self.policy {
                        UnknownFieldPolicy::Store => {}
                        UnknownFieldPolicy::Ignore => {
                            debug!(
                                field_name = %field_name,
                                "form: ignoring update for undeclared field"
                            );
                            return Applied::Unchanged;
                        }
                        UnknownFieldPolicy::Reject => {
                            return Applied::Rejected {
                                field_name: field_name.clone(),
                            };
                        }
                    }
                }
                if state.value(field_name) == Some(field_value.as_str()) {
                    return Applied::Unchanged;
                }
                state
                    .values
                    .insert(field_name.clone(), field_value.clone());
                Applied::Changed
            }
            InboundEvent::SubmitForm {} => {
                if state.clear() {
                    Applied::Changed
                } else {
                    Applied::Unchanged
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
