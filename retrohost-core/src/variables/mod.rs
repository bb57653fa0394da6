//! Core options ("variables") exchanged through the environment channel.
//!
//! A core declares its options with `SET_VARIABLES` as `key` + descriptor pairs, where the
//! descriptor reads `"<description>; <choice1>|<choice2>|...|<choiceN>"`. The first choice is
//! the core's default. The core later asks for the current value with `GET_VARIABLE`, and polls
//! `GET_VARIABLE_UPDATE` to learn whether the frontend changed anything.

use std::collections::BTreeMap;

const DESCRIPTION_SEPARATOR: &str = "; ";
const CHOICE_SEPARATOR: char = '|';

/// A single core option.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Variable {
    key: String,
    /// Empty means unset.
    value: String,
    description: String,
    choices: Vec<String>,
}

impl Variable {
    /// Parse a descriptor for `key`.
    ///
    /// Malformed descriptors still produce a variable so the key stays queryable; it just has
    /// no description and no choices.
    pub fn parse(key: &str, descriptor: &str) -> Self {
        let mut var = Variable {
            key: key.to_owned(),
            ..Default::default()
        };

        let Some((description, choices)) = descriptor.split_once(DESCRIPTION_SEPARATOR) else {
            log::warn!("core option {key:?} has a malformed descriptor: {descriptor:?}");
            return var;
        };

        var.description = description.to_owned();
        if choices.is_empty() {
            log::warn!("core option {key:?} declares no choices");
            return var;
        }

        var.choices = choices.split(CHOICE_SEPARATOR).map(str::to_owned).collect();
        if var.choices.iter().any(String::is_empty) {
            log::warn!("core option {key:?} declares an empty choice: {choices:?}");
        }
        var
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current value, or `default` when unset.
    pub fn value_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.value.is_empty() {
            default
        } else {
            &self.value
        }
    }

    /// Current value, or `""` when unset.
    pub fn value(&self) -> &str {
        self.value_or("")
    }

    /// Current value, falling back to the core's default (its first choice).
    pub fn effective_value(&self) -> &str {
        self.value_or(self.default_choice().unwrap_or(""))
    }

    pub fn default_choice(&self) -> Option<&str> {
        self.choices.first().map(String::as_str)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    /// A variable is valid as long as it has a key.
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty()
    }

    /// Whether the descriptor parsed into a description and a non-empty choice list.
    pub fn is_well_formed(&self) -> bool {
        !self.choices.is_empty()
    }
}

/// Why a value could not be assigned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    #[error("unknown core option {0:?}")]
    UnknownKey(String),

    #[error("{value:?} is not a valid choice for core option {key:?}")]
    InvalidChoice { key: String, value: String },
}

/// All options a core declared, keyed by option key.
#[derive(Clone, Debug, Default)]
pub struct VariableStore {
    vars: BTreeMap<String, Variable>,
    /// Set when the frontend changes a value; cleared when the core asks.
    updated: bool,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the declared option set.
    ///
    /// Values the frontend already chose survive re-declaration when still valid. A key
    /// declared twice keeps its first declaration.
    pub fn declare<'a>(&mut self, declarations: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let mut previous = std::mem::take(&mut self.vars);

        for (key, descriptor) in declarations {
            if self.vars.contains_key(key) {
                log::warn!("core option {key:?} declared twice; keeping the first declaration");
                continue;
            }

            let mut var = Variable::parse(key, descriptor);
            if let Some(old) = previous.remove(key) {
                if !old.value.is_empty() && var.accepts(&old.value) {
                    var.value = old.value;
                }
            }
            log::debug!(
                "core option {key:?} = {:?} (choices: {:?})",
                var.effective_value(),
                var.choices
            );
            self.vars.insert(key.to_owned(), var);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Variable> {
        self.vars.get(key)
    }

    /// Assign `value` to `key` and flag the change for the core.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), VariableError> {
        let var = self
            .vars
            .get_mut(key)
            .ok_or_else(|| VariableError::UnknownKey(key.to_owned()))?;

        if !var.accepts(value) {
            return Err(VariableError::InvalidChoice {
                key: key.to_owned(),
                value: value.to_owned(),
            });
        }

        if var.value != value {
            var.value = value.to_owned();
            self.updated = true;
        }
        Ok(())
    }

    /// Whether anything changed since the last call; clears the flag.
    pub fn take_updated(&mut self) -> bool {
        std::mem::take(&mut self.updated)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
        self.updated = false;
    }
}

impl Variable {
    // Malformed options accept anything, since there is no list to check against.
    fn accepts(&self, value: &str) -> bool {
        !self.is_well_formed() || self.choices.iter().any(|c| c == value)
    }
}
