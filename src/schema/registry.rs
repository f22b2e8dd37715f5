//! Named commands referenced by schemas.

use crate::payload::Payload;
use crate::process::Command;
use std::collections::HashMap;
use std::fmt;

/// Maps the command names used in schema documents to the commands they
/// stand for.
pub struct CommandRegistry<S> {
    commands: HashMap<String, Command<S>>,
}

impl<S> Default for CommandRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> CommandRegistry<S> {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Register a command, replacing any earlier one of the same name.
    pub fn register(&mut self, name: impl Into<String>, command: Command<S>) {
        let name = name.into();
        let command = command.named(name.clone());
        self.commands.insert(name, command);
    }

    /// Builder-style registration of an infallible closure.
    pub fn with<F>(mut self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&mut Payload<S>) -> bool + Send + Sync + 'static,
    {
        self.register(name, Command::new(run));
        self
    }

    pub fn get(&self, name: &str) -> Option<Command<S>> {
        self.commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }
}

impl<S> fmt::Debug for CommandRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CommandRegistry")
            .field("commands", &names)
            .finish()
    }
}
