// Read-only lookup from fully-qualified type name to descriptor.
// Names arriving from field references may carry one leading `.` scope
// qualifier; it is stripped before lookup.
use crate::core::descriptor::{EnumDescriptor, MessageDescriptor};
use crate::core::error::{Error, ErrorKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Strip the protobuf scope qualifier (`.pkg.Type` -> `pkg.Type`).
pub fn unqualified(type_name: &str) -> &str {
    type_name.strip_prefix('.').unwrap_or(type_name)
}

#[derive(Debug, Default)]
pub struct Registry {
    messages: HashMap<String, Arc<MessageDescriptor>>,
    enums: HashMap<String, Arc<EnumDescriptor>>,
    comments: HashMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_message(&mut self, full_name: impl Into<String>, descriptor: MessageDescriptor) {
        self.messages.insert(full_name.into(), Arc::new(descriptor));
    }

    pub fn insert_enum(&mut self, full_name: impl Into<String>, descriptor: EnumDescriptor) {
        self.enums.insert(full_name.into(), Arc::new(descriptor));
    }

    pub fn insert_comment(&mut self, full_name: impl Into<String>, comment: impl Into<String>) {
        self.comments.insert(full_name.into(), comment.into());
    }

    pub fn resolve_message(&self, type_name: &str) -> Result<Arc<MessageDescriptor>, Error> {
        let name = unqualified(type_name);
        self.messages.get(name).cloned().ok_or_else(|| {
            Error::new(ErrorKind::UnknownDescriptor)
                .with_message("no message descriptor registered")
                .with_type_name(name)
        })
    }

    pub fn resolve_enum(&self, type_name: &str) -> Result<Arc<EnumDescriptor>, Error> {
        let name = unqualified(type_name);
        self.enums.get(name).cloned().ok_or_else(|| {
            Error::new(ErrorKind::UnknownDescriptor)
                .with_message("no enum descriptor registered")
                .with_type_name(name)
        })
    }

    /// Diagnostic help text keyed by dotted full name. Never affects parsing.
    pub fn comment(&self, full_name: &str) -> Option<&str> {
        self.comments.get(full_name).map(String::as_str)
    }

    pub fn message_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.messages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn enum_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.enums.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
