//! Interface descriptions
//!
//! An interface description names a set of members (method calls and
//! signals) together with their signatures. Descriptions are built up with
//! `add_member` and friends, then activated when handed to a bus attachment;
//! an activated description is immutable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::InterfaceError;
use crate::names;
use crate::types::MsgArg;

/// Kind of interface member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberType {
    /// A method call
    MethodCall,
    /// A signal
    Signal,
}

impl std::fmt::Display for MemberType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberType::MethodCall => write!(f, "method"),
            MemberType::Signal => write!(f, "signal"),
        }
    }
}

/// A member of an interface
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// Name of the interface the member belongs to.
    pub interface: String,
    /// Method call or signal.
    pub member_type: MemberType,
    /// Member name.
    pub name: String,
    /// Input signature (the body signature for signals).
    pub signature: String,
    /// Output signature, empty for signals.
    pub return_signature: String,
    /// Comma separated argument names, inputs first.
    pub arg_names: String,
}

impl Member {
    /// Whether this member is a signal
    pub fn is_signal(&self) -> bool {
        self.member_type == MemberType::Signal
    }

    /// Check a body against the input signature
    pub fn check_args(&self, args: &[MsgArg]) -> Result<(), InterfaceError> {
        let types = split_signature(&self.signature);
        let matches = types.len() == args.len()
            && types.iter().zip(args).all(|(ty, arg)| arg_matches(arg, ty));
        if matches {
            Ok(())
        } else {
            Err(InterfaceError::SignatureMismatch {
                member: self.name.clone(),
                expected: self.signature.clone(),
                actual: crate::types::signature_of(args),
            })
        }
    }
}

fn arg_matches(arg: &MsgArg, ty: &str) -> bool {
    match arg {
        MsgArg::Array(items) => match ty.strip_prefix('a') {
            Some(elem) => items.iter().all(|item| arg_matches(item, elem)),
            None => false,
        },
        other => other.signature() == ty,
    }
}

/// Split a signature into its complete types
///
/// `"sai(ii)"` yields `["s", "ai", "(ii)"]`. Unbalanced containers end the
/// last type at the end of the string.
pub fn split_signature(signature: &str) -> Vec<&str> {
    let bytes = signature.as_bytes();
    let mut types = Vec::new();
    let mut start = 0;
    while start < bytes.len() {
        let end = complete_type_end(bytes, start);
        types.push(&signature[start..end]);
        start = end;
    }
    types
}

fn complete_type_end(bytes: &[u8], start: usize) -> usize {
    match bytes[start] {
        b'a' if start + 1 < bytes.len() => complete_type_end(bytes, start + 1),
        open @ (b'(' | b'{') => {
            let close = if open == b'(' { b')' } else { b'}' };
            let mut depth = 0usize;
            for (offset, &b) in bytes[start..].iter().enumerate() {
                if b == open {
                    depth += 1;
                } else if b == close {
                    depth -= 1;
                    if depth == 0 {
                        return start + offset + 1;
                    }
                }
            }
            bytes.len()
        }
        _ => start + 1,
    }
}

/// Description of a bus interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescription {
    name: String,
    members: BTreeMap<String, Member>,
    activated: bool,
}

impl InterfaceDescription {
    /// Create an empty, modifiable interface description
    pub fn new(name: impl Into<String>) -> Result<Self, InterfaceError> {
        let name = name.into();
        names::check_bus_name(&name).map_err(|reason| InterfaceError::InvalidName {
            name: name.clone(),
            reason: reason.to_string(),
        })?;
        Ok(Self {
            name,
            members: BTreeMap::new(),
            activated: false,
        })
    }

    /// Interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a member
    pub fn add_member(
        &mut self,
        member_type: MemberType,
        name: &str,
        signature: &str,
        return_signature: &str,
        arg_names: &str,
    ) -> Result<(), InterfaceError> {
        if self.activated {
            return Err(InterfaceError::Activated {
                name: self.name.clone(),
            });
        }
        names::check_member_name(name).map_err(|reason| InterfaceError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })?;
        if self.members.contains_key(name) {
            return Err(InterfaceError::DuplicateMember {
                interface: self.name.clone(),
                member: name.to_string(),
            });
        }
        self.members.insert(
            name.to_string(),
            Member {
                interface: self.name.clone(),
                member_type,
                name: name.to_string(),
                signature: signature.to_string(),
                return_signature: return_signature.to_string(),
                arg_names: arg_names.to_string(),
            },
        );
        Ok(())
    }

    /// Add a signal member
    pub fn add_signal(
        &mut self,
        name: &str,
        signature: &str,
        arg_names: &str,
    ) -> Result<(), InterfaceError> {
        self.add_member(MemberType::Signal, name, signature, "", arg_names)
    }

    /// Add a method member
    pub fn add_method(
        &mut self,
        name: &str,
        signature: &str,
        return_signature: &str,
        arg_names: &str,
    ) -> Result<(), InterfaceError> {
        self.add_member(
            MemberType::MethodCall,
            name,
            signature,
            return_signature,
            arg_names,
        )
    }

    /// Freeze the description
    pub fn activate(&mut self) {
        self.activated = true;
    }

    /// Whether the description has been activated
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Look up any member by name
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Look up a signal member by name
    pub fn signal(&self, name: &str) -> Option<&Member> {
        self.members.get(name).filter(|m| m.is_signal())
    }

    /// Look up a method member by name
    pub fn method(&self, name: &str) -> Option<&Member> {
        self.members.get(name).filter(|m| !m.is_signal())
    }

    /// Whether a member with this name exists
    pub fn has_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// All members in name order
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Render the description as introspection XML
    pub fn introspect(&self) -> String {
        let mut xml = format!("<interface name=\"{}\">\n", self.name);
        for member in self.members.values() {
            let mut names = member
                .arg_names
                .split(',')
                .filter(|n| !n.is_empty());
            let mut args = Vec::new();
            let (in_dir, out_sig) = match member.member_type {
                MemberType::Signal => ("out", ""),
                MemberType::MethodCall => ("in", member.return_signature.as_str()),
            };
            for ty in split_signature(&member.signature) {
                args.push((names.next(), ty, in_dir));
            }
            for ty in split_signature(out_sig) {
                args.push((names.next(), ty, "out"));
            }

            if args.is_empty() {
                xml.push_str(&format!("  <{} name=\"{}\"/>\n", member.member_type, member.name));
                continue;
            }
            xml.push_str(&format!("  <{} name=\"{}\">\n", member.member_type, member.name));
            for (name, ty, direction) in args {
                match name {
                    Some(name) => xml.push_str(&format!(
                        "    <arg name=\"{}\" type=\"{}\" direction=\"{}\"/>\n",
                        name, ty, direction
                    )),
                    None => xml.push_str(&format!(
                        "    <arg type=\"{}\" direction=\"{}\"/>\n",
                        ty, direction
                    )),
                }
            }
            xml.push_str(&format!("  </{}>\n", member.member_type));
        }
        xml.push_str("</interface>\n");
        xml
    }
}
