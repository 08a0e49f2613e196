//! Message arguments and messages.
//!
//! `MsgArg` is the tagged value carried in a message body. Each variant maps
//! onto a single signature code so a body's signature can be compared with the
//! signature a member declares.

use serde::{Deserialize, Serialize};

use super::SessionId;

/// A single typed message argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MsgArg {
    /// UTF-8 string (`s`)
    Str(String),
    /// Boolean (`b`)
    Bool(bool),
    /// Unsigned byte (`y`)
    Byte(u8),
    /// Signed 32-bit integer (`i`)
    Int32(i32),
    /// Unsigned 32-bit integer (`u`)
    UInt32(u32),
    /// Signed 64-bit integer (`x`)
    Int64(i64),
    /// IEEE double (`d`)
    Double(f64),
    /// Object path (`o`)
    ObjectPath(String),
    /// Homogeneous array (`a` followed by the element signature)
    Array(Vec<MsgArg>),
}

impl MsgArg {
    /// Signature of this argument
    ///
    /// Empty arrays have no element type to inspect and report `av`.
    pub fn signature(&self) -> String {
        match self {
            MsgArg::Str(_) => "s".to_string(),
            MsgArg::Bool(_) => "b".to_string(),
            MsgArg::Byte(_) => "y".to_string(),
            MsgArg::Int32(_) => "i".to_string(),
            MsgArg::UInt32(_) => "u".to_string(),
            MsgArg::Int64(_) => "x".to_string(),
            MsgArg::Double(_) => "d".to_string(),
            MsgArg::ObjectPath(_) => "o".to_string(),
            MsgArg::Array(items) => match items.first() {
                Some(first) => format!("a{}", first.signature()),
                None => "av".to_string(),
            },
        }
    }

    /// String payload, for `Str` and `ObjectPath`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MsgArg::Str(s) | MsgArg::ObjectPath(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MsgArg::Byte(v) => Some(i64::from(*v)),
            MsgArg::Int32(v) => Some(i64::from(*v)),
            MsgArg::UInt32(v) => Some(i64::from(*v)),
            MsgArg::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MsgArg::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for MsgArg {
    fn from(value: &str) -> Self {
        MsgArg::Str(value.to_string())
    }
}

impl From<String> for MsgArg {
    fn from(value: String) -> Self {
        MsgArg::Str(value)
    }
}

impl From<bool> for MsgArg {
    fn from(value: bool) -> Self {
        MsgArg::Bool(value)
    }
}

impl From<i32> for MsgArg {
    fn from(value: i32) -> Self {
        MsgArg::Int32(value)
    }
}

impl From<u32> for MsgArg {
    fn from(value: u32) -> Self {
        MsgArg::UInt32(value)
    }
}

impl std::fmt::Display for MsgArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MsgArg::Str(s) | MsgArg::ObjectPath(s) => write!(f, "{}", s),
            MsgArg::Bool(b) => write!(f, "{}", b),
            MsgArg::Byte(v) => write!(f, "{}", v),
            MsgArg::Int32(v) => write!(f, "{}", v),
            MsgArg::UInt32(v) => write!(f, "{}", v),
            MsgArg::Int64(v) => write!(f, "{}", v),
            MsgArg::Double(v) => write!(f, "{}", v),
            MsgArg::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Signature of a whole argument list
pub fn signature_of(args: &[MsgArg]) -> String {
    args.iter().map(MsgArg::signature).collect()
}

/// A delivered bus message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique name of the sending connection.
    pub sender: String,
    /// Object path the message was emitted from.
    pub object_path: String,
    /// Interface the member belongs to.
    pub interface: String,
    /// Member name.
    pub member: String,
    /// Session the message travelled over, if any.
    pub session_id: Option<SessionId>,
    /// Body arguments.
    pub args: Vec<MsgArg>,
}

impl Message {
    /// Create a message with no session
    pub fn new(
        sender: impl Into<String>,
        object_path: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
        args: Vec<MsgArg>,
    ) -> Self {
        Self {
            sender: sender.into(),
            object_path: object_path.into(),
            interface: interface.into(),
            member: member.into(),
            session_id: None,
            args,
        }
    }

    /// Set the session id
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Argument at `index`
    pub fn arg(&self, index: usize) -> Option<&MsgArg> {
        self.args.get(index)
    }

    /// Signature of the body
    pub fn signature(&self) -> String {
        signature_of(&self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signatures() {
        assert_eq!(MsgArg::from("Bob").signature(), "s");
        assert_eq!(
            MsgArg::Array(vec![MsgArg::Int32(1), MsgArg::Int32(2)]).signature(),
            "ai"
        );
        assert_eq!(MsgArg::Array(vec![]).signature(), "av");
        assert_eq!(
            signature_of(&[MsgArg::from("a"), MsgArg::UInt32(7), MsgArg::Bool(true)]),
            "sub"
        );
    }

    #[test]
    fn test_accessors() {
        assert_eq!(MsgArg::from("Bob").as_str(), Some("Bob"));
        assert_eq!(MsgArg::Int32(4).as_str(), None);
        assert_eq!(MsgArg::UInt32(4).as_i64(), Some(4));
        assert_eq!(MsgArg::Bool(true).as_bool(), Some(true));
    }

    #[test]
    fn test_message_arg() {
        let msg = Message::new(":abc.1", "/", "org.example.Iface", "ping", vec!["x".into()]);
        assert_eq!(msg.arg(0).and_then(MsgArg::as_str), Some("x"));
        assert!(msg.arg(1).is_none());
        assert_eq!(msg.with_session(9).session_id, Some(9));
    }
}
