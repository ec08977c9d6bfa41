use crate::error::RedisError;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// A primitive command argument as it travels on the wire.
///
/// Infinite floats are written as Redis's `+inf` / `-inf`; JSON has no
/// number for them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Arg {
    /// Converts any serializable value into an argument.
    ///
    /// Strings, numbers and booleans pass through as themselves; everything
    /// else (objects, arrays, null) is sent as its JSON text.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Arg, RedisError> {
        Ok(Arg::from_value(serde_json::to_value(value)?))
    }

    pub fn from_value(value: Value) -> Arg {
        match value {
            Value::String(s) => Arg::Str(s),
            Value::Bool(b) => Arg::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Arg::Int(i),
                None => match n.as_f64() {
                    Some(f) if n.is_f64() => Arg::Float(f),
                    // u64 beyond i64::MAX keeps its exact digits
                    _ => Arg::Str(n.to_string()),
                },
            },
            other => Arg::Str(other.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Arg::Str(_))
    }

    /// True for `NaN`, which has no Redis representation.
    pub fn is_nan(&self) -> bool {
        matches!(self, Arg::Float(x) if x.is_nan())
    }
}

fn infinity_text(x: f64) -> Option<&'static str> {
    if !x.is_infinite() {
        None
    } else if x.is_sign_positive() {
        Some("+inf")
    } else {
        Some("-inf")
    }
}

impl Serialize for Arg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Arg::Str(s) => serializer.serialize_str(s),
            Arg::Int(i) => serializer.serialize_i64(*i),
            Arg::Float(x) => match infinity_text(*x) {
                Some(text) => serializer.serialize_str(text),
                None => serializer.serialize_f64(*x),
            },
            Arg::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Str(s) => write!(f, "{}", s),
            Arg::Int(i) => write!(f, "{}", i),
            Arg::Float(x) => match infinity_text(*x) {
                Some(text) => f.write_str(text),
                None => write!(f, "{}", x),
            },
            Arg::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::Str(s.clone())
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Int(i)
    }
}

impl From<i32> for Arg {
    fn from(i: i32) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<u32> for Arg {
    fn from(i: u32) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<f64> for Arg {
    fn from(x: f64) -> Self {
        Arg::Float(x)
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

/// One Redis command: the verb followed by its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command {
    args: Vec<Arg>,
}

impl Command {
    pub fn new(verb: impl Into<String>) -> Self {
        Command {
            args: vec![Arg::Str(verb.into())],
        }
    }

    pub fn from_args(args: Vec<Arg>) -> Self {
        Command { args }
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The verb, or an empty string when the first argument is not a string.
    pub fn name(&self) -> &str {
        self.args.first().and_then(Arg::as_str).unwrap_or("")
    }

    pub fn as_args(&self) -> &[Arg] {
        &self.args
    }

    pub fn into_args(self) -> Vec<Arg> {
        self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.args.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// Ordered commands submitted in a single request.
///
/// The response to a batch carries exactly one outcome per command, in the
/// same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command and returns the slot it occupies.
    pub fn push(&mut self, command: Command) -> usize {
        self.commands.push(command);
        self.commands.len() - 1
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

impl FromIterator<Command> for Batch {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Batch {
            commands: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Command>> for Batch {
    fn from(commands: Vec<Command>) -> Self {
        Batch { commands }
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

/// How the server should run a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BatchKind {
    /// Commands run in order; other clients may interleave.
    #[default]
    Pipeline,
    /// Commands run atomically as a MULTI/EXEC block.
    Transaction,
}

impl BatchKind {
    pub fn path(&self) -> &'static str {
        match self {
            BatchKind::Pipeline => "pipeline",
            BatchKind::Transaction => "multi-exec",
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Pipeline => write!(f, "PIPELINE"),
            BatchKind::Transaction => write!(f, "MULTI-EXEC"),
        }
    }
}
