//! Call signatures: the identity of a computation plus its argument values

use crate::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of a memoizable computation.
///
/// The identifier text is written verbatim into the archive, so any change to
/// it starts a fresh cache namespace for that computation. Bump the version
/// when the computation's behavior changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionId(String);

impl FunctionId {
    /// Identifier of the form `name@version`
    #[must_use]
    pub fn new(name: impl AsRef<str>, version: impl AsRef<str>) -> Self {
        Self(format!("{}@{}", name.as_ref(), version.as_ref()))
    }

    /// Use arbitrary text (for example, the computation's source) as identity
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Identify a computation by the content hash of a compiled artifact
    #[must_use]
    pub fn from_artifact(name: impl AsRef<str>, artifact: &[u8]) -> Self {
        let digest = Sha256::digest(artifact);
        Self(format!("{}@sha256:{}", name.as_ref(), hex::encode(digest)))
    }

    /// The identifier text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Plain text
    Text(String),
    /// Opaque binary payload, archived as base64
    Bytes(Vec<u8>),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point number; must be finite to be archived
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Absent value
    Null,
    /// Structured value, archived as canonical JSON
    Json(serde_json::Value),
}

impl ArgValue {
    /// Build a structured argument from any serializable value
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| Error::serialization(format!("Failed to serialize argument: {e}")))
    }

    /// Text written into the archive entry for this value
    pub fn render(&self) -> Result<String> {
        match self {
            Self::Text(s) => Ok(s.clone()),
            Self::Bytes(b) => Ok(STANDARD.encode(b)),
            Self::Int(i) => Ok(i.to_string()),
            Self::UInt(u) => Ok(u.to_string()),
            Self::Float(f) if f.is_finite() => Ok(f.to_string()),
            Self::Float(f) => Err(Error::serialization(format!(
                "Non-finite float argument {f} has no stable representation"
            ))),
            Self::Bool(b) => Ok(b.to_string()),
            Self::Null => Ok("null".to_string()),
            Self::Json(v) => serde_json::to_string(&canonical_json(v))
                .map_err(|e| Error::serialization(format!("Failed to render argument: {e}"))),
        }
    }
}

/// Rebuild objects with keys in sorted order, independent of map backing
fn canonical_json(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<&String, serde_json::Value> =
                map.iter().map(|(k, v)| (k, canonical_json(v))).collect();
            serde_json::Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), v))
                    .collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonical_json).collect())
        }
        other => other.clone(),
    }
}

/// Conversion of a borrowed value into an [`ArgValue`]
pub trait ToArg {
    /// Produce the argument value
    fn to_arg(&self) -> ArgValue;
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> ArgValue {
        (**self).to_arg()
    }
}

impl ToArg for ArgValue {
    fn to_arg(&self) -> ArgValue {
        self.clone()
    }
}

macro_rules! to_arg_int {
    ($variant:ident as $target:ty: $($t:ty),*) => {
        $(impl ToArg for $t {
            fn to_arg(&self) -> ArgValue {
                ArgValue::$variant(<$target>::from(*self))
            }
        })*
    };
}

to_arg_int!(Int as i64: i8, i16, i32, i64);
to_arg_int!(UInt as u64: u8, u16, u32, u64);

// Pointer-sized integers fall back to their decimal text, which renders
// identically, on targets wider than 64 bits.
impl ToArg for isize {
    fn to_arg(&self) -> ArgValue {
        i64::try_from(*self).map_or_else(|_| ArgValue::Text(self.to_string()), ArgValue::Int)
    }
}

impl ToArg for usize {
    fn to_arg(&self) -> ArgValue {
        u64::try_from(*self).map_or_else(|_| ArgValue::Text(self.to_string()), ArgValue::UInt)
    }
}

impl ToArg for f32 {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Float(f64::from(*self))
    }
}

impl ToArg for f64 {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Float(*self)
    }
}

impl ToArg for bool {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Bool(*self)
    }
}

impl ToArg for str {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Text(self.to_string())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Text(self.clone())
    }
}

impl ToArg for [u8] {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Bytes(self.to_vec())
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Bytes(self.clone())
    }
}

impl<const N: usize> ToArg for [u8; N] {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Bytes(self.to_vec())
    }
}

impl<T: ToArg> ToArg for Option<T> {
    fn to_arg(&self) -> ArgValue {
        self.as_ref().map_or(ArgValue::Null, ToArg::to_arg)
    }
}

impl ToArg for serde_json::Value {
    fn to_arg(&self) -> ArgValue {
        ArgValue::Json(self.clone())
    }
}

/// Positional and named arguments of a call
///
/// Named arguments are kept sorted by name, so insertion order never
/// reaches the archive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<ArgValue>,
    named: BTreeMap<String, ArgValue>,
}

impl Args {
    /// Empty argument list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    #[must_use]
    pub fn arg(mut self, value: impl ToArg) -> Self {
        self.positional.push(value.to_arg());
        self
    }

    /// Set a named argument, replacing any previous value under that name
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl ToArg) -> Self {
        self.named.insert(name.into(), value.to_arg());
        self
    }

    /// Positional arguments in call order
    #[must_use]
    pub fn positional(&self) -> &[ArgValue] {
        &self.positional
    }

    /// Named arguments sorted by name
    #[must_use]
    pub fn named(&self) -> &BTreeMap<String, ArgValue> {
        &self.named
    }

    /// True when the call has no arguments at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// Argument shapes a memoized computation can be called with
pub trait CallArgs {
    /// Snapshot the arguments for archiving
    fn to_args(&self) -> Args;
}

impl CallArgs for Args {
    fn to_args(&self) -> Args {
        self.clone()
    }
}

impl CallArgs for () {
    fn to_args(&self) -> Args {
        Args::new()
    }
}

macro_rules! call_args_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: ToArg),+> CallArgs for ($($name,)+) {
            fn to_args(&self) -> Args {
                Args::new()$(.arg(&self.$idx))+
            }
        }
    };
}

call_args_tuple!(A: 0);
call_args_tuple!(A: 0, B: 1);
call_args_tuple!(A: 0, B: 1, C: 2);
call_args_tuple!(A: 0, B: 1, C: 2, D: 3);
call_args_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
call_args_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Everything that identifies one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Identity of the computation
    pub function: FunctionId,
    /// Argument values
    pub args: Args,
}

impl Call {
    /// Create a call signature
    #[must_use]
    pub fn new(function: FunctionId, args: Args) -> Self {
        Self { function, args }
    }
}
