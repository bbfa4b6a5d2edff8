//!
//! # Routing Result and Error Types
//!

/// # [RouteError] Result Type
pub type RouteResult<T> = Result<T, RouteError>;

///
/// # Routing Error Enumeration
///
pub enum RouteError {
    /// Invalid configuration; raised at engine construction, no engine is created
    Config(String),
    /// Operation attempted at an illegal engine state
    State { message: String },
    /// Unsupported loading method or segment kind
    Unsupported(String),
    /// Boxed External Errors
    Boxed(Box<dyn std::error::Error + Send + Sync>),
    /// Uncategorized Error, with String Message
    Str(String),
    /// # [Ptr] Locking
    /// Caused by trouble with a [Ptr]: either deadlock, or panic while holding a lock.
    /// Generally caused by a [std::sync::PoisonError], which is not forwardable due to lifetime constraints.
    ///
    /// [Ptr]: crate::Ptr
    PtrLock,
}
impl RouteError {
    /// Create a [RouteError::Str] from anything String-convertible
    pub fn msg(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }
    /// Create an error-variant [Result] of our [RouteError::Str] variant from anything String-convertible
    pub fn fail<T>(s: impl Into<String>) -> Result<T, Self> {
        Err(Self::msg(s))
    }
    /// Create a [RouteError::Config] from anything String-convertible
    pub fn config(s: impl Into<String>) -> Self {
        Self::Config(s.into())
    }
    /// Create a [RouteError::State] from anything String-convertible
    pub fn state(s: impl Into<String>) -> Self {
        Self::State { message: s.into() }
    }
    /// Create a [RouteError::Unsupported] from anything String-convertible
    pub fn unsupported(s: impl Into<String>) -> Self {
        Self::Unsupported(s.into())
    }
}
impl std::fmt::Debug for RouteError {
    /// Display a [RouteError]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RouteError::Config(message) => {
                write!(f, "Configuration Error: \n - {}", message)
            }
            RouteError::State { message } => {
                write!(f, "State Error: \n - {}", message)
            }
            RouteError::Unsupported(message) => {
                write!(f, "Unsupported: \n - {}", message)
            }
            RouteError::Boxed(err) => err.fmt(f),
            RouteError::Str(err) => err.fmt(f),
            RouteError::PtrLock => write!(f, "[std::sync::PoisonError]"),
        }
    }
}
impl std::fmt::Display for RouteError {
    /// Display a [RouteError]
    /// Delegates to the [Debug] implementation
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
impl std::error::Error for RouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Boxed(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<String> for RouteError {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}
impl From<&str> for RouteError {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}
impl From<std::num::TryFromIntError> for RouteError {
    fn from(e: std::num::TryFromIntError) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl<T> From<std::sync::PoisonError<T>> for RouteError {
    fn from(_e: std::sync::PoisonError<T>) -> Self {
        Self::PtrLock
    }
}

///
/// # ErrorHelper
///
/// Helper trait for re-use among the engine's many tree-walkers and validators.
/// Each implementer will generally have some internal state to report upon failure,
/// which it can inject in the implementation-required `err` method.
/// The `fail` method, provided by default, simply returns the `err` value.
///
pub trait ErrorHelper {
    type Error;

    /// Create and return a [Self::Error] value.
    fn err(&self, msg: impl Into<String>) -> Self::Error;
    /// Return failure
    fn fail<T>(&self, msg: impl Into<String>) -> Result<T, Self::Error> {
        Err(self.err(msg))
    }
    /// Unwrap the [Option] `opt` if it is [Some], and return our error if not.
    fn unwrap<T>(&self, opt: Option<T>, msg: impl Into<String>) -> Result<T, Self::Error> {
        match opt {
            Some(val) => Ok(val),
            None => self.fail(msg),
        }
    }
    /// Assert a boolean condition. Returns through `self.fail` if it is not satisfied.
    fn assert(&self, b: bool, msg: impl Into<String>) -> Result<(), Self::Error> {
        match b {
            true => Ok(()),
            false => self.fail(msg),
        }
    }
}
