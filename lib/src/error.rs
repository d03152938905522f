use std::{fmt, io};
use std::panic::Location;
use std::convert::Infallible;
use std::error::Error as StdError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The class of a build error. Decides how a [`Report`] treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A header comment block was opened but never closed.
    MalformedHeader,
    /// A template file is missing for the requested protocol.
    TemplateNotFound,
    /// A template name chains more than one parent, or an alias is ambiguous.
    TemplateInheritance,
    /// A `date` header that isn't `YYYY-MM-DD`.
    InvalidDateFormat,
    /// A placeholder with no value in any context layer.
    UnresolvedVariable,
    /// An index configuration names a template or index that doesn't exist.
    ConfigReference,
    /// Configuration that failed to load or validate.
    Config,
    Io,
    Other,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::MalformedHeader => "malformed header",
            Kind::TemplateNotFound => "template not found",
            Kind::TemplateInheritance => "template inheritance",
            Kind::InvalidDateFormat => "invalid date format",
            Kind::UnresolvedVariable => "unresolved variable",
            Kind::ConfigReference => "config reference",
            Kind::Config => "configuration",
            Kind::Io => "i/o",
            Kind::Other => "error",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    detail: Vec<Box<dyn ErrorDetail>>,
    prev: Option<Box<Error>>,
    _location: &'static Location<'static>,
}

pub trait ErrorDetail: fmt::Display + fmt::Debug + Send + Sync {
    fn context(&self) -> Vec<(Option<String>, String)> { vec![] }
}

impl Error {
    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// The first line of the outermost detail.
    pub fn message(&self) -> String {
        self.detail.first()
            .map(|d| d.to_string())
            .unwrap_or_default()
    }

    /// Looks up a context value by key in this error and the errors it wraps.
    pub fn param(&self, key: &str) -> Option<String> {
        self.detail.iter()
            .flat_map(|d| d.context())
            .find(|(k, _)| k.as_deref() == Some(key))
            .map(|(_, v)| v)
            .or_else(|| self.prev.as_ref()?.param(key))
    }

    /// Places `self` behind `other`. The kind of the outer error is kept
    /// unless it is [`Kind::Other`], in which case it inherits ours.
    pub fn chain(self, mut other: Error) -> Self {
        #[inline]
        fn _chain(error: Error, behind: &mut Error) {
            if let Some(prev) = behind.prev.as_mut() {
                _chain(error, prev);
            } else {
                behind.prev = Some(Box::new(error));
            }
        }

        if other.kind == Kind::Other {
            other.kind = self.kind;
        }

        _chain(self, &mut other);
        other
    }
}

impl ErrorDetail for &(dyn StdError + Send + Sync) {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let mut ctxt = vec![];
        let mut error = self.source();
        while let Some(e) = error {
            ctxt.push((None, e.to_string()));
            error = e.source();
        }

        ctxt
    }
}

impl ErrorDetail for Box<dyn StdError + Send + Sync> {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let error: &(dyn StdError + Send + Sync) = &**self;
        error.context()
    }
}

macro_rules! impl_error_detail_with_std_error {
    ($T:ty) => {
        impl $crate::error::ErrorDetail for $T {
            fn context(&self) -> Vec<(Option<String>, String)> {
                let error: &(dyn std::error::Error + Send + Sync) = self;
                error.context()
            }
        }
    }
}

impl_error_detail_with_std_error!(io::Error);
impl_error_detail_with_std_error!(toml::de::Error);
impl_error_detail_with_std_error!(serde_json::Error);

impl ErrorDetail for String { }
impl ErrorDetail for &str { }

impl Clone for Error {
    fn clone(&self) -> Self {
        Error {
            kind: self.kind,
            detail: self.detail.iter()
                .map(|detail| MakeshiftError::from(&**detail))
                .map(|error| Box::new(error) as Box<dyn ErrorDetail>)
                .collect(),
            prev: self.prev.clone(),
            _location: self._location,
        }
    }
}

impl<T: ErrorDetail + 'static> From<T> for Error {
    #[track_caller]
    fn from(detail: T) -> Self {
        let kind = match (&detail as &dyn std::any::Any).is::<io::Error>() {
            true => Kind::Io,
            false => Kind::Other,
        };

        Error {
            kind,
            prev: None,
            detail: vec![Box::new(detail)],
            _location: std::panic::Location::caller(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Copy, Clone)] struct Indent(usize);

        impl fmt::Display for Indent {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for _ in 0..(self.0 * 4) { write!(f, " ")? }
                Ok(())
            }
        }

        struct NestedError<'a>(Indent, &'a Error);

        impl fmt::Display for NestedError<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let NestedError(indent, e) = self;

                for detail in &e.detail {
                    let indent_line = format!("\n{indent}");

                    writeln!(f, "{indent}{}", format!("{:#}", detail).replace('\n', &indent_line))?;
                    for (key, value) in detail.context() {
                        let value = value.replace('\n', &indent_line);
                        if let Some(key) = key {
                            writeln!(f, "{indent}{key}: {value}")?;
                        } else {
                            writeln!(f, "{indent}{value}")?;
                        }
                    }

                    if std::env::var_os("RUST_BACKTRACE").is_some() {
                        writeln!(f, "{indent}[{}]", e._location)?;
                    }
                }

                if let Some(prev) = &e.prev {
                    NestedError(Indent(indent.0 + 1), prev).fmt(f)?;
                }

                Ok(())
            }
        }

        NestedError(Indent(0), self).fmt(f)
    }
}

#[derive(Debug)]
pub struct MakeshiftError {
    pub message: String,
    pub parameters: Vec<(Option<String>, String)>,
}

impl From<&dyn ErrorDetail> for MakeshiftError {
    #[inline]
    fn from(detail: &dyn ErrorDetail) -> Self {
        MakeshiftError {
            message: detail.to_string(),
            parameters: detail.context()
        }
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! err {
    ($($token:tt)*) => (Err($crate::error!($($token)*)));
}

/// Builds an [`Error`](crate::error::Error) from a message and context.
///
/// A leading `[Kind::X]` sets the error's kind; it defaults to
/// [`Kind::Other`](crate::error::Kind::Other).
#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ([$kind:expr] $($rest:tt)*) => (
        $crate::error!($($rest)*).with_kind($kind)
    );

    ($msg:expr, $($rest:tt)*) => (
        $crate::error::Error::from($crate::error::MakeshiftError {
            message: $msg.to_string(),
            parameters: {
                #[allow(unused_mut)]
                let mut v: Vec<(Option<String>, String)> = Vec::new();
                $crate::error!(@param v $($rest)*);
                v
            },
        })
    );

    ($msg:expr) => ( $crate::error!($msg,) );

    (@param $v:ident $key:expr => $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $key => $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $key:expr => $value:expr) => {
        $v.push((Some($key.to_string()), $value.to_string()));
    };

    (@param $v:ident $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $value:expr) => {
        $v.push((None, $value.to_string()));
    };

    (@param $v:ident $(,)?) => { };
}

impl fmt::Display for MakeshiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl ErrorDetail for MakeshiftError {
    fn context(&self) -> Vec<(Option<String>, String)> {
        self.parameters.clone()
    }
}

pub trait Chainable<T> {
    fn chain(self, other: impl Into<Error>) -> Result<T>;

    fn chain_with<F, E>(self, f: F) -> Result<T>
        where F: FnOnce() -> E, E: Into<Error>;
}

impl<T, E: Into<Error>> Chainable<T> for Result<T, E> {
    #[track_caller]
    fn chain(self, other: impl Into<Error>) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().chain(other.into()))
        }
    }

    fn chain_with<F, Err>(self, f: F) -> Result<T>
        where F: FnOnce() -> Err, Err: Into<Error>,
     {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().chain(f().into()))
        }
    }
}

impl ErrorDetail for Infallible {
    fn context(&self) -> Vec<(Option<String>, String)> { vec![] }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Failure,
}

#[derive(Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub error: Error,
}

/// Diagnostics collected over one build.
///
/// Failures of one document or index never abort the build; they are pushed
/// here and enumerated at the end. Pushing only needs `&self`, so renders
/// running on the rayon pool can share one report.
#[derive(Debug, Default)]
pub struct Report {
    entries: boxcar::Vec<Diagnostic>,
}

impl Report {
    pub fn new() -> Self {
        Report::default()
    }

    pub fn warn(&self, error: Error) {
        tracing::warn!(kind = %error.kind(), "{}", error.message());
        self.entries.push(Diagnostic { severity: Severity::Warning, error });
    }

    pub fn fail(&self, error: Error) {
        tracing::error!(kind = %error.kind(), "{}", error.message());
        self.entries.push(Diagnostic { severity: Severity::Failure, error });
    }

    /// Records `error` with the severity its kind implies.
    pub fn record(&self, error: Error) {
        match error.kind() {
            Kind::MalformedHeader | Kind::InvalidDateFormat => self.warn(error),
            _ => self.fail(error),
        }
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        (0..self.entries.count()).filter_map(|i| self.entries.get(i))
    }

    pub fn failures(&self) -> impl Iterator<Item = &Error> + '_ {
        self.diagnostics()
            .filter(|d| d.severity == Severity::Failure)
            .map(|d| &d.error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Error> + '_ {
        self.diagnostics()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| &d.error)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn count(&self, kind: Kind) -> usize {
        self.diagnostics().filter(|d| d.error.kind() == kind).count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failures = self.failures().count();
        let warnings = self.warnings().count();
        writeln!(f, "{failures} failure(s), {warnings} warning(s)")?;
        for (i, error) in self.failures().enumerate() {
            write!(f, "[{}] {}: {error}", i + 1, error.kind())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_survive_chaining() {
        let inner = error!([Kind::TemplateNotFound] "missing", "template" => "post");
        let outer = Err::<(), _>(inner).chain(error!("failed to render page")).unwrap_err();
        assert_eq!(outer.kind(), Kind::TemplateNotFound);
        assert_eq!(outer.message(), "failed to render page");
        assert_eq!(outer.param("template").as_deref(), Some("post"));

        let explicit = Err::<(), _>(error!("inner"))
            .chain(error!([Kind::ConfigReference] "outer"))
            .unwrap_err();

        assert_eq!(explicit.kind(), Kind::ConfigReference);
    }

    #[test]
    fn io_errors_are_io_kind() {
        let e = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(e.kind(), Kind::Io);
    }

    #[test]
    fn report_separates_warnings_from_failures() {
        let report = Report::new();
        report.record(error!([Kind::MalformedHeader] "unterminated header"));
        report.record(error!([Kind::InvalidDateFormat] "bad date"));
        assert!(!report.has_failures());

        report.record(error!([Kind::TemplateNotFound] "no template"));
        assert!(report.has_failures());
        assert_eq!(report.warnings().count(), 2);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.count(Kind::InvalidDateFormat), 1);
    }
}
