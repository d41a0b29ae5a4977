use std::{fmt, time::SystemTime};

use thiserror::Error;

/// Discriminant of the value held by a [`Metric`].
///
/// The numeric representation is stable and may be relied upon by backends that transmit the type alongside the
/// value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MetricType {
    /// Signed 64-bit integer.
    Int = 0,

    /// UTF-8 string.
    String = 1,

    /// 64-bit floating point.
    Double = 2,

    /// Unsigned 64-bit integer.
    UInt64 = 3,
}

impl MetricType {
    /// Returns the stable numeric discriminant of this type.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns a short, human-readable name for this type.
    pub const fn as_str(self) -> &'static str {
        match self {
            MetricType::Int => "int",
            MetricType::String => "string",
            MetricType::Double => "double",
            MetricType::UInt64 => "uint64",
        }
    }

    /// Returns `true` if values of this type can take part in rate/increment derivation.
    pub const fn is_numeric(self) -> bool {
        !matches!(self, MetricType::String)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a metric.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue {
    /// Signed 64-bit integer.
    Int(i64),

    /// UTF-8 string.
    String(String),

    /// 64-bit floating point.
    Double(f64),

    /// Unsigned 64-bit integer.
    UInt64(u64),
}

impl MetricValue {
    /// Returns the type of this value.
    pub const fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Int(_) => MetricType::Int,
            MetricValue::String(_) => MetricType::String,
            MetricValue::Double(_) => MetricType::Double,
            MetricValue::UInt64(_) => MetricType::UInt64,
        }
    }

    /// Returns the value as a floating point number, or `None` for strings.
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Int(v) => Some(*v as f64),
            MetricValue::Double(v) => Some(*v),
            MetricValue::UInt64(v) => Some(*v as f64),
            MetricValue::String(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => fmt::Display::fmt(v, f),
            MetricValue::String(v) => f.write_str(v),
            MetricValue::Double(v) => fmt::Display::fmt(v, f),
            MetricValue::UInt64(v) => fmt::Display::fmt(v, f),
        }
    }
}

macro_rules! impl_from_value {
    ($variant:ident, $target:ty, $($ty:ty),+) => {
        $(
            impl From<$ty> for MetricValue {
                fn from(value: $ty) -> Self {
                    MetricValue::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

impl_from_value!(Int, i64, i8, i16, i32, i64, u8, u16, u32);
impl_from_value!(UInt64, u64, u64);
impl_from_value!(Double, f64, f32, f64);
impl_from_value!(String, String, String, &str);

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::UInt64(value as u64)
    }
}

/// A key/value pair attached to a metric.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
    name: String,
    value: String,
}

impl Tag {
    /// Creates a [`Tag`] from a name and value.
    pub fn new<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Tag { name: name.into(), value: value.into() }
    }

    /// Name of this tag.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of this tag.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl<N, V> From<(N, V)> for Tag
where
    N: Into<String>,
    V: Into<String>,
{
    fn from(pair: (N, V)) -> Tag {
        Tag::new(pair.0, pair.1)
    }
}

impl<N, V> From<&(N, V)> for Tag
where
    N: Into<String> + Clone,
    V: Into<String> + Clone,
{
    fn from(pair: &(N, V)) -> Tag {
        Tag::new(pair.0.clone(), pair.1.clone())
    }
}

/// Errors from reading a metric value as a specific type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    /// The metric holds a value of a different type than the one requested.
    #[error("metric holds a {actual} value, not a {expected} value")]
    TypeMismatch {
        /// Type that was requested.
        expected: MetricType,

        /// Type that the metric actually holds.
        actual: MetricType,
    },
}

/// A single named, typed, timestamped and tagged measurement.
///
/// The value type is fixed once the metric is constructed. Tags keep their insertion order and duplicate names are
/// passed through untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    name: String,
    value: MetricValue,
    timestamp: SystemTime,
    tags: Vec<Tag>,
}

impl Metric {
    /// Creates a metric stamped with the current wall-clock time.
    pub fn new<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<MetricValue>,
    {
        Metric { name: name.into(), value: value.into(), timestamp: Self::current_timestamp(), tags: Vec::new() }
    }

    /// Returns the current wall-clock time, as used for newly created metrics.
    pub fn current_timestamp() -> SystemTime {
        SystemTime::now()
    }

    /// Replaces the timestamp of this metric.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Name of this metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames this metric.
    pub fn set_name<N: Into<String>>(&mut self, name: N) {
        self.name = name.into();
    }

    /// Value of this metric.
    pub fn value(&self) -> &MetricValue {
        &self.value
    }

    pub(crate) fn set_value(&mut self, value: MetricValue) {
        self.value = value;
    }

    /// Type of the value held by this metric.
    pub fn metric_type(&self) -> MetricType {
        self.value.metric_type()
    }

    /// Time at which this metric was measured.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Replaces the timestamp of this metric in place.
    pub fn set_timestamp(&mut self, timestamp: SystemTime) {
        self.timestamp = timestamp;
    }

    /// Tags attached to this metric, in insertion order.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Returns a copy of this metric with `tags` appended to its tag list.
    ///
    /// The metric this is called on is left untouched.
    #[must_use]
    pub fn add_tags<I, T>(&self, tags: I) -> Metric
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        let mut metric = self.clone();
        metric.tags.extend(tags.into_iter().map(Into::into));
        metric
    }

    /// Reads the value as a signed integer.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] if the metric does not hold an [`MetricType::Int`] value.
    pub fn as_int(&self) -> Result<i64, ValueError> {
        match self.value {
            MetricValue::Int(v) => Ok(v),
            _ => Err(self.mismatch(MetricType::Int)),
        }
    }

    /// Reads the value as an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] if the metric does not hold an [`MetricType::UInt64`] value.
    pub fn as_uint64(&self) -> Result<u64, ValueError> {
        match self.value {
            MetricValue::UInt64(v) => Ok(v),
            _ => Err(self.mismatch(MetricType::UInt64)),
        }
    }

    /// Reads the value as a floating point number.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] if the metric does not hold an [`MetricType::Double`] value.
    pub fn as_double(&self) -> Result<f64, ValueError> {
        match self.value {
            MetricValue::Double(v) => Ok(v),
            _ => Err(self.mismatch(MetricType::Double)),
        }
    }

    /// Reads the value as a string.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] if the metric does not hold an [`MetricType::String`] value.
    pub fn as_str(&self) -> Result<&str, ValueError> {
        match &self.value {
            MetricValue::String(v) => Ok(v),
            _ => Err(self.mismatch(MetricType::String)),
        }
    }

    fn mismatch(&self, expected: MetricType) -> ValueError {
        ValueError::TypeMismatch { expected, actual: self.metric_type() }
    }
}
