//! The meraki_check crate turns Meraki Dashboard API readings into nagios/icinga check results.
//!
//! The building blocks are the same ones every plugin needs: a [`Resource`] representing one
//! service result, [`Metric`]s carrying the performance data and [`Thresholds`] deciding the
//! [`ServiceState`]. The [`checks`] module maps every supported dashboard reading onto them.

use std::cmp::Ordering;
use std::fmt;
use std::process;

#[macro_use]
mod macros;

pub mod api;
pub mod checks;
pub mod config;
#[cfg(feature = "cli")]
pub mod config_generator;
mod error;
pub mod plugin;
mod runner;

pub use crate::error::Error;
pub use crate::runner::{Runner, RunnerResult};

/// A Resource represents a single service from the perspective of nagios.
///
/// If no state is set explicitly it will determine one from the given metrics.
///
/// ```rust
/// # use meraki_check::{Metric, Resource, Thresholds, TriggerIfValue};
/// let thresholds = Thresholds::new(Some(5), Some(10), TriggerIfValue::AtOrAbove);
/// let resource = Resource::new()
///     .with_description("Associations in the past hour: 7")
///     .with_state_label()
///     .with_result(Metric::new("conn_assoc", 7).with_thresholds(thresholds));
///
/// assert_eq!(
///     &resource.to_nagios_string(),
///     "WARNING: Associations in the past hour: 7 | conn_assoc=7;5;10;;"
/// );
/// ```
pub struct Resource {
    state: Option<ServiceState>,
    description: Option<String>,
    details: Vec<String>,
    metrics: Vec<Box<dyn ResourceMetric>>,
    state_label: bool,
}

impl Resource {
    pub fn new() -> Resource {
        Resource {
            state: None,
            description: None,
            details: Vec::new(),
            metrics: Vec::new(),
            state_label: false,
        }
    }

    /// Forces the state of this resource. This disables the automatic state determination
    /// based on the included metrics.
    pub fn with_state(mut self, state: ServiceState) -> Self {
        self.state = Some(state);
        self
    }

    /// The summary line printed first.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Prefix the summary line with the determined state, e.g. `WARNING: ...`.
    pub fn with_state_label(mut self) -> Self {
        self.state_label = true;
        self
    }

    /// Appends one line below the summary.
    pub fn with_detail(mut self, line: impl Into<String>) -> Self {
        self.details.push(line.into());
        self
    }

    pub fn with_details<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details.extend(lines.into_iter().map(Into::into));
        self
    }

    /// Pushes a single metric into the resource.
    pub fn with_result<M>(mut self, metric: M) -> Self
    where
        M: 'static + ResourceMetric,
    {
        self.metrics.push(Box::new(metric));
        self
    }

    /// Returns a slice of the pushed metrics.
    pub fn metrics(&self) -> &[Box<dyn ResourceMetric>] {
        &self.metrics
    }

    pub fn details(&self) -> &[String] {
        &self.details
    }

    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns a string which nagios understands to determine the service state.
    ///
    /// The summary comes first, every detail line follows on its own line and the performance
    /// data of all metrics is appended after a ` | ` separator.
    pub fn to_nagios_string(&self) -> String {
        let state = self.get_state();
        let mut s = match (&self.description, self.state_label) {
            (Some(description), true) => format!("{}: {}", state, description),
            (Some(description), false) => description.clone(),
            (None, _) => state.to_string(),
        };

        for line in &self.details {
            s.push('\n');
            s.push_str(line);
        }

        if !self.metrics.is_empty() {
            s.push_str(" |");

            for metric in self.metrics.iter() {
                s.push_str(&format!(" {}", metric.perf_string()));
            }
        }

        s
    }

    /// Will determine a state by the given metrics.
    ///
    /// In case a state is set for this resource, it will return that state instead. Without
    /// any metric carrying a state the resource is [`ServiceState::Unknown`].
    pub fn get_state(&self) -> ServiceState {
        if let Some(state) = self.state {
            return state;
        }

        self.metrics
            .iter()
            .filter_map(|metric| metric.state())
            .fold(ServiceState::Unknown, |worst, state| worst.max(state))
    }

    /// Will return the exit code of the determined state via Self::get_state.
    pub fn exit_code(&self) -> i32 {
        self.get_state().exit_code()
    }

    /// Will print Self::to_nagios_string and exit with the exit code from Self::exit_code
    pub fn print_and_exit(&self) -> ! {
        println!("{}", self.to_nagios_string());
        process::exit(self.exit_code());
    }
}

impl Default for Resource {
    fn default() -> Self {
        Resource::new()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("state", &self.get_state())
            .field("output", &self.to_nagios_string())
            .finish()
    }
}

/// Represents a single metric of a resource. You shouldn't need to implement this by yourself
/// since [`Metric`] already implements it.
pub trait ResourceMetric {
    fn perf_string(&self) -> String;
    fn name(&self) -> &str;
    fn state(&self) -> Option<ServiceState>;
}

impl<T> ResourceMetric for Metric<T>
where
    T: PartialOrd + ToPerfString + Clone,
{
    fn perf_string(&self) -> String {
        self.to_perf_string()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> Option<ServiceState> {
        Metric::state(self)
    }
}

/// Represents a service state from nagios.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    /// Returns the corresponding nagios exit code to signal the service state of self.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceState::Ok => 0,
            ServiceState::Warning => 1,
            ServiceState::Critical => 2,
            ServiceState::Unknown => 3,
        }
    }

    fn severity(&self) -> u8 {
        match self {
            ServiceState::Unknown => 0,
            ServiceState::Ok => 1,
            ServiceState::Warning => 2,
            ServiceState::Critical => 3,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Ok => "OK",
            ServiceState::Warning => "WARNING",
            ServiceState::Critical => "CRITICAL",
            ServiceState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

impl PartialOrd for ServiceState {
    fn partial_cmp(&self, other: &ServiceState) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceState {
    fn cmp(&self, other: &ServiceState) -> Ordering {
        self.severity().cmp(&other.severity())
    }
}

/// The purpose of ToPerfString is only so one can define custom representations of custom types
/// without using the ToString trait so we don't interfere with that.
///
/// Also used internally for generation of the final output.
pub trait ToPerfString {
    fn to_perf_string(&self) -> String;
}

impl_to_perf_string_on_to_string!(usize);
impl_to_perf_string_on_to_string!(u8, u16, u32, u64, u128);
impl_to_perf_string_on_to_string!(i8, i16, i32, i64, i128);
impl_to_perf_string_on_to_string!(f32, f64);
impl_to_perf_string_on_to_string!(String);

impl<'a> ToPerfString for &'a str {
    fn to_perf_string(&self) -> String {
        self.to_string()
    }
}

impl<T> ToPerfString for Option<T>
where
    T: ToPerfString,
{
    fn to_perf_string(&self) -> String {
        match self {
            Some(ref s) => s.to_perf_string(),
            None => String::new(),
        }
    }
}

/// When a threshold fires, relative to the metric value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerIfValue {
    /// `value >= threshold`
    AtOrAbove,
    /// `value <= threshold`
    AtOrBelow,
    /// `value < threshold`
    Below,
}

impl TriggerIfValue {
    pub fn fires<T: PartialOrd>(&self, value: &T, threshold: &T) -> bool {
        match self {
            TriggerIfValue::AtOrAbove => value >= threshold,
            TriggerIfValue::AtOrBelow => value <= threshold,
            TriggerIfValue::Below => value < threshold,
        }
    }
}

/// A warning/critical pair evaluated from the most severe tier downwards.
///
/// ```rust
/// # use meraki_check::{ServiceState, Thresholds, TriggerIfValue};
/// let thresholds = Thresholds::new(Some(15), Some(30), TriggerIfValue::AtOrAbove);
/// assert_eq!(thresholds.evaluate(&15), ServiceState::Warning);
/// assert_eq!(thresholds.evaluate(&30), ServiceState::Critical);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds<T> {
    pub warning: Option<T>,
    pub critical: Option<T>,
    pub trigger: TriggerIfValue,
}

impl<T> Thresholds<T> {
    pub const fn new(warning: Option<T>, critical: Option<T>, trigger: TriggerIfValue) -> Self {
        Thresholds {
            warning,
            critical,
            trigger,
        }
    }
}

impl<T: PartialOrd> Thresholds<T> {
    /// Critical is checked before warning, so overlapping tiers always resolve to the most
    /// severe one. Never returns [`ServiceState::Unknown`].
    pub fn evaluate(&self, value: &T) -> ServiceState {
        let fires = |threshold: &Option<T>| {
            threshold
                .as_ref()
                .is_some_and(|t| self.trigger.fires(value, t))
        };

        if fires(&self.critical) {
            ServiceState::Critical
        } else if fires(&self.warning) {
            ServiceState::Warning
        } else {
            ServiceState::Ok
        }
    }

    /// Whether the warning tier is reached before the critical one.
    pub fn is_ordered(&self) -> bool {
        match (&self.warning, &self.critical) {
            (Some(warning), Some(critical)) => match self.trigger {
                TriggerIfValue::AtOrAbove => warning < critical,
                TriggerIfValue::AtOrBelow | TriggerIfValue::Below => warning > critical,
            },
            _ => true,
        }
    }
}

/// A single performance data point, optionally evaluated against [`Thresholds`].
///
/// ```rust
/// # use meraki_check::{Metric, ServiceState, Thresholds, TriggerIfValue};
/// let metric = Metric::new("test", 15)
///     .with_thresholds(Thresholds::new(Some(15), Some(30), TriggerIfValue::AtOrAbove));
/// assert_eq!(metric.state(), Some(ServiceState::Warning));
/// assert_eq!(metric.value(), &15);
/// ```
#[derive(Clone, Debug)]
pub struct Metric<T> {
    name: String,
    value: T,
    thresholds: Option<Thresholds<T>>,
    reported: Option<(Option<T>, Option<T>)>,
    min: Option<T>,
    max: Option<T>,
}

impl<T> Metric<T>
where
    T: PartialOrd + ToPerfString + Clone,
{
    pub fn new(name: &str, value: T) -> Self {
        Metric {
            name: name.to_owned(),
            value,
            thresholds: None,
            reported: None,
            min: None,
            max: None,
        }
    }

    /// *In debug builds this will panic if warning and critical are in the wrong order.*
    pub fn with_thresholds(mut self, thresholds: Thresholds<T>) -> Self {
        debug_assert!(
            thresholds.is_ordered(),
            "warning threshold of {} is not reached before the critical one",
            self.name
        );
        self.thresholds = Some(thresholds);
        self
    }

    /// Overrides the warning and critical values printed in the performance data without
    /// changing the ones the state is evaluated against.
    pub fn with_reported_thresholds(mut self, warning: Option<T>, critical: Option<T>) -> Self {
        self.reported = Some((warning, critical));
        self
    }

    pub fn with_min(mut self, min: T) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: T) -> Self {
        self.max = Some(max);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// `None` if the metric carries no thresholds.
    pub fn state(&self) -> Option<ServiceState> {
        self.thresholds.as_ref().map(|t| t.evaluate(&self.value))
    }

    fn perf_thresholds(&self) -> (Option<T>, Option<T>) {
        match (&self.reported, &self.thresholds) {
            (Some((warning, critical)), _) => (warning.clone(), critical.clone()),
            (None, Some(thresholds)) => (thresholds.warning.clone(), thresholds.critical.clone()),
            (None, None) => (None, None),
        }
    }
}

impl<T> ToPerfString for Metric<T>
where
    T: PartialOrd + ToPerfString + Clone,
{
    fn to_perf_string(&self) -> String {
        let (warning, critical) = self.perf_thresholds();

        metric_string!(
            perf_label(&self.name),
            self.value,
            warning,
            critical,
            self.min,
            self.max
        )
    }
}

fn perf_label(name: &str) -> String {
    // `=` would end the label, `'` is escaped by doubling
    let label = name.replace('=', "_").replace('\'', "''");

    if label.contains(' ') {
        format!("'{}'", label)
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use crate::{Metric, Resource, ServiceState, Thresholds, ToPerfString, TriggerIfValue};

    #[test]
    fn test_thresholds_ascending() {
        let thresholds = Thresholds::new(Some(15), Some(30), TriggerIfValue::AtOrAbove);
        assert_eq!(thresholds.evaluate(&12), ServiceState::Ok);
        assert_eq!(thresholds.evaluate(&15), ServiceState::Warning);
        assert_eq!(thresholds.evaluate(&18), ServiceState::Warning);
        assert_eq!(thresholds.evaluate(&30), ServiceState::Critical);
        assert_eq!(thresholds.evaluate(&35), ServiceState::Critical);
    }

    #[test]
    fn test_thresholds_descending() {
        let thresholds = Thresholds::new(Some(30), Some(15), TriggerIfValue::AtOrBelow);
        assert_eq!(thresholds.evaluate(&35), ServiceState::Ok);
        assert_eq!(thresholds.evaluate(&30), ServiceState::Warning);
        assert_eq!(thresholds.evaluate(&20), ServiceState::Warning);
        assert_eq!(thresholds.evaluate(&15), ServiceState::Critical);
        assert_eq!(thresholds.evaluate(&10), ServiceState::Critical);

        let thresholds = Thresholds::new(None, Some(5), TriggerIfValue::Below);
        assert_eq!(thresholds.evaluate(&5), ServiceState::Ok);
        assert_eq!(thresholds.evaluate(&4), ServiceState::Critical);
    }

    #[test]
    fn test_thresholds_overlap_resolves_to_critical() {
        // every value past critical is also past warning
        let thresholds = Thresholds::new(Some(10), Some(20), TriggerIfValue::AtOrAbove);
        for value in 20..100 {
            assert_eq!(thresholds.evaluate(&value), ServiceState::Critical);
        }
    }

    #[test]
    fn test_thresholds_ordering() {
        assert!(Thresholds::new(Some(5), Some(10), TriggerIfValue::AtOrAbove).is_ordered());
        assert!(!Thresholds::new(Some(10), Some(5), TriggerIfValue::AtOrAbove).is_ordered());
        assert!(Thresholds::new(Some(10), Some(5), TriggerIfValue::AtOrBelow).is_ordered());
        assert!(Thresholds::new(None, Some(0), TriggerIfValue::AtOrBelow).is_ordered());
    }

    #[test]
    fn test_metric() {
        let metric = Metric::new("test", 12);
        assert_eq!(metric.name(), "test");
        assert_eq!(metric.state(), None);
        assert_eq!(metric.value(), &12);
        assert_eq!(&metric.to_perf_string(), "test=12;;;;");

        let metric = Metric::new("test", 22)
            .with_thresholds(Thresholds::new(Some(15), Some(30), TriggerIfValue::AtOrAbove))
            .with_min(0)
            .with_max(100);
        assert_eq!(metric.state(), Some(ServiceState::Warning));
        assert_eq!(&metric.to_perf_string(), "test=22;15;30;0;100");
    }

    #[test]
    fn test_metric_reported_thresholds() {
        let metric = Metric::new("fail_conn", 12)
            .with_thresholds(Thresholds::new(Some(10), Some(20), TriggerIfValue::AtOrAbove))
            .with_reported_thresholds(Some(15), Some(25));
        assert_eq!(metric.state(), Some(ServiceState::Warning));
        assert_eq!(&metric.to_perf_string(), "fail_conn=12;15;25;;");

        let metric = Metric::new("conn_succ", 3)
            .with_thresholds(Thresholds::new(None, Some(0), TriggerIfValue::AtOrBelow));
        assert_eq!(&metric.to_perf_string(), "conn_succ=3;;0;;");
    }

    #[test]
    fn test_metric_float_value() {
        let metric = Metric::new("latency_stat", 12.5)
            .with_thresholds(Thresholds::new(Some(128.0), Some(512.0), TriggerIfValue::AtOrAbove));
        assert_eq!(&metric.to_perf_string(), "latency_stat=12.5;128;512;;");
    }

    #[test]
    fn test_resource() {
        let resource = Resource::new().with_result(Metric::new("test", 12));
        assert_eq!(resource.get_state(), ServiceState::Unknown);
        assert_eq!(&resource.to_nagios_string(), "UNKNOWN | test=12;;;;");

        let resource = Resource::new()
            .with_description("A test description")
            .with_state_label()
            .with_result(
                Metric::new("test", 12)
                    .with_thresholds(Thresholds::new(Some(14), None, TriggerIfValue::AtOrAbove))
                    .with_min(0),
            );
        assert_eq!(
            &resource.to_nagios_string(),
            "OK: A test description | test=12;14;;0;"
        );

        let test_data = [
            ("test", "OK | test=0;;;;"),
            ("test=a", "OK | test_a=0;;;;"),
            ("te'st", "OK | te''st=0;;;;"),
            ("te st", "OK | 'te st'=0;;;;"),
        ];
        for (label, expected_string) in &test_data {
            let resource = Resource::new()
                .with_state(ServiceState::Ok)
                .with_result(Metric::new(label, 0));

            assert_eq!(&resource.to_nagios_string(), expected_string);
        }
    }

    #[test]
    fn test_resource_worst_metric_wins() {
        let thresholds = Thresholds::new(Some(10), Some(20), TriggerIfValue::AtOrAbove);
        let resource = Resource::new()
            .with_result(Metric::new("a", 1).with_thresholds(thresholds))
            .with_result(Metric::new("b", 25).with_thresholds(thresholds))
            .with_result(Metric::new("c", 12).with_thresholds(thresholds));

        assert_eq!(resource.get_state(), ServiceState::Critical);
        assert_eq!(resource.exit_code(), 2);
    }

    #[test]
    fn test_resource_details() {
        let resource = Resource::new()
            .with_state(ServiceState::Ok)
            .with_description("Summary")
            .with_details(vec!["first", "second"])
            .with_detail("third");

        assert_eq!(resource.details().len(), 3);
        assert_eq!(
            &resource.to_nagios_string(),
            "Summary\nfirst\nsecond\nthird"
        );

        let resource = Resource::new()
            .with_state(ServiceState::Critical)
            .with_description("Summary");
        assert_eq!(resource.get_description(), Some("Summary"));
        assert_eq!(&resource.to_nagios_string(), "Summary");
    }

    #[test]
    fn test_state() {
        assert_eq!(ServiceState::Ok.exit_code(), 0);
        assert_eq!(ServiceState::Warning.exit_code(), 1);
        assert_eq!(ServiceState::Critical.exit_code(), 2);
        assert_eq!(ServiceState::Unknown.exit_code(), 3);

        assert_eq!(&ServiceState::Ok.to_string(), "OK");
        assert_eq!(&ServiceState::Warning.to_string(), "WARNING");
        assert_eq!(&ServiceState::Critical.to_string(), "CRITICAL");
        assert_eq!(&ServiceState::Unknown.to_string(), "UNKNOWN");

        assert!(ServiceState::Unknown < ServiceState::Ok);
        assert!(ServiceState::Ok < ServiceState::Warning);
        assert!(ServiceState::Warning < ServiceState::Critical);
    }
}
