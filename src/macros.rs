macro_rules! impl_to_perf_string_on_to_string {
    ($($t:ty), *) => {
        $(
            impl ToPerfString for $t {
                fn to_perf_string(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

/// Builds `label=value;warn;crit;min;max`. The separators are positional, so empty fields still
/// get their semicolon.
macro_rules! metric_string {
    ($name:expr, $value:expr $(, $field:expr)*) => {
        {
            let mut s = format!("{}={}", $name, $value.to_perf_string());
            $(
                s.push(';');
                s.push_str(&$field.to_perf_string());
            )*
            s
        }
    };
}
