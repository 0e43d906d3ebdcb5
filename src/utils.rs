/// Evaluates an expression and logs how long it took at `debug` level.
///
/// ```
/// let sum: u64 = isocrust::timed!((1..=100u64).sum(), "sum");
/// assert_eq!(sum, 5050);
/// ```
#[macro_export]
macro_rules! timed {
    ($expr:expr, $label:expr) => {{
        let start = ::std::time::Instant::now();
        let result = $expr;
        ::log::debug!("{}: {:?}", $label, start.elapsed());
        result
    }};
}

#[test]
fn timed_returns_value() {
    let value = timed!(6 * 7, "multiply");
    assert_eq!(value, 42);
}
