/// Builds a [`Vars`](crate::context::Vars) table from `key => value` pairs.
#[doc(hidden)]
#[macro_export]
macro_rules! vars {
    ($($key:expr => $value:expr),* $(,)?) => ({
        #[allow(unused_mut)]
        let mut vars = $crate::context::Vars::default();
        $(vars.insert(std::sync::Arc::<str>::from($key), $crate::value::Value::from($value));)*
        vars
    });
}

#[doc(hidden)]
#[macro_export]
macro_rules! time {
    ($label:expr, $($token:tt)*) => ({
        let start = std::time::Instant::now();
        let value = { $($token)* };
        $crate::tracing::debug!("{} took {}ms", $label, start.elapsed().as_millis());
        value
    });
}

pub use {vars, time};
