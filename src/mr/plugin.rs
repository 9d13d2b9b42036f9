//! The compiled-in map/reduce applications, may be swapped for dynamic
//! loading in the future.
//!
//! An application is a pair of plain function pointers resolved by name at
//! worker boot. Both run synchronously; the `emit` callback is only valid for
//! the duration of the call.

pub type MapFn = fn(input: &[u8], emit: &mut dyn FnMut(&[u8], &[u8]));
pub type ReduceFn = fn(key: &[u8], values: &[&[u8]], emit: &mut dyn FnMut(&[u8], &[u8]));

/// A named map/reduce capability pair.
#[derive(Debug)]
pub struct Application {
    pub name: &'static str,
    pub map: MapFn,
    pub reduce: ReduceFn,
}

static APPLICATIONS: &[Application] = &[
    Application {
        name: "wc",
        map: wc::map,
        reduce: wc::reduce,
    },
    Application {
        name: "distinct",
        map: distinct::map,
        reduce: distinct::reduce,
    },
];

/// Resolve an application by name.
pub fn lookup(name: &str) -> Option<&'static Application> {
    APPLICATIONS.iter().find(|app| app.name == name)
}

/// Names of every registered application.
pub fn names() -> Vec<&'static str> {
    APPLICATIONS.iter().map(|app| app.name).collect()
}

/// Word Count application
pub mod wc {
    /// Emits `(word, "1")` for every whitespace-separated word.
    pub fn map(input: &[u8], emit: &mut dyn FnMut(&[u8], &[u8])) {
        for word in input.split(|byte: &u8| byte.is_ascii_whitespace()) {
            if !word.is_empty() {
                emit(word, b"1");
            }
        }
    }

    /// Sums the decimal integer values for one word.
    pub fn reduce(key: &[u8], values: &[&[u8]], emit: &mut dyn FnMut(&[u8], &[u8])) {
        let total: i64 = values
            .iter()
            .filter_map(|value| std::str::from_utf8(value).ok()?.parse::<i64>().ok())
            .sum();
        emit(key, total.to_string().as_bytes());
    }
}

/// Distinct lines: the output is every unique input line, once.
pub mod distinct {
    pub fn map(input: &[u8], emit: &mut dyn FnMut(&[u8], &[u8])) {
        for line in input.split(|byte: &u8| *byte == b'\n') {
            if !line.is_empty() {
                emit(line, b"");
            }
        }
    }

    pub fn reduce(key: &[u8], _values: &[&[u8]], emit: &mut dyn FnMut(&[u8], &[u8])) {
        emit(key, b"");
    }
}
