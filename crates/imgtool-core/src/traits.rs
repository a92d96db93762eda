//! Core traits for IMG archives

use std::io::{Read, Seek};

/// Combined trait for Read + Seek
pub trait ReadSeek: Read + Seek + Send {}

/// Blanket implementation for any type that implements Read + Seek
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Predicate selecting members by name
///
/// The engine treats this as opaque; wildcard matching lives with the caller.
pub trait MemberFilter {
    /// Does `name` satisfy this filter?
    fn matches(&self, name: &str) -> bool;

    /// Human-readable form, used when reporting filters that matched nothing
    fn describe(&self) -> String;
}

/// Exact member name
impl MemberFilter for str {
    fn matches(&self, name: &str) -> bool {
        self == name
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl MemberFilter for String {
    fn matches(&self, name: &str) -> bool {
        self.as_str() == name
    }

    fn describe(&self) -> String {
        self.clone()
    }
}

impl<F: MemberFilter + ?Sized> MemberFilter for &F {
    fn matches(&self, name: &str) -> bool {
        (**self).matches(name)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<F: MemberFilter + ?Sized> MemberFilter for Box<F> {
    fn matches(&self, name: &str) -> bool {
        (**self).matches(name)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_name_filter() {
        let filter = "car.dff".to_string();
        assert!(filter.matches("car.dff"));
        assert!(!filter.matches("car.txd"));
        assert_eq!(filter.describe(), "car.dff");
    }

    #[test]
    fn test_boxed_filter() {
        let filters: Vec<Box<dyn MemberFilter>> = vec![Box::new("a.dat".to_string())];
        assert!(filters[0].matches("a.dat"));
    }
}
