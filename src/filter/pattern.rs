use regex::Regex;

use super::{ClassFilter, FilterError, NameFilter};
use crate::index::ClassIndex;
use crate::record::ClassRecord;

fn compile(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Accepts names in which the pattern matches somewhere.
#[derive(Debug, Clone)]
pub struct RegexFilter {
    regex: Regex,
}

impl RegexFilter {
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        Ok(Self {
            regex: compile(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl NameFilter for RegexFilter {
    fn accept(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl ClassFilter for RegexFilter {
    fn accept(&self, class: &ClassRecord, _index: &ClassIndex) -> bool {
        self.regex.is_match(&class.name)
    }
}

/// Accept and reject pattern lists. A reject match wins outright; otherwise
/// an empty accept list accepts, and a non-empty one needs one match.
#[derive(Debug, Clone, Default)]
pub struct MultiRegexFilter {
    accept: Vec<Regex>,
    reject: Vec<Regex>,
}

impl MultiRegexFilter {
    pub fn new<A, R>(accept: A, reject: R) -> Result<Self, FilterError>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        let mut filter = Self::default();
        for pattern in accept {
            filter.add_accept_pattern(pattern.as_ref())?;
        }
        for pattern in reject {
            filter.add_reject_pattern(pattern.as_ref())?;
        }
        Ok(filter)
    }

    pub fn add_accept_pattern(&mut self, pattern: &str) -> Result<&mut Self, FilterError> {
        self.accept.push(compile(pattern)?);
        Ok(self)
    }

    pub fn add_reject_pattern(&mut self, pattern: &str) -> Result<&mut Self, FilterError> {
        self.reject.push(compile(pattern)?);
        Ok(self)
    }

    fn matches(&self, name: &str) -> bool {
        if self.reject.iter().any(|r| r.is_match(name)) {
            return false;
        }
        self.accept.is_empty() || self.accept.iter().any(|r| r.is_match(name))
    }
}

impl NameFilter for MultiRegexFilter {
    fn accept(&self, name: &str) -> bool {
        self.matches(name)
    }
}

impl ClassFilter for MultiRegexFilter {
    fn accept(&self, class: &ClassRecord, _index: &ClassIndex) -> bool {
        self.matches(&class.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::record;

    fn accepts(filter: &dyn NameFilter, name: &str) -> bool {
        filter.accept(name)
    }

    #[test]
    fn regex_uses_substring_search() {
        let filter = RegexFilter::new("Service").unwrap();
        assert!(accepts(&filter, "org.example.UserService"));
        assert!(accepts(&filter, "org.example.ServiceImpl"));
        assert!(!accepts(&filter, "org.example.Repository"));

        let anchored = RegexFilter::new("^org\\.example\\.[A-Z]\\w*$").unwrap();
        assert!(accepts(&anchored, "org.example.Foo"));
        assert!(!accepts(&anchored, "org.example.sub.Foo"));
        assert_eq!(anchored.pattern(), "^org\\.example\\.[A-Z]\\w*$");
    }

    #[test]
    fn regex_checks_record_names() {
        let index = ClassIndex::new();
        let filter = RegexFilter::new("\\$").unwrap();
        assert!(ClassFilter::accept(&filter, &record("a.A$1", None, &[]), &index));
        assert!(!ClassFilter::accept(&filter, &record("a.A", None, &[]), &index));
    }

    #[test]
    fn bad_pattern_fails_at_construction() {
        let err = RegexFilter::new("(unclosed").unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
        assert!(MultiRegexFilter::new(["ok"], ["[bad"]).is_err());
    }

    #[test]
    fn reject_list_wins_and_empty_accept_list_accepts() {
        let filter = MultiRegexFilter::new(Vec::<&str>::new(), ["^Test.*"]).unwrap();
        assert!(accepts(&filter, "Bar"));
        assert!(!accepts(&filter, "TestFoo"));
    }

    #[test]
    fn accept_list_needs_one_match() {
        let filter = MultiRegexFilter::new(["Impl$", "^api\\."], ["Mock"]).unwrap();
        assert!(accepts(&filter, "core.ServiceImpl"));
        assert!(accepts(&filter, "api.Client"));
        assert!(!accepts(&filter, "core.Service"));
        assert!(!accepts(&filter, "api.MockClient"));
    }

    #[test]
    fn patterns_can_be_added_later() {
        let mut filter = MultiRegexFilter::default();
        assert!(accepts(&filter, "anything"));
        filter
            .add_accept_pattern("^a\\.")
            .unwrap()
            .add_reject_pattern("Internal")
            .unwrap();
        assert!(accepts(&filter, "a.Public"));
        assert!(!accepts(&filter, "a.Internal"));
        assert!(!accepts(&filter, "b.Public"));
    }
}
