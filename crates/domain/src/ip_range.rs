use std::collections::HashSet;

/// Separator between the two endpoints of a range expression.
pub const RANGE_SEPARATOR: char = '-';

/// Resolves one IP expression into the addresses it denotes.
///
/// A plain address resolves to itself. `start-end` resolves to its two trimmed
/// endpoints only; addresses strictly between them are not enumerated.
/// Anything with more than one separator is returned unchanged. Tokens are
/// never validated as addresses.
#[must_use]
pub fn expand_ip_range(expression: &str) -> Vec<String> {
    let mut parts = expression.split(RANGE_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(start), Some(end), None) => vec![start.trim().to_owned(), end.trim().to_owned()],
        _ => vec![expression.to_owned()],
    }
}

/// Deduplicated set of literal IP strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpSet {
    addresses: HashSet<String>,
}

impl IpSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one literal address.
    pub fn insert(&mut self, address: impl Into<String>) {
        self.addresses.insert(address.into());
    }

    /// Adds every address denoted by a range expression.
    pub fn insert_range(&mut self, expression: &str) {
        self.addresses.extend(expand_ip_range(expression));
    }

    /// Returns whether the address is a member. Comparison is exact.
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    /// Returns the number of distinct addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for IpSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            addresses: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{IpSet, expand_ip_range};

    proptest! {
        #[test]
        fn expression_without_separator_is_kept_verbatim(expression in "[0-9. ]{0,20}") {
            prop_assert_eq!(expand_ip_range(expression.as_str()), vec![expression.clone()]);
        }

        #[test]
        fn two_part_expression_never_grows_past_endpoints(
            start in "[0-9]{1,3}(\\.[0-9]{1,3}){3}",
            end in "[0-9]{1,3}(\\.[0-9]{1,3}){3}"
        ) {
            let expanded = expand_ip_range(format!("{start} - {end}").as_str());
            prop_assert_eq!(expanded, vec![start.clone(), end.clone()]);
        }
    }

    #[test]
    fn plain_address_resolves_to_itself() {
        assert_eq!(expand_ip_range("10.0.0.5"), vec!["10.0.0.5".to_owned()]);
    }

    #[test]
    fn range_resolves_to_endpoints_only() {
        let mut set = IpSet::new();
        set.insert_range("10.0.0.1-10.0.0.50");

        assert_eq!(set.len(), 2);
        assert!(set.contains("10.0.0.1"));
        assert!(set.contains("10.0.0.50"));
        assert!(!set.contains("10.0.0.25"));
    }

    #[test]
    fn range_endpoints_are_trimmed() {
        assert_eq!(
            expand_ip_range(" 10.0.0.1 - 10.0.0.9 "),
            vec!["10.0.0.1".to_owned(), "10.0.0.9".to_owned()]
        );
    }

    #[test]
    fn extra_separators_pass_through_literally() {
        assert_eq!(
            expand_ip_range("10.0.0.1-10.0.0.5-10.0.0.9"),
            vec!["10.0.0.1-10.0.0.5-10.0.0.9".to_owned()]
        );
    }

    #[test]
    fn set_deduplicates() {
        let mut set: IpSet = ["10.0.0.1", "10.0.0.1"].into_iter().collect();
        set.insert_range("10.0.0.1-10.0.0.2");
        assert_eq!(set.len(), 2);
    }
}
