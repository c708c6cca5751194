use regex::Regex;
use std::sync::LazyLock;

/// Dotted numeric version with an optional leading `v` and an optional
/// commit/build fragment (`-`, `+` or `_` followed by digits and separators).
static STRICT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[vV]?(?P<version>\d+(?:\.\d+)*)(?:[-+_][0-9.+_-]*)?$")
        .expect("strict tag pattern is valid")
});

static MAJOR_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[vV]?(?P<major>\d+)").expect("major tag pattern is valid"));

/// A tag together with the key it was ranked by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedTag {
    pub original: String,
    rank: Vec<u64>,
}

impl OrderedTag {
    pub fn rank(&self) -> &[u64] {
        &self.rank
    }
}

/// Orders remote tag names from most to least recent.
pub struct TagOrderer;

impl TagOrderer {
    /// Full semantic ordering. Tags carrying letters other than a leading `v`
    /// (pre-releases, `nightly`, `latest`, ...) and tags that do not parse as
    /// dotted numerics are dropped.
    pub fn order_strict<S: AsRef<str>>(tags: &[S]) -> Vec<OrderedTag> {
        let ranked = tags
            .iter()
            .map(AsRef::as_ref)
            .filter_map(|tag| Self::strict_rank(tag).map(|rank| (tag, rank)));
        Self::sorted(ranked)
    }

    /// Ordering over major-only tags such as `v3`. Only meaningful for
    /// organisations that are trusted to move their major tags.
    pub fn order_major<S: AsRef<str>>(tags: &[S]) -> Vec<OrderedTag> {
        let ranked = tags
            .iter()
            .map(AsRef::as_ref)
            .filter(|tag| !tag.contains('.'))
            .filter_map(|tag| Self::major_rank(tag).map(|major| (tag, vec![major])));
        Self::sorted(ranked)
    }

    fn strict_rank(tag: &str) -> Option<Vec<u64>> {
        let unprefixed = tag
            .strip_prefix('v')
            .or_else(|| tag.strip_prefix('V'))
            .unwrap_or(tag);
        if unprefixed.chars().any(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        let captures = STRICT_TAG.captures(tag)?;
        captures
            .name("version")?
            .as_str()
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect()
    }

    fn major_rank(tag: &str) -> Option<u64> {
        MAJOR_TAG
            .captures(tag)?
            .name("major")?
            .as_str()
            .parse()
            .ok()
    }

    fn sorted<'a>(ranked: impl Iterator<Item = (&'a str, Vec<u64>)>) -> Vec<OrderedTag> {
        let mut ordered: Vec<OrderedTag> = ranked
            .map(|(tag, rank)| OrderedTag {
                original: tag.to_string(),
                rank,
            })
            .collect();
        // Vec ordering ranks a missing trailing component lower ([1, 2] < [1, 2, 0]);
        // the sort is stable so equal ranks keep their input order
        ordered.sort_by(|a, b| b.rank.cmp(&a.rank));
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn originals(ordered: &[OrderedTag]) -> Vec<&str> {
        ordered.iter().map(|t| t.original.as_str()).collect()
    }

    #[test]
    fn compares_numerically_not_lexically() {
        let ordered = TagOrderer::order_strict(&["v1.2.0", "v1.10.0", "v1.9.9"]);
        assert_eq!(originals(&ordered), vec!["v1.10.0", "v1.9.9", "v1.2.0"]);
    }

    #[test]
    fn drops_tags_with_letters() {
        let ordered = TagOrderer::order_strict(&["v1.0.0", "nightly", "v2.0-rc1"]);
        assert_eq!(originals(&ordered), vec!["v1.0.0"]);
    }

    #[test]
    fn missing_components_rank_lower() {
        let ordered = TagOrderer::order_strict(&["1.2", "1.2.0", "1"]);
        assert_eq!(originals(&ordered), vec!["1.2.0", "1.2", "1"]);
    }

    #[test]
    fn keeps_original_spelling() {
        let ordered = TagOrderer::order_strict(&["V2.1.0", "v2.0.0"]);
        assert_eq!(ordered[0].original, "V2.1.0");
        assert_eq!(ordered[0].rank(), &[2, 1, 0]);
    }

    #[test]
    fn strips_commit_fragment() {
        let ordered = TagOrderer::order_strict(&["v1.4.0-20230101", "v1.3.9"]);
        assert_eq!(originals(&ordered), vec!["v1.4.0-20230101", "v1.3.9"]);
        assert_eq!(ordered[0].rank(), &[1, 4, 0]);
    }

    #[test]
    fn drops_bare_and_malformed_tags() {
        let ordered = TagOrderer::order_strict(&["v", "", "1..2", ".1", "1.2.", "v-1"]);
        assert!(ordered.is_empty());
    }

    #[test]
    fn ties_preserve_input_order() {
        let ordered = TagOrderer::order_strict(&["v1.0.0", "1.0.0", "V1.0.0"]);
        assert_eq!(originals(&ordered), vec!["v1.0.0", "1.0.0", "V1.0.0"]);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let empty: [&str; 0] = [];
        assert!(TagOrderer::order_strict(&empty).is_empty());
        assert!(TagOrderer::order_major(&empty).is_empty());
    }

    #[test]
    fn does_not_mutate_input() {
        let tags = vec!["v1".to_string(), "v3".to_string(), "v2".to_string()];
        let before = tags.clone();
        let _ = TagOrderer::order_major(&tags);
        let _ = TagOrderer::order_strict(&tags);
        assert_eq!(tags, before);
    }

    #[test]
    fn major_mode_only_keeps_single_component_tags() {
        let ordered = TagOrderer::order_major(&["v1", "v2.0.0", "v3", "latest", "v10"]);
        assert_eq!(originals(&ordered), vec!["v10", "v3", "v1"]);
    }

    #[test]
    fn huge_components_are_dropped() {
        let ordered = TagOrderer::order_strict(&["99999999999999999999999.0", "1.0"]);
        assert_eq!(originals(&ordered), vec!["1.0"]);
    }

    proptest! {
        #[test]
        fn first_strict_result_is_greatest_tuple(
            versions in prop::collection::vec(prop::collection::vec(0u64..50, 1..4), 1..20)
        ) {
            let tags: Vec<String> = versions
                .iter()
                .map(|parts| {
                    let joined: Vec<String> = parts.iter().map(u64::to_string).collect();
                    format!("v{}", joined.join("."))
                })
                .collect();

            let ordered = TagOrderer::order_strict(&tags);
            prop_assert_eq!(ordered.len(), tags.len());

            let greatest = versions.iter().max().cloned().unwrap_or_default();
            prop_assert_eq!(ordered[0].rank(), greatest.as_slice());

            for pair in ordered.windows(2) {
                prop_assert!(pair[0].rank() >= pair[1].rank());
            }
        }
    }
}
