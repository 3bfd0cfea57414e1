//! Relative resource paths under a project.

use std::fmt::Display;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

pub(crate) const ACCESS_KEYS: &str = "access_keys";
pub(crate) const DATASETS: &str = "datasets";

/// Everything that may not appear verbatim in a single path segment. `:` is
/// included so that a leading segment is never mistaken for a URL scheme.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

fn segment(s: &str) -> impl Display + '_ {
    utf8_percent_encode(s, SEGMENT)
}

/// `{project_id}/{resource}`.
pub(crate) fn resource_path(project_id: &str, resource: &str) -> String {
    format!("{}/{resource}", segment(project_id))
}

/// `{project_id}/datasets/{dataset_name}`.
pub(crate) fn dataset_path(project_id: &str, dataset_name: &str) -> String {
    format!(
        "{}/{}",
        resource_path(project_id, DATASETS),
        segment(dataset_name)
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn paths() {
        assert_eq!(resource_path("abc", ACCESS_KEYS), "abc/access_keys");
        assert_eq!(resource_path("abc", DATASETS), "abc/datasets");
        assert_eq!(dataset_path("abc", "daily_sums"), "abc/datasets/daily_sums");
    }

    #[test]
    fn segments_are_escaped() {
        assert_eq!(
            dataset_path("abc", "sums by/day?x#1"),
            "abc/datasets/sums%20by%2Fday%3Fx%231"
        );
        assert_eq!(dataset_path("abc", "caf\u{e9}"), "abc/datasets/caf%C3%A9");
    }
}
