//! Grouping of line numbers into contiguous ranges.

use std::fmt;
use std::str::FromStr;

use crate::core::errors::TestlensError;

/// An inclusive run of consecutive line numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn single(line: usize) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    /// Number of lines covered by the range
    pub fn line_count(&self) -> usize {
        self.end - self.start + 1
    }

    /// Every line in the range, ascending
    pub fn lines(&self) -> impl Iterator<Item = usize> {
        self.start..=self.end
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl FromStr for LineRange {
    type Err = TestlensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim().parse::<usize>().map_err(|_| {
                TestlensError::validation_field(format!("Invalid line range: {s:?}"), "uncoveredLines")
            })
        };

        match s.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start >= end {
                    return Err(TestlensError::validation_field(
                        format!("Line range start must be below its end: {s:?}"),
                        "uncoveredLines",
                    ));
                }
                Ok(Self { start, end })
            }
            None => parse(s).map(Self::single),
        }
    }
}

/// Group line numbers into ascending, gap-separated ranges.
///
/// Input may be unsorted and contain duplicates; an empty input yields no ranges.
pub fn group_line_ranges<I>(lines: I) -> Vec<LineRange>
where
    I: IntoIterator<Item = usize>,
{
    let mut sorted: Vec<usize> = lines.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return ranges;
    };

    let mut current = LineRange::single(first);
    for line in iter {
        if line == current.end + 1 {
            current.end = line;
        } else {
            ranges.push(current);
            current = LineRange::single(line);
        }
    }
    ranges.push(current);

    ranges
}

/// Render ranges as `"N"` / `"A-B"` strings
pub fn render_ranges(ranges: &[LineRange]) -> Vec<String> {
    ranges.iter().map(ToString::to_string).collect()
}

/// Group and render in one step
pub fn group_and_render<I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = usize>,
{
    render_ranges(&group_line_ranges(lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_groups_unsorted_input() {
        assert_eq!(group_and_render([5, 1, 3, 2]), vec!["1-3", "5"]);
    }

    #[test]
    fn test_collapses_duplicates() {
        assert_eq!(group_and_render([1, 1, 2, 2, 4, 4]), vec!["1-2", "4"]);
    }

    #[test]
    fn test_empty_input_yields_no_ranges() {
        assert!(group_and_render(Vec::<usize>::new()).is_empty());
    }

    #[test]
    fn test_gap_of_two_starts_new_range() {
        assert_eq!(group_and_render([10, 12, 13, 20]), vec!["10", "12-13", "20"]);
        assert_eq!(group_and_render([0, 1]), vec!["0-1"]);
    }

    #[test]
    fn test_parse_rendered_ranges() {
        assert_eq!("7".parse::<LineRange>().unwrap(), LineRange::single(7));
        assert_eq!(
            " 3-9 ".parse::<LineRange>().unwrap(),
            LineRange { start: 3, end: 9 }
        );
        assert!("9-3".parse::<LineRange>().is_err());
        assert!("4-4".parse::<LineRange>().is_err());
        assert!("x".parse::<LineRange>().is_err());
    }

    proptest! {
        #[test]
        fn prop_ranges_round_trip(lines in proptest::collection::vec(0usize..500, 0..80)) {
            let expected: BTreeSet<usize> = lines.iter().copied().collect();
            let ranges = group_line_ranges(lines);

            let expanded: Vec<usize> = ranges.iter().flat_map(LineRange::lines).collect();
            let expanded_set: BTreeSet<usize> = expanded.iter().copied().collect();
            prop_assert_eq!(expanded.len(), expanded_set.len());
            prop_assert_eq!(expanded_set, expected);

            for pair in ranges.windows(2) {
                prop_assert!(pair[1].start > pair[0].end + 1);
            }

            let reparsed: Vec<LineRange> = render_ranges(&ranges)
                .iter()
                .map(|s| s.parse().unwrap())
                .collect();
            prop_assert_eq!(reparsed, ranges);
        }
    }
}
